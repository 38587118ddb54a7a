use crate::bypass::{BypassMatcher, BypassRule};
use crate::config::{AuthzConfig, ContextMode, PrincipalMode};
use crate::config_error::ConfigError;
use crate::context::ContextMapping;
use crate::errors::EnforcementError;
use crate::metrics::{AuthzMetricLabels, AuthzMetrics, AuthzOutcome, EnforcementMode, NoOpMetrics};
use crate::principal::PrincipalMapping;
use crate::resolver::{ActionDefinition, MatchOutcome};
use crate::schema::ActionSchema;
use crate::template::PathParams;
use crate::traits::{
    ActionProvider, DecisionEngine, EntitiesProvider, PrincipalProvider, ResourceProvider,
};
use crate::types::{AuthorizationQuery, AuthorizerInfo, Decision, Entity, HttpVerb};
use futures::FutureExt;
use http::request::Parts;
use http::Uri;
use http::uri::PathAndQuery;
use serde_json::{Map, Value};
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

/// How a request that may proceed got through generic enforcement.
#[derive(Debug, Clone, PartialEq)]
pub enum GenericOutcome {
    /// Matched a bypass rule; nothing was evaluated.
    Bypassed,
    /// The method is outside the enforced verb set.
    Passthrough,
    Authorized(AuthorizerInfo),
}

/// Per-handler providers for route-specific enforcement.
#[derive(Clone, Default)]
pub struct RouteAuthorization {
    action: Option<Arc<dyn ActionProvider>>,
    resource: Option<Arc<dyn ResourceProvider>>,
    entities: Option<Arc<dyn EntitiesProvider>>,
}

impl RouteAuthorization {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a fixed action instead of resolving the request path
    #[must_use]
    pub fn with_action_provider(mut self, provider: Arc<dyn ActionProvider>) -> Self {
        self.action = Some(provider);
        self
    }

    #[must_use]
    pub fn with_resource_provider(mut self, provider: Arc<dyn ResourceProvider>) -> Self {
        self.resource = Some(provider);
        self
    }

    #[must_use]
    pub fn with_entities_provider(mut self, provider: Arc<dyn EntitiesProvider>) -> Self {
        self.entities = Some(provider);
        self
    }
}

impl fmt::Debug for RouteAuthorization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteAuthorization")
            .field("action", &self.action.is_some())
            .field("resource", &self.resource.is_some())
            .field("entities", &self.entities.is_some())
            .finish()
    }
}

/// Builder for [`Enforcer`]
pub struct EnforcerBuilder {
    schema: ActionSchema,
    engine: Option<Arc<dyn DecisionEngine>>,
    principal: Option<PrincipalMapping>,
    custom_principal_required: bool,
    context: ContextMapping,
    skipped_endpoints: Vec<BypassRule>,
    metrics: Arc<dyn AuthzMetrics>,
}

impl EnforcerBuilder {
    #[must_use]
    pub fn new(schema: ActionSchema) -> Self {
        Self {
            schema,
            engine: None,
            principal: None,
            custom_principal_required: false,
            context: ContextMapping::default(),
            skipped_endpoints: Vec::new(),
            metrics: Arc::new(NoOpMetrics),
        }
    }

    /// Apply principal, context and bypass settings from configuration.
    ///
    /// A `custom` principal mode still needs [`Self::with_principal_provider`].
    #[must_use]
    pub fn with_config(mut self, config: &AuthzConfig) -> Self {
        match config.principal {
            Some(PrincipalMode::AccessToken) => {
                self.principal = Some(PrincipalMapping::AccessToken);
            }
            Some(PrincipalMode::IdentityToken) => {
                self.principal = Some(PrincipalMapping::IdentityToken);
            }
            Some(PrincipalMode::Custom) => self.custom_principal_required = true,
            None => {}
        }
        self.context = match config.context {
            ContextMode::Auto => ContextMapping::Auto,
            ContextMode::Empty => ContextMapping::Empty,
        };
        self.skipped_endpoints
            .extend(config.skipped_endpoints.iter().cloned());
        self
    }

    #[must_use]
    pub fn with_decision_engine(mut self, engine: Arc<dyn DecisionEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    #[must_use]
    pub fn with_principal(mut self, principal: PrincipalMapping) -> Self {
        self.principal = Some(principal);
        self
    }

    #[must_use]
    pub fn with_principal_provider(self, provider: Arc<dyn PrincipalProvider>) -> Self {
        self.with_principal(PrincipalMapping::Custom(provider))
    }

    #[must_use]
    pub fn with_context(mut self, context: ContextMapping) -> Self {
        self.context = context;
        self
    }

    #[must_use]
    pub fn with_skipped_endpoint(mut self, rule: BypassRule) -> Self {
        self.skipped_endpoints.push(rule);
        self
    }

    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<dyn AuthzMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// # Errors
    /// Returns [`ConfigError`] when the engine or principal mapping is
    /// missing, or a bypass rule does not compile.
    pub fn build(self) -> Result<Enforcer, ConfigError> {
        let engine = self.engine.ok_or(ConfigError::MissingDecisionEngine)?;
        let principal = match self.principal {
            Some(principal) if !self.custom_principal_required || principal.is_custom() => {
                principal
            }
            Some(_) => return Err(ConfigError::MissingCustomPrincipal),
            None if self.custom_principal_required => {
                return Err(ConfigError::MissingCustomPrincipal);
            }
            None => return Err(ConfigError::MissingPrincipal),
        };
        let bypass = BypassMatcher::compile(&self.skipped_endpoints)?;

        Ok(Enforcer {
            schema: self.schema,
            engine,
            principal,
            context: self.context,
            bypass,
            metrics: self.metrics,
        })
    }
}

/// Per-request enforcement over a compiled schema.
///
/// Built once at startup and shared behind an `Arc`; nothing in it is
/// mutated per request.
pub struct Enforcer {
    schema: ActionSchema,
    engine: Arc<dyn DecisionEngine>,
    principal: PrincipalMapping,
    context: ContextMapping,
    bypass: BypassMatcher,
    metrics: Arc<dyn AuthzMetrics>,
}

fn path_and_query(uri: &Uri) -> &str {
    uri.path_and_query()
        .map_or_else(|| uri.path(), PathAndQuery::as_str)
}

/// The full request target as the client sent it.
///
/// Nested axum routers strip their prefix from `parts.uri`; the router
/// records the unstripped URI as `OriginalUri`, which wins when present.
fn request_target(parts: &Parts) -> &str {
    #[cfg(feature = "axum-ext")]
    {
        if let Some(axum::extract::OriginalUri(uri)) =
            parts.extensions.get::<axum::extract::OriginalUri>()
        {
            return path_and_query(uri);
        }
    }
    path_and_query(&parts.uri)
}

/// Convert a panic anywhere in `future` into [`EnforcementError::Panicked`].
async fn guarded<T, F>(future: F) -> Result<T, EnforcementError>
where
    F: Future<Output = Result<T, EnforcementError>>,
{
    AssertUnwindSafe(future)
        .catch_unwind()
        .await
        .unwrap_or(Err(EnforcementError::Panicked))
}

fn log_rejection(err: &EnforcementError, labels: &AuthzMetricLabels, path: &str) {
    let status = err.status().as_u16();
    match err.outcome() {
        AuthzOutcome::Ambiguous => tracing::warn!(
            mode = labels.mode.as_str(),
            path,
            status,
            error = %err,
            "Ambiguous action match, path templates overlap"
        ),
        AuthzOutcome::Failed => tracing::error!(
            mode = labels.mode.as_str(),
            verb = ?labels.verb,
            action = ?labels.action,
            path,
            status,
            error = %err,
            "Authorization failed"
        ),
        _ => tracing::debug!(
            mode = labels.mode.as_str(),
            verb = ?labels.verb,
            action = ?labels.action,
            path,
            status,
            error = %err,
            "Request rejected"
        ),
    }
}

impl Enforcer {
    #[must_use]
    pub fn builder(schema: ActionSchema) -> EnforcerBuilder {
        EnforcerBuilder::new(schema)
    }

    #[must_use]
    pub fn schema(&self) -> &ActionSchema {
        &self.schema
    }

    #[must_use]
    pub fn bypass(&self) -> &BypassMatcher {
        &self.bypass
    }

    #[must_use]
    pub fn context(&self) -> &ContextMapping {
        &self.context
    }

    /// Resolve a request to its unique action.
    ///
    /// # Errors
    /// [`EnforcementError::NotFound`] when nothing matches and
    /// [`EnforcementError::Ambiguous`] when more than one action does.
    pub fn resolve(
        &self,
        verb: HttpVerb,
        raw_path: &str,
    ) -> Result<(ActionDefinition, PathParams), EnforcementError> {
        match self.schema.table().resolve(verb, raw_path) {
            MatchOutcome::Matched { action, params } => Ok((action, params)),
            MatchOutcome::NotFound => Err(EnforcementError::NotFound {
                verb,
                path: raw_path.to_owned(),
            }),
            MatchOutcome::Ambiguous(actions) => Err(EnforcementError::Ambiguous {
                verb,
                path: raw_path.to_owned(),
                actions,
            }),
        }
    }

    /// Generic enforcement for any request in the pipeline.
    ///
    /// Bypassed requests and unsupported methods are let through untouched;
    /// everything else must resolve to exactly one action and be allowed.
    ///
    /// # Errors
    /// Returns the [`EnforcementError`] the request must be rejected with.
    pub async fn enforce(&self, parts: &Parts) -> Result<GenericOutcome, EnforcementError> {
        let verb_name = parts.method.as_str().to_ascii_lowercase();
        let target = request_target(parts);
        let labels = AuthzMetricLabels::new(EnforcementMode::Generic).with_verb(verb_name.as_str());

        if self.bypass.is_bypassed(&verb_name, target) {
            tracing::debug!(verb = %verb_name, path = target, "Request bypasses authorization");
            self.metrics.record_outcome(AuthzOutcome::Bypassed, &labels);
            return Ok(GenericOutcome::Bypassed);
        }

        let Some(verb) = HttpVerb::from_method(&parts.method) else {
            tracing::debug!(verb = %verb_name, path = target, "Method not enforced");
            self.metrics.record_outcome(AuthzOutcome::Passthrough, &labels);
            return Ok(GenericOutcome::Passthrough);
        };

        let (action, params) = match self.resolve(verb, target) {
            Ok(resolved) => resolved,
            Err(err) => return self.conclude(Err(err), &labels, target),
        };
        let labels = labels.with_action(action.action_id.as_str());

        let result = guarded(self.authorize_generic(parts, &action, &params, &labels)).await;
        self.conclude(result, &labels, target)
            .map(GenericOutcome::Authorized)
    }

    /// Route-specific enforcement for a single handler.
    ///
    /// No bypass check applies here.
    ///
    /// # Errors
    /// Returns the [`EnforcementError`] the request must be rejected with.
    pub async fn enforce_route(
        &self,
        route: &RouteAuthorization,
        parts: &Parts,
        route_params: PathParams,
    ) -> Result<AuthorizerInfo, EnforcementError> {
        let target = request_target(parts);
        let labels = AuthzMetricLabels::new(EnforcementMode::Route)
            .with_verb(parts.method.as_str().to_ascii_lowercase());

        let result = guarded(self.authorize_route(route, parts, route_params, &labels)).await;
        self.conclude(result, &labels, target)
    }

    fn conclude<T>(
        &self,
        result: Result<T, EnforcementError>,
        labels: &AuthzMetricLabels,
        path: &str,
    ) -> Result<T, EnforcementError> {
        match &result {
            Ok(_) => self.metrics.record_outcome(AuthzOutcome::Allowed, labels),
            Err(err) => {
                log_rejection(err, labels, path);
                self.metrics.record_outcome(err.outcome(), labels);
            }
        }
        result
    }

    async fn authorize_generic(
        &self,
        parts: &Parts,
        action: &ActionDefinition,
        params: &PathParams,
        labels: &AuthzMetricLabels,
    ) -> Result<AuthorizerInfo, EnforcementError> {
        let principal = self
            .principal
            .resolve(parts)
            .await
            .map_err(EnforcementError::Principal)?;

        let query = AuthorizationQuery {
            principal: principal.uid.clone(),
            action: self.schema.action_ref(&action.action_id),
            resource: self.schema.application_ref(),
            context: self.context.build(parts, params),
        };
        let entities = if self.principal.is_custom() {
            vec![principal]
        } else {
            Vec::new()
        };

        let info = self.decide(&query, &entities, labels).await?;
        Ok(AuthorizerInfo {
            action: query.action,
            info,
            resource: None,
        })
    }

    async fn authorize_route(
        &self,
        route: &RouteAuthorization,
        parts: &Parts,
        route_params: PathParams,
        labels: &AuthzMetricLabels,
    ) -> Result<AuthorizerInfo, EnforcementError> {
        let principal = self
            .principal
            .resolve(parts)
            .await
            .map_err(EnforcementError::Principal)?;

        let (action, params) = if let Some(provider) = &route.action {
            (provider.action(), route_params)
        } else {
            let verb = HttpVerb::from_method(&parts.method)
                .ok_or_else(|| EnforcementError::UnroutableMethod(parts.method.to_string()))?;
            let (definition, params) = self.resolve(verb, request_target(parts))?;
            (self.schema.action_ref(&definition.action_id), params)
        };

        let resource = match &route.resource {
            Some(provider) => Some(
                provider
                    .resource(parts)
                    .await
                    .map_err(EnforcementError::Resource)?
                    .ok_or(EnforcementError::InvalidResource)?,
            ),
            None => None,
        };

        let mut entities = match &route.entities {
            Some(provider) => provider
                .entities(parts)
                .await
                .map_err(EnforcementError::Entities)?
                .ok_or(EnforcementError::InvalidEntities)?,
            None => Vec::new(),
        };
        if self.principal.is_custom() {
            entities.push(principal.clone());
        }
        if let Some(resource) = &resource {
            entities.push(resource.clone());
        }

        let query = AuthorizationQuery {
            principal: principal.uid,
            action,
            resource: resource
                .as_ref()
                .map_or_else(|| self.schema.application_ref(), |r| r.uid.clone()),
            context: self.context.build(parts, &params),
        };

        let info = self.decide(&query, &entities, labels).await?;
        Ok(AuthorizerInfo {
            action: query.action,
            info,
            resource,
        })
    }

    async fn decide(
        &self,
        query: &AuthorizationQuery,
        entities: &[Entity],
        labels: &AuthzMetricLabels,
    ) -> Result<Map<String, Value>, EnforcementError> {
        if tracing::enabled!(tracing::Level::DEBUG) {
            tracing::debug!(
                query = %serde_json::to_string(query).unwrap_or_default(),
                entities = %serde_json::to_string(entities).unwrap_or_default(),
                "Submitting authorization query"
            );
        }

        let started = Instant::now();
        let decision = self.engine.is_authorized(query, entities).await;
        self.metrics.record_decision_latency(
            u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            labels,
        );

        match decision.map_err(EnforcementError::EngineUnavailable)? {
            Decision::Allow { authorizer_info } => {
                tracing::debug!(action = %query.action, "Authorization allowed");
                Ok(authorizer_info)
            }
            Decision::Deny => Err(EnforcementError::Denied),
            Decision::Error { message } => Err(EnforcementError::Engine(message)),
        }
    }
}
