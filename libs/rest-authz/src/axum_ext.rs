//! Axum extractors and middleware for enforcement

use crate::{
    enforcer::{Enforcer, GenericOutcome, RouteAuthorization},
    errors::EnforcementError,
    template::PathParams,
    types::AuthorizerInfo,
};
use axum::{
    extract::{FromRequestParts, RawPathParams, Request, State},
    http::request::Parts,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

/// Extractor for the decision metadata of an allowed request
#[derive(Debug, Clone)]
pub struct Authorized(pub AuthorizerInfo);

impl<S> FromRequestParts<S> for Authorized
where
    S: Send + Sync,
{
    type Rejection = EnforcementError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthorizerInfo>()
            .cloned()
            .map(Authorized)
            .ok_or(EnforcementError::NotEnforced)
    }
}

/// Generic enforcement middleware for a whole router
///
/// Install with `axum::middleware::from_fn_with_state(enforcer, authorize_request)`.
/// Allowed requests carry an [`AuthorizerInfo`] extension; bypassed and
/// unenforced methods continue without one.
pub async fn authorize_request(
    State(enforcer): State<Arc<Enforcer>>,
    request: Request,
    next: Next,
) -> Response {
    let (mut parts, body) = request.into_parts();

    match enforcer.enforce(&parts).await {
        Ok(GenericOutcome::Authorized(info)) => {
            parts.extensions.insert(info);
            next.run(Request::from_parts(parts, body)).await
        }
        Ok(GenericOutcome::Bypassed | GenericOutcome::Passthrough) => {
            next.run(Request::from_parts(parts, body)).await
        }
        Err(err) => err.into_response(),
    }
}

/// State for [`authorize_route`]: the shared enforcer plus one handler's providers
#[derive(Clone)]
pub struct RouteGuard {
    enforcer: Arc<Enforcer>,
    route: Arc<RouteAuthorization>,
}

impl RouteGuard {
    #[must_use]
    pub fn new(enforcer: Arc<Enforcer>, route: RouteAuthorization) -> Self {
        Self {
            enforcer,
            route: Arc::new(route),
        }
    }
}

/// Route-specific enforcement middleware for a single handler
///
/// Install on the route itself (`MethodRouter::layer` or `Router::route_layer`)
/// so the matched path parameters are available to the context.
pub async fn authorize_route(
    State(RouteGuard { enforcer, route }): State<RouteGuard>,
    request: Request,
    next: Next,
) -> Response {
    let (mut parts, body) = request.into_parts();
    let route_params: PathParams = RawPathParams::from_request_parts(&mut parts, &())
        .await
        .map(|raw| {
            raw.iter()
                .map(|(name, value)| (name.to_owned(), value.to_owned()))
                .collect()
        })
        .unwrap_or_default();

    match enforcer.enforce_route(&route, &parts, route_params).await {
        Ok(info) => {
            parts.extensions.insert(info);
            next.run(Request::from_parts(parts, body)).await
        }
        Err(err) => err.into_response(),
    }
}
