use crate::errors::{EngineError, ProviderError};
use crate::types::{AuthorizationQuery, Context, Decision, Entity, EntityRef};
use async_trait::async_trait;
use http::request::Parts;

/// External policy decision point.
#[async_trait]
pub trait DecisionEngine: Send + Sync {
    /// Evaluate a query together with its supplementary entities.
    ///
    /// `Err` means the engine could not be reached at all; an engine-side
    /// failure is reported as `Ok(Decision::Error { .. })`.
    async fn is_authorized(
        &self,
        query: &AuthorizationQuery,
        entities: &[Entity],
    ) -> Result<Decision, EngineError>;
}

/// Builds the caller's entity, usually from claims left in the request
/// extensions by an authentication layer.
#[async_trait]
pub trait PrincipalProvider: Send + Sync {
    async fn principal(&self, parts: &Parts) -> Result<Entity, ProviderError>;
}

/// Fetches the entity a route acts upon; `Ok(None)` rejects the request.
#[async_trait]
pub trait ResourceProvider: Send + Sync {
    async fn resource(&self, parts: &Parts) -> Result<Option<Entity>, ProviderError>;
}

/// Supplies extra entities for policy evaluation; `Ok(None)` rejects the request.
#[async_trait]
pub trait EntitiesProvider: Send + Sync {
    async fn entities(&self, parts: &Parts) -> Result<Option<Vec<Entity>>, ProviderError>;
}

/// Fixed action for a route, bypassing path resolution.
pub trait ActionProvider: Send + Sync {
    fn action(&self) -> EntityRef;
}

impl<F> ActionProvider for F
where
    F: Fn() -> EntityRef + Send + Sync,
{
    fn action(&self) -> EntityRef {
        self()
    }
}

/// Integrator-defined decision context.
pub trait ContextProvider: Send + Sync {
    fn context(&self, parts: &Parts) -> Context;
}

impl<F> ContextProvider for F
where
    F: Fn(&Parts) -> Context + Send + Sync,
{
    fn context(&self, parts: &Parts) -> Context {
        self(parts)
    }
}
