use crate::metrics::AuthzOutcome;
use crate::types::HttpVerb;
use http::StatusCode;
use thiserror::Error;

/// Failure reported by a principal, resource or entities provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("authorization header is missing")]
    MissingAuthorization,

    #[error("multiple authorization headers were supplied")]
    MultipleAuthorization,

    #[error("authorization header is not a bearer token")]
    NotBearer,

    #[error("{0}")]
    Message(String),

    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl ProviderError {
    #[must_use]
    pub fn msg(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }
}

/// Transport-level failure talking to the decision engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("decision engine unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Per-request enforcement failures.
///
/// The `Display` text carries diagnostics for logs; responses only ever
/// carry [`EnforcementError::public_message`].
#[derive(Debug, Error)]
pub enum EnforcementError {
    #[error("no action matches {verb} {path}")]
    NotFound { verb: HttpVerb, path: String },

    #[error("{verb} {path} matches multiple actions: {}", .actions.join(", "))]
    Ambiguous {
        verb: HttpVerb,
        path: String,
        actions: Vec<String>,
    },

    #[error("method `{0}` cannot be mapped to an action and the route has no action provider")]
    UnroutableMethod(String),

    #[error("principal resolution failed: {0}")]
    Principal(#[source] ProviderError),

    #[error("resource provider failed: {0}")]
    Resource(#[source] ProviderError),

    #[error("resource provider returned no resource")]
    InvalidResource,

    #[error("entities provider failed: {0}")]
    Entities(#[source] ProviderError),

    #[error("entities provider returned no entities")]
    InvalidEntities,

    #[error("explicit deny")]
    Denied,

    #[error("decision engine reported an error: {0}")]
    Engine(String),

    #[error("decision engine call failed: {0}")]
    EngineUnavailable(#[source] EngineError),

    #[error("authorization pipeline panicked")]
    Panicked,

    #[error("authorization middleware did not run for this request")]
    NotEnforced,
}

impl EnforcementError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Resource(_) | Self::InvalidResource | Self::Entities(_) | Self::InvalidEntities => {
                StatusCode::BAD_REQUEST
            }
            Self::Denied => StatusCode::UNAUTHORIZED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short message safe to return to the caller.
    #[must_use]
    pub fn public_message(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "Not Found",
            Self::Ambiguous { .. } => "Internal Server Error",
            Self::Resource(_) | Self::InvalidResource | Self::Entities(_) | Self::InvalidEntities => {
                "Invalid request"
            }
            Self::Denied => "Not authorized with explicit deny",
            Self::Engine(_) => "Authorizer internal error",
            _ => "Internal Server Error during authorization",
        }
    }

    #[must_use]
    pub fn outcome(&self) -> AuthzOutcome {
        match self {
            Self::NotFound { .. } => AuthzOutcome::NotFound,
            Self::Ambiguous { .. } => AuthzOutcome::Ambiguous,
            Self::Resource(_) | Self::InvalidResource | Self::Entities(_) | Self::InvalidEntities => {
                AuthzOutcome::InvalidRequest
            }
            Self::Denied => AuthzOutcome::Denied,
            _ => AuthzOutcome::Failed,
        }
    }
}

#[cfg(feature = "axum-ext")]
impl axum::response::IntoResponse for EnforcementError {
    fn into_response(self) -> axum::response::Response {
        use axum::response::Json;
        use serde_json::json;

        let status = self.status();
        let body = Json(json!({
            "error": self.public_message(),
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}
