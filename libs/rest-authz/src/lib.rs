#![warn(warnings)]

// Core modules
pub mod errors;
pub mod traits;
pub mod types;

// Schema and routing
pub mod bypass;
pub mod resolver;
pub mod schema;
pub mod template;

// Query assembly
pub mod context;
pub mod principal;

// Enforcement
pub mod config;
pub mod config_error;
pub mod enforcer;
pub mod metrics;

#[cfg(feature = "axum-ext")]
pub mod axum_ext;

// Core exports
pub use errors::{EnforcementError, EngineError, ProviderError};
pub use traits::{
    ActionProvider, ContextProvider, DecisionEngine, EntitiesProvider, PrincipalProvider,
    ResourceProvider,
};
pub use types::{
    AuthorizationQuery, AuthorizerInfo, Context, Decision, Entity, EntityRef, HttpVerb,
};

// Schema and routing exports
pub use bypass::{BypassMatcher, BypassRule};
pub use resolver::{ActionDefinition, CompiledMatcher, MatchOutcome, Overlap, VerbTable, resolve};
pub use schema::ActionSchema;
pub use template::{PathParams, RouteMatcher, convert_path_template};

// Assembly exports
pub use context::{
    ContextMapping, PathParamValue, QueryParams, flatten_path_params, flatten_query_string,
    normalize_headers, parse_query_string,
};
pub use principal::{PrincipalMapping, bearer_principal};

// Enforcement exports
pub use config::{AuthzConfig, ContextMode, PrincipalMode};
pub use config_error::{ConfigError, PathTemplateError, SchemaError};
pub use enforcer::{Enforcer, EnforcerBuilder, GenericOutcome, RouteAuthorization};
pub use metrics::{
    AuthzMetricLabels, AuthzMetrics, AuthzOutcome, EnforcementMode, LoggingMetrics, NoOpMetrics,
};

#[cfg(feature = "axum-ext")]
pub use axum_ext::{Authorized, RouteGuard, authorize_request, authorize_route};
