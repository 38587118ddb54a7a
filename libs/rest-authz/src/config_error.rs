use std::path::PathBuf;
use thiserror::Error;

/// A path template that cannot be compiled into a matcher.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid path template `{template}`: {reason}")]
pub struct PathTemplateError {
    pub template: String,
    pub reason: String,
}

impl PathTemplateError {
    pub(crate) fn new(template: &str, reason: impl Into<String>) -> Self {
        Self {
            template: template.to_owned(),
            reason: reason.into(),
        }
    }
}

/// Errors raised while compiling an action schema.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("schema is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("schema must contain exactly one namespace, found {0}")]
    NamespaceCount(usize),

    #[error("mappingType annotation not found")]
    MissingMappingType,

    #[error("mappingType `{0}` is not valid, expected `SimpleRest`")]
    InvalidMappingType(String),

    #[error("action `{0}` has no definition")]
    MissingAction(String),

    #[error("action `{0}` has no httpVerb annotation")]
    MissingVerb(String),

    #[error("action `{action}` has unsupported httpVerb `{verb}`")]
    InvalidVerb { action: String, verb: String },

    #[error("action `{0}` has no httpPathTemplate annotation")]
    MissingPathTemplate(String),

    #[error(transparent)]
    PathTemplate(#[from] PathTemplateError),
}

/// Errors raised while configuring an enforcer.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("a decision engine is required")]
    MissingDecisionEngine,

    #[error("principal configuration is required; valid types: access_token, identity_token, custom")]
    MissingPrincipal,

    #[error("principal mode `custom` requires a principal provider")]
    MissingCustomPrincipal,

    #[error("configuration file `{}` does not exist", .0.display())]
    MissingConfigFile(PathBuf),

    #[error("schema path is not configured")]
    MissingSchemaPath,

    #[error("failed to read schema `{}`", path.display())]
    SchemaRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("invalid bypass rule: {0}")]
    Bypass(#[from] PathTemplateError),

    #[error("configuration error: {0}")]
    Figment(#[from] Box<figment::Error>),
}
