use crate::bypass::{BypassMatcher, BypassRule};
use crate::config_error::ConfigError;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variables with this prefix override file settings,
/// e.g. `AUTHZ__PRINCIPAL=identity_token`.
pub const ENV_PREFIX: &str = "AUTHZ__";

/// Built-in principal strategies selectable from configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrincipalMode {
    AccessToken,
    IdentityToken,
    /// A provider must be attached in code
    Custom,
}

/// Built-in context strategies selectable from configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextMode {
    Auto,
    #[default]
    Empty,
}

/// Enforcement configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthzConfig {
    /// Path to the JSON action schema
    pub schema_path: Option<PathBuf>,

    /// Principal strategy (required before an enforcer can be built)
    pub principal: Option<PrincipalMode>,

    pub context: ContextMode,

    /// Endpoints exempt from enforcement
    pub skipped_endpoints: Vec<BypassRule>,
}

impl AuthzConfig {
    /// Layered sources: defaults, then the YAML file, then `AUTHZ__*` env vars.
    #[must_use]
    pub fn figment(path: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Load and validate the layered configuration.
    ///
    /// # Errors
    /// Returns [`ConfigError`] if the file is missing, a layer fails to
    /// deserialize, or a bypass rule does not compile.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path
            && !path.is_file()
        {
            return Err(ConfigError::MissingConfigFile(path.to_path_buf()));
        }

        let config: Self = Self::figment(path).extract().map_err(Box::new)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration for consistency
    ///
    /// # Errors
    /// Returns [`ConfigError::Bypass`] for the first rule that does not compile.
    pub fn validate(&self) -> Result<(), ConfigError> {
        BypassMatcher::compile(&self.skipped_endpoints)?;
        Ok(())
    }

    /// Read the schema document named by `schema_path`.
    ///
    /// # Errors
    /// Returns [`ConfigError`] if no path is configured or the file cannot be read.
    pub fn read_schema(&self) -> Result<String, ConfigError> {
        let path = self
            .schema_path
            .as_ref()
            .ok_or(ConfigError::MissingSchemaPath)?;
        std::fs::read_to_string(path).map_err(|source| ConfigError::SchemaRead {
            path: path.clone(),
            source,
        })
    }
}
