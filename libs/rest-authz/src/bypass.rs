use crate::config_error::PathTemplateError;
use crate::template::{RouteMatcher, strip_query};
use serde::{Deserialize, Serialize};

/// An endpoint exempt from enforcement.
///
/// `path` is either literal or a template in `:name` or `{name}` syntax.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BypassRule {
    pub http_verb: String,
    pub path: String,
}

impl BypassRule {
    #[must_use]
    pub fn new(http_verb: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            http_verb: http_verb.into(),
            path: path.into(),
        }
    }
}

#[derive(Debug, Clone)]
struct CompiledRule {
    verb: String,
    path: String,
    matcher: RouteMatcher,
}

/// Bypass rules compiled once at startup.
#[derive(Debug, Clone, Default)]
pub struct BypassMatcher {
    rules: Vec<CompiledRule>,
}

impl BypassMatcher {
    /// # Errors
    /// Returns [`PathTemplateError`] for the first rule whose path cannot be
    /// compiled, e.g. one using a `*` wildcard.
    pub fn compile(rules: &[BypassRule]) -> Result<Self, PathTemplateError> {
        let rules = rules
            .iter()
            .map(|rule| {
                Ok(CompiledRule {
                    verb: rule.http_verb.to_ascii_lowercase(),
                    path: rule.path.clone(),
                    matcher: RouteMatcher::from_template(&rule.path)?,
                })
            })
            .collect::<Result<Vec<_>, PathTemplateError>>()?;
        Ok(Self { rules })
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Whether a request with this method and target skips enforcement.
    ///
    /// Rules for other verbs never apply.
    #[must_use]
    pub fn is_bypassed(&self, verb: &str, raw_path: &str) -> bool {
        let path = strip_query(raw_path);
        self.rules
            .iter()
            .filter(|rule| rule.verb.eq_ignore_ascii_case(verb))
            .any(|rule| rule.path == path || rule.matcher.matches(path).is_some())
    }
}
