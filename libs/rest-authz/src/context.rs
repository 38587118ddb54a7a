//! Request context normalization.

use crate::template::PathParams;
use crate::traits::ContextProvider;
use crate::types::Context;
use http::HeaderMap;
use http::request::Parts;
use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

pub const PATH_PARAMETERS_KEY: &str = "pathParameters";
pub const QUERY_STRING_PARAMETERS_KEY: &str = "queryStringParameters";

/// A raw path parameter as captured by a router.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathParamValue {
    One(String),
    Many(Vec<String>),
}

/// Parsed query string; `None` stands for a key present without a value.
pub type QueryParams = IndexMap<String, Option<Value>>;

/// Wrap single values into one-element arrays; arrays pass through.
#[must_use]
pub fn flatten_path_params<I, K>(params: I) -> IndexMap<String, Vec<String>>
where
    I: IntoIterator<Item = (K, PathParamValue)>,
    K: Into<String>,
{
    params
        .into_iter()
        .map(|(key, value)| {
            let values = match value {
                PathParamValue::One(v) => vec![v],
                PathParamValue::Many(vs) => vs,
            };
            (key.into(), values)
        })
        .collect()
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Flatten every query parameter into an array of strings.
///
/// Strings become one-element arrays; array elements are kept when they are
/// strings and JSON-encoded otherwise; objects and other scalars become a
/// one-element array of their JSON encoding; a missing value is `"undefined"`.
#[must_use]
pub fn flatten_query_string(params: &QueryParams) -> IndexMap<String, Vec<String>> {
    params
        .iter()
        .map(|(key, value)| {
            let values = match value {
                None => vec!["undefined".to_owned()],
                Some(Value::String(s)) => vec![s.clone()],
                Some(Value::Array(items)) => items.iter().map(stringify).collect(),
                Some(other) => vec![other.to_string()],
            };
            (key.clone(), values)
        })
        .collect()
}

fn bracketed(key: &str) -> Option<(&str, &str)> {
    let (base, rest) = key.split_once('[')?;
    let sub = rest.strip_suffix(']')?;
    (!base.is_empty() && !sub.is_empty() && !sub.contains(['[', ']'])).then_some((base, sub))
}

fn append(slot: &mut Value, value: String) {
    match slot {
        Value::Array(items) => items.push(Value::String(value)),
        existing => {
            let previous = existing.take();
            *existing = Value::Array(vec![previous, Value::String(value)]);
        }
    }
}

/// Parse a raw query string.
///
/// A key seen once maps to a string, a repeated key or `key[]` maps to an
/// array and `key[sub]` maps to a one-level object.
#[must_use]
pub fn parse_query_string(raw: &str) -> QueryParams {
    let pairs: Vec<(String, String)> = match serde_urlencoded::from_str(raw) {
        Ok(pairs) => pairs,
        Err(e) => {
            tracing::debug!(error = %e, "Ignoring malformed query string");
            return QueryParams::new();
        }
    };

    let mut params = QueryParams::new();
    for (key, value) in pairs {
        if let Some(base) = key.strip_suffix("[]").filter(|base| !base.is_empty()) {
            let slot = params.entry(base.to_owned()).or_insert(None);
            match slot {
                Some(existing) => append(existing, value),
                None => *slot = Some(Value::Array(vec![Value::String(value)])),
            }
        } else if let Some((base, sub)) = bracketed(&key) {
            let slot = params
                .entry(base.to_owned())
                .or_insert_with(|| Some(Value::Object(Map::new())));
            match slot {
                Some(Value::Object(map)) => {
                    map.insert(sub.to_owned(), Value::String(value));
                }
                Some(other) => append(other, value),
                None => {
                    let mut map = Map::new();
                    map.insert(sub.to_owned(), Value::String(value));
                    *slot = Some(Value::Object(map));
                }
            }
        } else {
            match params.get_mut(&key) {
                Some(Some(slot)) => append(slot, value),
                _ => {
                    params.insert(key, Some(Value::String(value)));
                }
            }
        }
    }
    params
}

/// Header values grouped by lower-case name; non-UTF-8 values are skipped.
#[must_use]
pub fn normalize_headers(headers: &HeaderMap) -> BTreeMap<String, Vec<String>> {
    let mut normalized: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in headers {
        if let Ok(value) = value.to_str() {
            normalized
                .entry(name.as_str().to_owned())
                .or_default()
                .push(value.to_owned());
        }
    }
    normalized
}

/// The automatic context: flattened path captures and query parameters.
#[must_use]
pub fn auto_context(parts: &Parts, path_params: &PathParams) -> Context {
    let path = flatten_path_params(
        path_params
            .iter()
            .map(|(name, value)| (name, PathParamValue::One(value.to_owned()))),
    );
    let query = flatten_query_string(&parse_query_string(parts.uri.query().unwrap_or_default()));

    let mut context = Context::new();
    context.insert(
        PATH_PARAMETERS_KEY.to_owned(),
        serde_json::to_value(path).unwrap_or_default(),
    );
    context.insert(
        QUERY_STRING_PARAMETERS_KEY.to_owned(),
        serde_json::to_value(query).unwrap_or_default(),
    );
    context
}

/// How the decision context is built for each request.
#[derive(Clone, Default)]
pub enum ContextMapping {
    /// Path and query parameters.
    Auto,
    #[default]
    Empty,
    Custom(Arc<dyn ContextProvider>),
}

impl fmt::Debug for ContextMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => f.write_str("Auto"),
            Self::Empty => f.write_str("Empty"),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl ContextMapping {
    #[must_use]
    pub fn build(&self, parts: &Parts, path_params: &PathParams) -> Context {
        match self {
            Self::Auto => auto_context(parts, path_params),
            Self::Empty => Context::new(),
            Self::Custom(provider) => provider.context(parts),
        }
    }
}
