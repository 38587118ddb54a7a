//! Action schema compilation.
//!
//! The schema is a JSON document with a single namespace. Every action in it
//! carries an `httpVerb` and an `httpPathTemplate` annotation, and the
//! namespace is annotated with `mappingType: SimpleRest`.

use crate::config_error::SchemaError;
use crate::resolver::{ActionDefinition, VerbTable};
use crate::types::{EntityRef, HttpVerb};
use indexmap::IndexMap;
use serde::Deserialize;
use std::collections::BTreeMap;

pub const MAPPING_TYPE_ANNOTATION: &str = "mappingType";
pub const SIMPLE_REST_MAPPING: &str = "SimpleRest";
pub const HTTP_VERB_ANNOTATION: &str = "httpVerb";
pub const PATH_TEMPLATE_ANNOTATION: &str = "httpPathTemplate";

#[derive(Debug, Deserialize)]
struct RawNamespace {
    #[serde(default)]
    annotations: BTreeMap<String, String>,
    #[serde(default)]
    actions: IndexMap<String, Option<RawAction>>,
}

#[derive(Debug, Deserialize)]
struct RawAction {
    #[serde(default)]
    annotations: BTreeMap<String, String>,
}

fn annotation<'a>(annotations: &'a BTreeMap<String, String>, key: &str) -> Option<&'a str> {
    annotations
        .get(key)
        .map(String::as_str)
        .filter(|value| !value.is_empty())
}

/// Extract the namespace and its action definitions, in declaration order.
///
/// # Errors
/// Returns [`SchemaError`] when the document violates the schema contract.
pub fn parse_action_definitions(
    schema: &str,
) -> Result<(String, Vec<ActionDefinition>), SchemaError> {
    let namespaces: IndexMap<String, RawNamespace> = serde_json::from_str(schema)?;
    if namespaces.len() != 1 {
        return Err(SchemaError::NamespaceCount(namespaces.len()));
    }
    let Some((namespace, body)) = namespaces.into_iter().next() else {
        return Err(SchemaError::NamespaceCount(0));
    };

    match annotation(&body.annotations, MAPPING_TYPE_ANNOTATION) {
        None => return Err(SchemaError::MissingMappingType),
        Some(SIMPLE_REST_MAPPING) => {}
        Some(other) => return Err(SchemaError::InvalidMappingType(other.to_owned())),
    }

    let mut definitions = Vec::with_capacity(body.actions.len());
    for (action_id, raw) in body.actions {
        let Some(raw) = raw else {
            return Err(SchemaError::MissingAction(action_id));
        };
        let Some(verb) = annotation(&raw.annotations, HTTP_VERB_ANNOTATION) else {
            return Err(SchemaError::MissingVerb(action_id));
        };
        let Ok(verb) = verb.parse::<HttpVerb>() else {
            return Err(SchemaError::InvalidVerb {
                verb: verb.to_owned(),
                action: action_id,
            });
        };
        let Some(path_template) = annotation(&raw.annotations, PATH_TEMPLATE_ANNOTATION) else {
            return Err(SchemaError::MissingPathTemplate(action_id));
        };
        definitions.push(ActionDefinition {
            path_template: path_template.to_owned(),
            action_id,
            verb,
        });
    }

    Ok((namespace, definitions))
}

/// A compiled schema: one namespace and its verb table.
#[derive(Debug, Clone)]
pub struct ActionSchema {
    namespace: String,
    table: VerbTable,
}

impl ActionSchema {
    /// Compile a schema document.
    ///
    /// Overlapping templates are logged but do not fail compilation; requests
    /// hitting them resolve as ambiguous.
    ///
    /// # Errors
    /// Returns [`SchemaError`] for malformed schemas and invalid templates.
    pub fn compile(schema: &str) -> Result<Self, SchemaError> {
        let (namespace, definitions) = parse_action_definitions(schema)?;
        let table = VerbTable::compile(definitions)?;

        for overlap in table.overlaps() {
            tracing::warn!(
                namespace = %namespace,
                verb = %overlap.verb,
                first = %overlap.first.action_id,
                second = %overlap.second.action_id,
                "Path templates overlap; matching requests will be rejected as ambiguous"
            );
        }
        tracing::debug!(namespace = %namespace, actions = table.len(), "Action schema compiled");

        Ok(Self { namespace, table })
    }

    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    #[must_use]
    pub fn table(&self) -> &VerbTable {
        &self.table
    }

    /// `{type: "<ns>::Action", id: action_id}`.
    #[must_use]
    pub fn action_ref(&self, action_id: &str) -> EntityRef {
        EntityRef::new(format!("{}::Action", self.namespace), action_id)
    }

    /// The namespace-level default resource, `{type: "<ns>::Application", id: "<ns>"}`.
    #[must_use]
    pub fn application_ref(&self) -> EntityRef {
        EntityRef::new(format!("{}::Application", self.namespace), &self.namespace)
    }
}
