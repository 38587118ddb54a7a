use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Key/value context handed to the decision engine alongside the query.
pub type Context = Map<String, Value>;

/// HTTP verbs an action can be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpVerb {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpVerb {
    pub const ALL: [Self; 5] = [Self::Get, Self::Post, Self::Put, Self::Patch, Self::Delete];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::Post => "post",
            Self::Put => "put",
            Self::Patch => "patch",
            Self::Delete => "delete",
        }
    }

    /// Map a request method onto a supported verb; `None` for HEAD, OPTIONS, etc.
    #[must_use]
    pub fn from_method(method: &http::Method) -> Option<Self> {
        match method.as_str() {
            "GET" => Some(Self::Get),
            "POST" => Some(Self::Post),
            "PUT" => Some(Self::Put),
            "PATCH" => Some(Self::Patch),
            "DELETE" => Some(Self::Delete),
            _ => None,
        }
    }
}

impl fmt::Display for HttpVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported http verb `{0}`")]
pub struct UnsupportedVerb(pub String);

impl FromStr for HttpVerb {
    type Err = UnsupportedVerb;

    /// Schema annotations are matched exactly against the lower-case names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|verb| verb.as_str() == s)
            .ok_or_else(|| UnsupportedVerb(s.to_owned()))
    }
}

/// Opaque `{type, id}` reference into the decision engine's entity store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityRef {
    #[serde(rename = "type")]
    pub entity_type: String,
    pub id: String,
}

impl EntityRef {
    #[must_use]
    pub fn new(entity_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::\"{}\"", self.entity_type, self.id)
    }
}

/// An entity passed to the decision engine for policy evaluation.
///
/// `parents` lists group memberships; they are references only and are
/// never resolved here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub uid: EntityRef,
    #[serde(default)]
    pub attrs: Map<String, Value>,
    #[serde(default)]
    pub parents: Vec<EntityRef>,
}

impl Entity {
    /// An entity with no attributes and no parents.
    #[must_use]
    pub fn new(uid: EntityRef) -> Self {
        Self {
            uid,
            attrs: Map::new(),
            parents: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attrs.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_parent(mut self, parent: EntityRef) -> Self {
        self.parents.push(parent);
        self
    }
}

/// The query submitted to the decision engine for one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorizationQuery {
    pub principal: EntityRef,
    pub action: EntityRef,
    pub resource: EntityRef,
    pub context: Context,
}

/// Verdict returned by the decision engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Decision {
    Allow {
        #[serde(rename = "authorizerInfo", default)]
        authorizer_info: Map<String, Value>,
    },
    Deny,
    Error {
        message: String,
    },
}

/// Decision metadata attached to an allowed request for downstream handlers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthorizerInfo {
    /// The action the request was authorized against.
    pub action: EntityRef,
    /// Metadata returned by the decision engine.
    pub info: Map<String, Value>,
    /// Resource fetched by a route-specific resource provider, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<Entity>,
}

impl AuthorizerInfo {
    /// Engine metadata with the resource merged in under `"resource"`.
    #[must_use]
    pub fn merged(&self) -> Map<String, Value> {
        let mut merged = self.info.clone();
        if let Some(resource) = &self.resource
            && let Ok(value) = serde_json::to_value(resource)
        {
            merged.insert("resource".to_owned(), value);
        }
        merged
    }
}
