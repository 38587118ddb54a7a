#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::request::Parts;
use axum::response::Response;
use http_body_util::BodyExt;
use rest_authz::{
    ActionSchema, AuthorizationQuery, AuthzMetricLabels, AuthzMetrics, AuthzOutcome, Decision,
    DecisionEngine, EngineError, EntitiesProvider, Entity, EntityRef, PrincipalProvider,
    ProviderError, ResourceProvider,
};
use serde_json::{Map, Value};
use std::sync::Mutex;

pub const STORE_SCHEMA: &str = include_str!("../fixtures/store_schema.json");

pub fn store_schema() -> ActionSchema {
    ActionSchema::compile(STORE_SCHEMA).unwrap()
}

/// What the fake engine answers with
#[derive(Debug, Clone)]
pub enum Verdict {
    Allow(Map<String, Value>),
    Deny,
    Error(String),
    Unavailable,
    Panic,
}

/// Fake `DecisionEngine` that records every query it receives
pub struct RecordingEngine {
    verdict: Verdict,
    calls: Mutex<Vec<(AuthorizationQuery, Vec<Entity>)>>,
}

impl RecordingEngine {
    pub fn new(verdict: Verdict) -> Self {
        Self {
            verdict,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn allow() -> Self {
        let mut info = Map::new();
        info.insert("determiningPolicies".to_owned(), Value::from(vec!["policy0"]));
        Self::new(Verdict::Allow(info))
    }

    pub fn calls(&self) -> Vec<(AuthorizationQuery, Vec<Entity>)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl DecisionEngine for RecordingEngine {
    async fn is_authorized(
        &self,
        query: &AuthorizationQuery,
        entities: &[Entity],
    ) -> Result<Decision, EngineError> {
        self.calls
            .lock()
            .unwrap()
            .push((query.clone(), entities.to_vec()));

        match &self.verdict {
            Verdict::Allow(info) => Ok(Decision::Allow {
                authorizer_info: info.clone(),
            }),
            Verdict::Deny => Ok(Decision::Deny),
            Verdict::Error(message) => Ok(Decision::Error {
                message: message.clone(),
            }),
            Verdict::Unavailable => Err(EngineError::Unavailable("connection refused".to_owned())),
            Verdict::Panic => panic!("decision engine exploded"),
        }
    }
}

/// Custom principal built from the `x-user` header, with group parents
/// taken from `x-groups`
pub struct HeaderUserPrincipal;

#[async_trait]
impl PrincipalProvider for HeaderUserPrincipal {
    async fn principal(&self, parts: &Parts) -> Result<Entity, ProviderError> {
        let user = parts
            .headers
            .get("x-user")
            .and_then(|v| v.to_str().ok())
            .ok_or(ProviderError::MissingAuthorization)?;

        let mut entity =
            Entity::new(EntityRef::new("Store::User", user)).with_attr("name", user.to_owned());
        if let Some(groups) = parts.headers.get("x-groups").and_then(|v| v.to_str().ok()) {
            for group in groups.split(',') {
                entity = entity.with_parent(EntityRef::new("Store::UserGroup", group.trim()));
            }
        }
        Ok(entity)
    }
}

/// Resource provider reading the pet id from the last path segment
pub struct PetResource;

#[async_trait]
impl ResourceProvider for PetResource {
    async fn resource(&self, parts: &Parts) -> Result<Option<Entity>, ProviderError> {
        let id = parts
            .uri
            .path()
            .rsplit('/')
            .find(|segment| !segment.is_empty() && *segment != "sale")
            .ok_or_else(|| ProviderError::msg("no pet id"))?;
        Ok(Some(
            Entity::new(EntityRef::new("Store::Pet", id)).with_attr("owner", "alice"),
        ))
    }
}

/// Resource provider that always fails the same way
pub enum BrokenResource {
    Fails,
    Missing,
    Panics,
}

#[async_trait]
impl ResourceProvider for BrokenResource {
    async fn resource(&self, _parts: &Parts) -> Result<Option<Entity>, ProviderError> {
        match self {
            BrokenResource::Fails => Err(ProviderError::msg("pet store database unavailable")),
            BrokenResource::Missing => Ok(None),
            BrokenResource::Panics => panic!("resource provider exploded"),
        }
    }
}

/// Entities provider returning a fixed list, nothing, or an error
pub enum FixedEntities {
    List(Vec<Entity>),
    Missing,
    Fails,
}

#[async_trait]
impl EntitiesProvider for FixedEntities {
    async fn entities(&self, _parts: &Parts) -> Result<Option<Vec<Entity>>, ProviderError> {
        match self {
            FixedEntities::List(entities) => Ok(Some(entities.clone())),
            FixedEntities::Missing => Ok(None),
            FixedEntities::Fails => Err(ProviderError::msg("group lookup failed")),
        }
    }
}

/// Metrics backend that keeps every recorded outcome
#[derive(Default)]
pub struct RecordingMetrics {
    outcomes: Mutex<Vec<AuthzOutcome>>,
}

impl RecordingMetrics {
    pub fn outcomes(&self) -> Vec<AuthzOutcome> {
        self.outcomes.lock().unwrap().clone()
    }
}

impl AuthzMetrics for RecordingMetrics {
    fn record_outcome(&self, outcome: AuthzOutcome, _labels: &AuthzMetricLabels) {
        self.outcomes.lock().unwrap().push(outcome);
    }

    fn record_decision_latency(&self, _duration_ms: u64, _labels: &AuthzMetricLabels) {}
}

pub async fn json_body(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn text_body(response: Response<Body>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}
