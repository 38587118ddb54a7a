#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Generic enforcement middleware driven through a real Axum Router

mod common;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
    middleware::from_fn_with_state,
    routing::{get, put},
};
use common::{
    HeaderUserPrincipal, RecordingEngine, RecordingMetrics, Verdict, json_body, store_schema,
    text_body,
};
use rest_authz::{
    ActionSchema, Authorized, AuthzOutcome, BypassRule, ContextMapping, Enforcer, EntityRef,
    PrincipalMapping, authorize_request,
};
use serde_json::json;
use std::sync::Arc;
use tower::ServiceExt; // for `oneshot`

async fn authorized_handler(Authorized(info): Authorized) -> String {
    info.action.id
}

async fn open_handler() -> &'static str {
    "open"
}

fn app(enforcer: Enforcer) -> Router {
    Router::new()
        .route(
            "/pets",
            get(authorized_handler)
                .post(authorized_handler)
                .options(open_handler),
        )
        .route("/pets/{petId}", get(authorized_handler))
        .route("/pets/{petId}/sale", put(authorized_handler))
        .route("/login", get(open_handler))
        .layer(from_fn_with_state(Arc::new(enforcer), authorize_request))
}

fn custom_enforcer(engine: Arc<RecordingEngine>) -> Enforcer {
    Enforcer::builder(store_schema())
        .with_decision_engine(engine)
        .with_principal_provider(Arc::new(HeaderUserPrincipal))
        .with_skipped_endpoint(BypassRule::new("get", "/login"))
        .build()
        .unwrap()
}

fn request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("x-user", "alice")
        .header("x-groups", "admins, sellers")
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_allowed_request_reaches_handler() {
    let engine = Arc::new(RecordingEngine::allow());
    let response = app(custom_enforcer(engine.clone()))
        .oneshot(request("GET", "/pets"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(text_body(response).await, "GetPets");

    let calls = engine.calls();
    assert_eq!(calls.len(), 1);
    let (query, entities) = &calls[0];
    assert_eq!(query.principal, EntityRef::new("Store::User", "alice"));
    assert_eq!(query.action, EntityRef::new("Store::Action", "GetPets"));
    assert_eq!(query.resource, EntityRef::new("Store::Application", "Store"));
    assert!(query.context.is_empty());

    assert_eq!(entities.len(), 1);
    assert_eq!(entities[0].uid, query.principal);
    assert_eq!(
        entities[0].parents,
        vec![
            EntityRef::new("Store::UserGroup", "admins"),
            EntityRef::new("Store::UserGroup", "sellers"),
        ]
    );
}

#[tokio::test]
async fn test_unregistered_verb_returns_404() {
    let engine = Arc::new(RecordingEngine::allow());
    let response = app(custom_enforcer(engine.clone()))
        .oneshot(request("POST", "/pets/7/sale"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        json_body(response).await,
        json!({"error": "Not Found", "status": 404})
    );
    assert_eq!(engine.call_count(), 0);
}

#[tokio::test]
async fn test_missing_identity_returns_500_without_engine_call() {
    let engine = Arc::new(RecordingEngine::allow());
    let response = app(custom_enforcer(engine.clone()))
        .oneshot(
            Request::builder()
                .uri("/pets")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        json_body(response).await["error"],
        "Internal Server Error during authorization"
    );
    assert_eq!(engine.call_count(), 0);
}

#[tokio::test]
async fn test_explicit_deny_returns_401() {
    let engine = Arc::new(RecordingEngine::new(Verdict::Deny));
    let response = app(custom_enforcer(engine.clone()))
        .oneshot(request("GET", "/pets/3"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        json_body(response).await,
        json!({"error": "Not authorized with explicit deny", "status": 401})
    );
    assert_eq!(engine.call_count(), 1);
}

#[tokio::test]
async fn test_engine_reported_error_returns_500() {
    let engine = Arc::new(RecordingEngine::new(Verdict::Error(
        "policy set failed to parse".to_owned(),
    )));
    let response = app(custom_enforcer(engine))
        .oneshot(request("GET", "/pets"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(response).await;
    assert_eq!(body["error"], "Authorizer internal error");
    assert!(!body.to_string().contains("policy set"));
}

#[tokio::test]
async fn test_engine_unavailable_returns_500() {
    let engine = Arc::new(RecordingEngine::new(Verdict::Unavailable));
    let response = app(custom_enforcer(engine))
        .oneshot(request("GET", "/pets"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        json_body(response).await["error"],
        "Internal Server Error during authorization"
    );
}

#[tokio::test]
async fn test_engine_panic_returns_500() {
    let engine = Arc::new(RecordingEngine::new(Verdict::Panic));
    let response = app(custom_enforcer(engine))
        .oneshot(request("GET", "/pets"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_unsupported_method_passes_through() {
    let engine = Arc::new(RecordingEngine::new(Verdict::Deny));
    let response = app(custom_enforcer(engine.clone()))
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri("/pets")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(text_body(response).await, "open");
    assert_eq!(engine.call_count(), 0);
}

#[tokio::test]
async fn test_bypassed_endpoint_skips_everything() {
    let engine = Arc::new(RecordingEngine::new(Verdict::Deny));
    let response = app(custom_enforcer(engine.clone()))
        .oneshot(
            Request::builder()
                .uri("/login?redirect=%2Fpets")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(engine.call_count(), 0);
}

#[tokio::test]
async fn test_ambiguous_templates_return_500() {
    let schema = ActionSchema::compile(
        &json!({
            "Store": {
                "annotations": {"mappingType": "SimpleRest"},
                "actions": {
                    "GetPet": {"annotations": {"httpVerb": "get", "httpPathTemplate": "/pets/{petId}"}},
                    "GetMyPets": {"annotations": {"httpVerb": "get", "httpPathTemplate": "/pets/mine"}}
                }
            }
        })
        .to_string(),
    )
    .unwrap();
    let engine = Arc::new(RecordingEngine::allow());
    let enforcer = Enforcer::builder(schema)
        .with_decision_engine(engine.clone())
        .with_principal_provider(Arc::new(HeaderUserPrincipal))
        .build()
        .unwrap();

    let response = app(enforcer)
        .oneshot(request("GET", "/pets/mine"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        json_body(response).await,
        json!({"error": "Internal Server Error", "status": 500})
    );
    assert_eq!(engine.call_count(), 0);
}

#[tokio::test]
async fn test_token_principal_sends_no_entities() {
    let engine = Arc::new(RecordingEngine::allow());
    let enforcer = Enforcer::builder(store_schema())
        .with_decision_engine(engine.clone())
        .with_principal(PrincipalMapping::AccessToken)
        .build()
        .unwrap();

    let response = app(enforcer)
        .oneshot(
            Request::builder()
                .uri("/pets/9")
                .header("Authorization", "Bearer opaque-token-123")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let calls = engine.calls();
    let (query, entities) = &calls[0];
    assert_eq!(query.principal, EntityRef::new("Principal", "opaque-token-123"));
    assert_eq!(query.action.id, "GetPet");
    assert!(entities.is_empty());
}

#[tokio::test]
async fn test_auto_context_carries_captures_and_query() {
    let engine = Arc::new(RecordingEngine::allow());
    let enforcer = Enforcer::builder(store_schema())
        .with_decision_engine(engine.clone())
        .with_principal_provider(Arc::new(HeaderUserPrincipal))
        .with_context(ContextMapping::Auto)
        .build()
        .unwrap();

    let response = app(enforcer)
        .oneshot(request("GET", "/pets/fluffy%20cat?tag=a&tag=b&limit=5"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let calls = engine.calls();
    let context = serde_json::Value::Object(calls[0].0.context.clone());
    assert_eq!(
        context,
        json!({
            "pathParameters": {"petId": ["fluffy cat"]},
            "queryStringParameters": {"tag": ["a", "b"], "limit": ["5"]},
        })
    );
}

#[tokio::test]
async fn test_outcomes_are_recorded() {
    let engine = Arc::new(RecordingEngine::allow());
    let metrics = Arc::new(RecordingMetrics::default());
    let enforcer = Enforcer::builder(store_schema())
        .with_decision_engine(engine)
        .with_principal_provider(Arc::new(HeaderUserPrincipal))
        .with_skipped_endpoint(BypassRule::new("get", "/login"))
        .with_metrics(metrics.clone())
        .build()
        .unwrap();
    let app = app(enforcer);

    for (method, uri) in [
        ("GET", "/pets"),
        ("GET", "/login"),
        ("OPTIONS", "/pets"),
        ("DELETE", "/pets"),
    ] {
        app.clone().oneshot(request(method, uri)).await.unwrap();
    }

    assert_eq!(
        metrics.outcomes(),
        vec![
            AuthzOutcome::Allowed,
            AuthzOutcome::Bypassed,
            AuthzOutcome::Passthrough,
            AuthzOutcome::NotFound,
        ]
    );
}

#[tokio::test]
async fn test_extractor_without_middleware_returns_500() {
    let app = Router::new().route("/pets", get(authorized_handler));

    let response = app.oneshot(request("GET", "/pets")).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

fn admin_schema() -> ActionSchema {
    ActionSchema::compile(
        &json!({
            "Store": {
                "annotations": {"mappingType": "SimpleRest"},
                "actions": {
                    "GetPet": {"annotations": {"httpVerb": "get", "httpPathTemplate": "/pets/{petId}"}},
                    "AdminGetPet": {"annotations": {"httpVerb": "get", "httpPathTemplate": "/admin/pets/{petId}"}}
                }
            }
        })
        .to_string(),
    )
    .unwrap()
}

#[tokio::test]
async fn test_nested_router_resolves_full_path() {
    let engine = Arc::new(RecordingEngine::allow());
    let enforcer = Enforcer::builder(admin_schema())
        .with_decision_engine(engine.clone())
        .with_principal_provider(Arc::new(HeaderUserPrincipal))
        .with_skipped_endpoint(BypassRule::new("get", "/pets/{petId}"))
        .build()
        .unwrap();

    let inner = Router::new()
        .route("/pets/{petId}", get(authorized_handler))
        .layer(from_fn_with_state(Arc::new(enforcer), authorize_request));
    let app = Router::new().nest("/admin", inner);

    let response = app.oneshot(request("GET", "/admin/pets/7")).await.unwrap();

    // Neither the stripped path's action nor its bypass rule may apply.
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(text_body(response).await, "AdminGetPet");
    let calls = engine.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0.action, EntityRef::new("Store::Action", "AdminGetPet"));
}
