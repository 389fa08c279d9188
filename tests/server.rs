use axum::{
    body::{self, Body},
    http::{header, Request, StatusCode},
    Router,
};
use std::sync::Arc;
use tower::util::ServiceExt;

use evidence_harness::config::Config;
use evidence_harness::retrieve::Retriever;
use evidence_harness::server::{router, AppState};
use evidence_harness_core::models::Passage;
use evidence_harness_core::store::memory::InMemoryStore;
use evidence_harness_core::store::Store;

async fn app() -> Router {
    let store = InMemoryStore::new();
    for (id, content) in [
        ("m-1", "Hold the reset button for ten seconds to restore defaults."),
        ("m-2", "The amber light means a firmware update is in progress."),
        ("m-3", "Mount the router on a wall using the supplied screws."),
    ] {
        store
            .upsert_passage(
                &Passage {
                    id: id.to_string(),
                    scope_key: Some("manual".to_string()),
                    content: content.to_string(),
                    locator: serde_json::json!({ "section": id }),
                },
                None,
            )
            .await
            .unwrap();
    }

    let config: Config = toml::from_str("[db]\npath = \"unused.sqlite\"\n").unwrap();
    let store: Arc<dyn Store> = Arc::new(store);
    router(AppState::new(Retriever::new(store, None, &config)))
}

async fn post_retrieve(app: Router, payload: &str) -> (StatusCode, serde_json::Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/retrieve")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(payload.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let body = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn test_health_returns_ok() {
    let response = app()
        .await
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_retrieve_returns_contract_shape() {
    let (status, json) = post_retrieve(
        app().await,
        r#"{"query": "reset button", "scopeKey": "manual", "targetCount": 2}"#,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["tierUsed"], "lexical");
    assert_eq!(json["results"][0]["id"], "m-1");
    assert_eq!(json["results"][0]["rank"], 1);
    assert_eq!(json["results"][0]["sourceTier"], "lexical");
    assert_eq!(json["results"][0]["locator"]["section"], "m-1");
    assert!(json["signals"]["topScore"].is_number());
    assert!(json["signals"]["avgTop3"].is_number());
    assert!(json["signals"]["strongHitCount"].is_number());
    assert_eq!(json["signals"]["isWeak"], false);
    assert!(json["confidence"].is_string());
}

#[tokio::test]
async fn test_retrieve_exhausted_is_ok_and_weak() {
    let (status, json) = post_retrieve(app().await, r#"{"query": "xyzzy"}"#).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["tierUsed"], "none");
    assert_eq!(json["results"], serde_json::json!([]));
    assert_eq!(json["signals"]["isWeak"], true);
    assert_eq!(json["confidence"], "weak");
}

#[tokio::test]
async fn test_retrieve_unknown_scope_finds_nothing() {
    let (status, json) =
        post_retrieve(app().await, r#"{"query": "reset", "scopeKey": "other"}"#).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["tierUsed"], "none");
}

#[tokio::test]
async fn test_retrieve_blank_query_is_bad_request() {
    let (status, json) = post_retrieve(app().await, r#"{"query": "  "}"#).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "bad_request");
    assert_eq!(json["error"]["message"], "query must not be empty");
}

#[tokio::test]
async fn test_retrieve_malformed_body_is_bad_request() {
    let (status, json) = post_retrieve(app().await, r#"{"scopeKey": "manual"}"#).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "bad_request");
}
