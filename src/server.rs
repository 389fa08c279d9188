//! HTTP retrieval server.
//!
//! Exposes the `Retrieve` boundary as a JSON API.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/retrieve` | Run tiered retrieval for one query |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Request
//!
//! ```json
//! { "query": "how do I reset the router", "scopeKey": "manual-v2", "targetCount": 6 }
//! ```
//!
//! `scopeKey` and `targetCount` are optional; `targetCount` defaults to
//! `[retrieval].target_count`.
//!
//! # Response
//!
//! ```json
//! {
//!   "results": [{ "id": "...", "content": "...", "score": 0.91, "locator": {},
//!                 "sourceTier": "dense", "rank": 1 }],
//!   "signals": { "topScore": 0.91, "avgTop3": 0.89, "strongHitCount": 5, "isWeak": false },
//!   "tierUsed": "dense",
//!   "confidence": "strong"
//! }
//! ```
//!
//! An exhausted search is a normal `200` with `tierUsed: "none"`.
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "query must not be empty" } }
//! ```
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use evidence_harness_core::models::Retrieval;
use evidence_harness_core::signals::Confidence;
use evidence_harness_core::store::Store;

use crate::config::Config;
use crate::db;
use crate::error::RetrievalError;
use crate::retrieve::Retriever;
use crate::sqlite_store::SqliteStore;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub retriever: Arc<Retriever>,
}

impl AppState {
    pub fn new(retriever: Retriever) -> Self {
        Self {
            retriever: Arc::new(retriever),
        }
    }
}

/// Build the application router. Split from [`run_server`] so tests can
/// drive it without binding a socket.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/retrieve", post(handle_retrieve))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state)
}

/// Starts the HTTP server on `[server].bind` and serves until Ctrl-C.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let pool = db::connect(config).await?;
    let store: Arc<dyn Store> = Arc::new(SqliteStore::new(pool.clone()));
    let retriever = Retriever::from_config(store, config)?;
    let app = router(AppState::new(retriever));

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    tracing::info!(
        bind = %config.server.bind,
        embeddings = config.embedding.is_enabled(),
        "Retrieval server listening."
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    pool.close().await;
    tracing::info!("Retrieval server stopped.");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "Failed to listen for shutdown signal.");
        std::future::pending::<()>().await;
    }
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    /// Machine-readable error code (e.g., `"bad_request"`).
    code: String,
    message: String,
}

/// Error type that converts into an Axum HTTP response.
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

/// Constructs a 400 Bad Request error.
fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

impl From<RetrievalError> for AppError {
    fn from(err: RetrievalError) -> Self {
        match err {
            RetrievalError::InvalidInput(message) => bad_request(message),
        }
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /retrieve ============

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RetrieveRequest {
    query: String,
    #[serde(default)]
    scope_key: Option<String>,
    #[serde(default)]
    target_count: Option<usize>,
}

#[derive(Serialize)]
struct RetrieveResponse {
    #[serde(flatten)]
    retrieval: Retrieval,
    confidence: Confidence,
}

/// Handler for `POST /retrieve`.
///
/// Returns `400` for a malformed body or blank query. Tier failures never
/// surface here; they degrade into a lower tier or `tierUsed: "none"`.
async fn handle_retrieve(
    State(state): State<AppState>,
    payload: Result<Json<RetrieveRequest>, JsonRejection>,
) -> Result<Json<RetrieveResponse>, AppError> {
    let Json(req) = payload.map_err(|rejection| bad_request(rejection.body_text()))?;
    let retriever = &state.retriever;

    let target = req
        .target_count
        .unwrap_or_else(|| retriever.default_target_count());
    let retrieval = retriever
        .retrieve(&req.query, req.scope_key.as_deref(), target)
        .await?;
    let confidence = retriever.classify(&retrieval);

    Ok(Json(RetrieveResponse {
        retrieval,
        confidence,
    }))
}
