//! HTTP API handlers

use crate::engine::{EngineStatus, ReplySource, ResponseEngine};
use crate::error::Error;
use crate::learning::LearnOutcome;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Build the API router
pub fn router(engine: Arc<ResponseEngine>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/chat", post(chat))
        .route("/learn", post(learn))
        .route("/stats", get(stats))
        .layer(TraceLayer::new_for_http())
        .with_state(engine)
}

/// Engine error mapped onto an HTTP status
pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::Rejected(_) => StatusCode::UNPROCESSABLE_ENTITY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(error = %self.0, "Request failed");
        }
        (status, Json(serde_json::json!({ "error": self.0.to_string() }))).into_response()
    }
}

/// Health check response
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Chat request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChatRequest {
    message: String,
    #[serde(default)]
    conversation_id: Option<String>,
}

/// Chat response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ChatResponse {
    reply: String,
    source: ReplySource,
    conversation_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    learned: Option<LearnOutcome>,
}

async fn chat(
    State(engine): State<Arc<ResponseEngine>>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let conversation_id = match request.conversation_id {
        Some(id) if !id.trim().is_empty() => id,
        _ => engine.begin_conversation().await,
    };
    let reply = engine.respond(&conversation_id, &request.message).await?;
    Ok(Json(ChatResponse {
        reply: reply.text,
        source: reply.source,
        conversation_id,
        learned: reply.learned,
    }))
}

/// Learn request
#[derive(Debug, Deserialize)]
struct LearnRequest {
    input: String,
    response: String,
    #[serde(default)]
    quality: Option<u8>,
}

async fn learn(
    State(engine): State<Arc<ResponseEngine>>,
    Json(request): Json<LearnRequest>,
) -> Result<Json<LearnOutcome>, ApiError> {
    let outcome = engine
        .teach(&request.input, &request.response, request.quality)
        .await?;
    Ok(Json(outcome))
}

async fn stats(State(engine): State<Arc<ResponseEngine>>) -> Json<EngineStatus> {
    Json(engine.status().await)
}
