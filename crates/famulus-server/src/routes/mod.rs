//! HTTP route handlers.

pub mod agent;
pub mod graph;
pub mod memory;

use crate::state::AppState;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use std::sync::Arc;

/// All bridge routes, to be nested under `/api`.
pub fn api_router() -> Router<Arc<AppState>> {
    Router::new()
        // Agent dispatch and lifecycle
        .route("/agent/run", post(agent::run))
        .route("/agent/action", post(agent::action))
        .route("/agent/diagnose", post(agent::diagnose))
        .route("/agent/status", get(agent::status))
        .route("/agent/reset", post(agent::reset))
        .route("/sessions/end", post(agent::end_session))
        // Memory service
        .route("/memory/stats", get(memory::stats))
        .route("/memory/interactions", get(memory::interactions))
        .route("/memory/search", get(memory::search))
        .route("/memory/knowledge", post(memory::store_knowledge))
        .route("/memory/knowledge/{key}", get(memory::get_knowledge))
        .route("/memory/train", post(memory::train))
        .route("/memory/training-stats", get(memory::training_stats))
        // Remote graph
        .route("/graph/sync", post(graph::sync))
        .route("/graph/edges", get(graph::edges))
        .route("/graph/projects/{name}/context", get(graph::project_context))
        .route("/graph/workspaces", get(graph::workspaces))
        // Health
        .route("/health", get(health))
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Storage and other unexpected failures surface as 500 with the error
/// text; envelope-style failures stay 200 payloads.
pub(crate) fn internal_error<E: std::fmt::Display>(e: E) -> (StatusCode, String) {
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}
