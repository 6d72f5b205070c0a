//! Agent dispatch and lifecycle routes.

use crate::routes::internal_error;
use crate::state::AppState;
use axum::{extract::State, http::StatusCode, Json};
use famulus_core::{Agent, DeskAgent};
use famulus_types::{DiagnoseParams, RunOutcome, TaskContext, TaskRequest};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

#[derive(Deserialize)]
pub struct RunRequest {
    /// Either a free-text string or a `{"task": ..., "parameters": ...}`
    /// directive object.
    pub task: Value,
    #[serde(default)]
    pub context: Option<TaskContext>,
}

/// Dispatch one task through the supervised agent.
pub async fn run(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RunRequest>,
) -> Json<RunOutcome> {
    let task = match &request.task {
        Value::String(text) => TaskRequest::parse(text),
        other => TaskRequest::from_value(other),
    };
    let ctx = request.context.unwrap_or_default();

    info!(target: "famulus::api", task = %task.describe(), "dispatching task");
    let outcome = state.agent.lock().await.safe_run(&task, &ctx);
    Json(outcome)
}

#[derive(Deserialize)]
pub struct ActionRequest {
    /// A structured action descriptor, e.g.
    /// `{"action": "list_directory", "path": "/tmp"}`.
    pub action: Value,
    #[serde(default)]
    pub context: Option<TaskContext>,
}

/// Execute one structured action against the capability modules.
/// Operation failures come back in-band as `success = false` envelopes.
pub async fn action(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ActionRequest>,
) -> Result<Json<famulus_types::OpOutcome>, (StatusCode, String)> {
    let ctx = request.context.unwrap_or_default();
    let outcome = state
        .agent
        .lock()
        .await
        .dispatch_action(&request.action, &ctx)
        .map_err(internal_error)?;
    Ok(Json(outcome))
}

#[derive(Serialize)]
pub struct DiagnoseResponse {
    pub report: String,
}

/// Run the read-only health sweep.
pub async fn diagnose(
    State(state): State<Arc<AppState>>,
    Json(params): Json<DiagnoseParams>,
) -> Result<Json<DiagnoseResponse>, (StatusCode, String)> {
    let report = state
        .agent
        .lock()
        .await
        .self_diagnose(&params)
        .map_err(internal_error)?;
    Ok(Json(DiagnoseResponse { report }))
}

#[derive(Serialize)]
pub struct AgentStatus {
    pub run_count: u32,
    pub max_runs: u32,
    pub remaining_runs: u32,
    pub expired: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

fn status_of(agent: &DeskAgent) -> AgentStatus {
    let shelf = agent.shelf_life();
    AgentStatus {
        run_count: shelf.run_count(),
        max_runs: shelf.max_runs(),
        remaining_runs: shelf.remaining_runs(),
        expired: shelf.is_expired(),
        session_id: agent.session_id().map(|s| s.to_string()),
    }
}

/// Current shelf-life counters.
pub async fn status(State(state): State<Arc<AppState>>) -> Json<AgentStatus> {
    let agent = state.agent.lock().await;
    Json(status_of(&agent))
}

#[derive(Deserialize, Default)]
pub struct ResetRequest {
    pub max_runs: Option<u32>,
}

/// Reset the shelf life, optionally with a new cap.
pub async fn reset(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ResetRequest>,
) -> Result<Json<AgentStatus>, (StatusCode, String)> {
    let mut agent = state.agent.lock().await;
    agent
        .shelf_life_mut()
        .reset(request.max_runs)
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
    Ok(Json(status_of(&agent)))
}

#[derive(Serialize)]
pub struct EndSessionResponse {
    pub status: &'static str,
}

/// Close the active session, if any.
pub async fn end_session(
    State(state): State<Arc<AppState>>,
) -> Result<Json<EndSessionResponse>, (StatusCode, String)> {
    state
        .agent
        .lock()
        .await
        .end_session()
        .map_err(internal_error)?;
    Ok(Json(EndSessionResponse { status: "ok" }))
}
