//! Remote-graph routes.

use crate::routes::internal_error;
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use famulus_types::{GraphEdge, ProjectContext, SyncReport, WorkspaceGroup};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Deserialize, Default)]
pub struct SyncRequest {
    pub url: Option<String>,
    pub force: Option<bool>,
}

/// Trigger a graph sync. Fetch failures come back as an unsuccessful
/// report, not an HTTP error.
pub async fn sync(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SyncRequest>,
) -> Result<Json<SyncReport>, (StatusCode, String)> {
    let report = state
        .memory
        .sync_remote_graph(request.url.as_deref(), request.force.unwrap_or(false))
        .map_err(internal_error)?;
    Ok(Json(report))
}

#[derive(Deserialize)]
pub struct EdgesQuery {
    pub source: Option<String>,
    pub target: Option<String>,
    #[serde(rename = "type")]
    pub edge_type: Option<String>,
}

pub async fn edges(
    State(state): State<Arc<AppState>>,
    Query(query): Query<EdgesQuery>,
) -> Result<Json<Vec<GraphEdge>>, (StatusCode, String)> {
    let edges = state
        .memory
        .get_remote_graph_edges(
            query.source.as_deref(),
            query.target.as_deref(),
            query.edge_type.as_deref(),
        )
        .map_err(internal_error)?;
    Ok(Json(edges))
}

pub async fn project_context(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<ProjectContext>, (StatusCode, String)> {
    let context = state
        .memory
        .get_project_context(&name)
        .map_err(internal_error)?;
    Ok(Json(context))
}

pub async fn workspaces(
    State(state): State<Arc<AppState>>,
) -> Result<Json<BTreeMap<String, WorkspaceGroup>>, (StatusCode, String)> {
    let overview = state
        .memory
        .get_workspace_overview()
        .map_err(internal_error)?;
    Ok(Json(overview))
}
