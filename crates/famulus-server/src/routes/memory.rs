//! Memory service routes.

use crate::routes::internal_error;
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use famulus_types::{Interaction, KnowledgeEntry, KnowledgeSource, MemoryStats, TrainingReport, TrainingStats};
use serde::Deserialize;
use std::sync::Arc;

pub async fn stats(
    State(state): State<Arc<AppState>>,
) -> Result<Json<MemoryStats>, (StatusCode, String)> {
    let stats = state.memory.get_stats().map_err(internal_error)?;
    Ok(Json(stats))
}

#[derive(Deserialize)]
pub struct InteractionsQuery {
    pub limit: Option<u32>,
    pub session_id: Option<String>,
}

pub async fn interactions(
    State(state): State<Arc<AppState>>,
    Query(query): Query<InteractionsQuery>,
) -> Result<Json<Vec<Interaction>>, (StatusCode, String)> {
    let rows = state
        .memory
        .get_recent_interactions(query.limit.unwrap_or(50), query.session_id.as_deref())
        .map_err(internal_error)?;
    Ok(Json(rows))
}

#[derive(Deserialize)]
pub struct SearchQuery {
    pub q: String,
    pub limit: Option<u32>,
}

pub async fn search(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<Interaction>>, (StatusCode, String)> {
    let rows = state
        .memory
        .search_interactions(&query.q, query.limit.unwrap_or(50))
        .map_err(internal_error)?;
    Ok(Json(rows))
}

#[derive(Deserialize)]
pub struct StoreKnowledgeRequest {
    pub key: String,
    pub value: String,
    pub category: Option<String>,
    pub confidence: Option<f64>,
}

/// Manual knowledge store; last write wins.
pub async fn store_knowledge(
    State(state): State<Arc<AppState>>,
    Json(request): Json<StoreKnowledgeRequest>,
) -> Result<Json<KnowledgeEntry>, (StatusCode, String)> {
    state
        .memory
        .store_knowledge(
            &request.key,
            &request.value,
            request.category.as_deref(),
            request.confidence.unwrap_or(1.0),
            KnowledgeSource::Manual,
        )
        .map_err(internal_error)?;

    let entry = state
        .memory
        .get_knowledge_entry(&request.key)
        .map_err(internal_error)?
        .ok_or_else(|| internal_error("stored entry not found"))?;
    Ok(Json(entry))
}

pub async fn get_knowledge(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> Result<Json<KnowledgeEntry>, (StatusCode, String)> {
    let entry = state
        .memory
        .get_knowledge_entry(&key)
        .map_err(internal_error)?;
    match entry {
        Some(entry) => Ok(Json(entry)),
        None => Err((StatusCode::NOT_FOUND, format!("no knowledge for key '{key}'"))),
    }
}

#[derive(Deserialize, Default)]
pub struct TrainRequest {
    pub days_back: Option<i64>,
}

pub async fn train(
    State(state): State<Arc<AppState>>,
    Json(request): Json<TrainRequest>,
) -> Result<Json<TrainingReport>, (StatusCode, String)> {
    let report = state
        .memory
        .train_from_history(request.days_back.unwrap_or(30))
        .map_err(internal_error)?;
    Ok(Json(report))
}

pub async fn training_stats(
    State(state): State<Arc<AppState>>,
) -> Result<Json<TrainingStats>, (StatusCode, String)> {
    let stats = state.memory.get_training_stats().map_err(internal_error)?;
    Ok(Json(stats))
}
