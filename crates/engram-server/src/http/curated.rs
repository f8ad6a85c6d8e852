//! Curated Memory Handlers
//!
//! The `/cam/curated/*` surface: AI-assisted analysis and storage of
//! conversation turns, intent-routed retrieval, and per-entity curation
//! statistics.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use engram_core::{
    CurationRequest, EngramError, OrderBy, ResonanceVector, RetrievalParams, RetrieveMultiRequest,
    RetrieveRequest,
};

use crate::error::{parse_body, ApiResult};
use crate::mcp::tools::memory::{classify_request, MemoryIntent};
use crate::sanitize;
use crate::state::AppState;

fn check_turn(state: &AppState, req: &CurationRequest) -> ApiResult<()> {
    sanitize::check_text("user_input", &req.user_input, state.config.max_comment_bytes)?;
    sanitize::check_text(
        "agent_response",
        &req.agent_response,
        state.config.max_comment_bytes,
    )?;
    if req.entity_id.trim().is_empty() {
        return Err(EngramError::InvalidRequest("entity_id must be non-empty".into()).into());
    }
    Ok(())
}

/// POST /cam/curated/analyze — curation decision report, nothing stored
pub async fn analyze(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> ApiResult<Json<Value>> {
    let req: CurationRequest = parse_body(body)?;
    check_turn(&state, &req)?;
    let report = state
        .with_deadline("curated_analyze", state.pipeline.analyze(&req))
        .await?;
    Ok(Json(serde_json::to_value(report).map_err(EngramError::from)?))
}

/// POST /cam/curated/store — curate the turn and store what is admitted
pub async fn store(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> ApiResult<Json<Value>> {
    let req: CurationRequest = parse_body(body)?;
    check_turn(&state, &req)?;
    let report = state
        .with_deadline("curated_store", state.pipeline.curate_and_store(&req))
        .await?;
    Ok(Json(serde_json::to_value(report).map_err(EngramError::from)?))
}

/// Natural-language retrieval request
#[derive(Debug, Deserialize)]
pub struct CuratedRetrieveRequest {
    pub query: String,
    pub entity_id: String,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_threshold")]
    pub similarity_threshold: f32,
}

fn default_top_k() -> usize {
    5
}

fn default_threshold() -> f32 {
    0.2
}

/// POST /cam/curated/retrieve — embed the query text and search the
/// caller's witnessed memories; the reply carries the interpreted
/// intent alongside the hits
pub async fn retrieve(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> ApiResult<Json<Value>> {
    let req: CuratedRetrieveRequest = parse_body(body)?;
    sanitize::check_text("query", &req.query, state.config.max_comment_bytes)?;
    if req.entity_id.trim().is_empty() {
        return Err(EngramError::InvalidRequest("entity_id must be non-empty".into()).into());
    }

    let intent = classify_request(&req.query);
    let vector = state
        .with_deadline("embed", state.embedder.embed(&req.query))
        .await?;

    let retrieval = RetrieveMultiRequest {
        requesting_entity: req.entity_id,
        request: RetrieveRequest {
            resonance_vectors: vec![ResonanceVector {
                vector,
                weight: 1.0,
                label: Some("query".into()),
            }],
            tags: None,
            filters: None,
            retrieval: RetrievalParams {
                top_k: req.top_k,
                similarity_threshold: req.similarity_threshold,
                diversity_lambda: None,
                boost_recent: false,
            },
            ordering: OrderBy::Similarity,
        },
        entity_filters: None,
    };

    let engine = Arc::clone(&state.engine);
    let result = state
        .run_blocking("curated_retrieve", move || engine.retrieve_multi(retrieval))
        .await?;

    Ok(Json(json!({
        "query": req.query,
        "interpreted_intent": match intent {
            MemoryIntent::Store => "store",
            MemoryIntent::Retrieve => "retrieve",
            MemoryIntent::Ambiguous => "ambiguous",
        },
        "result": result,
    })))
}

/// GET /cam/curated/stats/{entity_id} — per-entity curation counters
pub async fn stats(
    State(state): State<Arc<AppState>>,
    Path(entity_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let engine = Arc::clone(&state.engine);
    let entity = entity_id.clone();
    let stats = state
        .run_blocking("curation_stats", move || {
            engine.store().curation_stats(&entity)
        })
        .await?;
    Ok(Json(serde_json::to_value(stats).map_err(EngramError::from)?))
}
