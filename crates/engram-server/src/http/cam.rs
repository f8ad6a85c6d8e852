//! Memory API Handlers
//!
//! The `/cam/*` surface: single-agent store/retrieve (legacy), the
//! multi-entity operations, annotations, and situation history. Both
//! store paths route into the same engine; single-agent memories are
//! one-witness multi-entity records.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde_json::{json, Value};

use engram_core::{
    Annotation, EngramError, RetrieveMultiRequest, RetrieveRequest, StoreMultiRequest,
    StoreSingleRequest,
};

use crate::error::{parse_body, ApiResult};
use crate::sanitize;
use crate::state::AppState;

/// POST /cam/store — single-agent store
pub async fn store_single(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> ApiResult<Json<Value>> {
    let req: StoreSingleRequest = parse_body(body)?;
    sanitize::check_text("content.text", &req.content.text, state.config.max_body_bytes)?;
    let engine = Arc::clone(&state.engine);
    let resp = state
        .run_blocking("store", move || engine.store_single(req))
        .await?;
    Ok(Json(serde_json::to_value(resp).map_err(EngramError::from)?))
}

/// POST /cam/retrieve — single-agent retrieve
pub async fn retrieve_single(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> ApiResult<Json<Value>> {
    let req: RetrieveRequest = parse_body(body)?;
    let engine = Arc::clone(&state.engine);
    let resp = state
        .run_blocking("retrieve", move || engine.retrieve_single(req))
        .await?;
    Ok(Json(serde_json::to_value(resp).map_err(EngramError::from)?))
}

/// GET /cam/memory/{id} — read a memory (legacy surface, no witness
/// scoping)
pub async fn get_memory(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let engine = Arc::clone(&state.engine);
    let record = state
        .run_blocking("get", move || engine.get(&id, None))
        .await?;
    Ok(Json(serde_json::to_value(record).map_err(EngramError::from)?))
}

/// POST /cam/memory/{id}/annotate — append an annotation
pub async fn annotate(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> ApiResult<Json<Value>> {
    let annotation: Annotation = parse_body(body)?;
    sanitize::check_text("content", &annotation.content, state.config.max_comment_bytes)?;
    let engine = Arc::clone(&state.engine);
    let memory_id = id.clone();
    state
        .run_blocking("annotate", move || engine.annotate(&memory_id, annotation))
        .await?;
    Ok(Json(json!({ "memory_id": id, "status": "annotated" })))
}

/// GET /cam/memory/{id}/annotations — list annotations
pub async fn annotations(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let engine = Arc::clone(&state.engine);
    let memory_id = id.clone();
    let notes = state
        .run_blocking("annotations", move || engine.annotations(&memory_id, None))
        .await?;
    Ok(Json(json!({
        "memory_id": id,
        "total": notes.len(),
        "annotations": notes,
    })))
}

/// POST /cam/multi/store — multi-entity store
pub async fn store_multi(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> ApiResult<Json<Value>> {
    let req: StoreMultiRequest = parse_body(body)?;
    sanitize::check_text("content.text", &req.content.text, state.config.max_body_bytes)?;
    let engine = Arc::clone(&state.engine);
    let resp = state
        .run_blocking("store_multi", move || engine.store_multi(req))
        .await?;
    Ok(Json(serde_json::to_value(resp).map_err(EngramError::from)?))
}

/// POST /cam/multi/retrieve — witness-scoped retrieve
pub async fn retrieve_multi(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> ApiResult<Json<Value>> {
    let req: RetrieveMultiRequest = parse_body(body)?;
    let engine = Arc::clone(&state.engine);
    let resp = state
        .run_blocking("retrieve_multi", move || engine.retrieve_multi(req))
        .await?;
    Ok(Json(serde_json::to_value(resp).map_err(EngramError::from)?))
}

/// GET /cam/multi/memory/{id}?requesting_entity=… — witness-checked read
pub async fn get_memory_multi(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Json<Value>> {
    let entity = params
        .get("requesting_entity")
        .filter(|e| !e.trim().is_empty())
        .cloned()
        .ok_or_else(|| {
            EngramError::InvalidRequest("requesting_entity query parameter is required".into())
        })?;
    let engine = Arc::clone(&state.engine);
    let record = state
        .run_blocking("get_multi", move || engine.get(&id, Some(&entity)))
        .await?;
    Ok(Json(serde_json::to_value(record).map_err(EngramError::from)?))
}

/// GET /cam/multi/situations/{entity_id} — situation history
pub async fn situations(
    State(state): State<Arc<AppState>>,
    Path(entity_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let engine = Arc::clone(&state.engine);
    let entity = entity_id.clone();
    let situations = state
        .run_blocking("situations", move || engine.situations_for(&entity))
        .await?;
    Ok(Json(json!({
        "entity_id": entity_id,
        "total": situations.len(),
        "situations": situations,
    })))
}
