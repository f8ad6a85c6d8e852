//! Admin Handlers
//!
//! Behind HTTP Basic + API key. These operate on the store directly;
//! they deliberately bypass nothing else — the witness predicate has no
//! admin override, so there is no admin read endpoint.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use engram_core::EngramError;

use crate::error::ApiResult;
use crate::state::AppState;

/// POST /api/v1/admin/flush/memories — drop all records, preserve the
/// index definition
pub async fn flush_memories(State(state): State<Arc<AppState>>) -> ApiResult<Json<Value>> {
    let engine = Arc::clone(&state.engine);
    let deleted = state
        .run_blocking("admin_flush", move || engine.store().flush_all())
        .await?;
    tracing::warn!(deleted, "admin flushed all memories");
    Ok(Json(json!({ "status": "flushed", "deleted": deleted })))
}

/// POST /api/v1/admin/recreate/indexes — rebuild the vector index from
/// stored embeddings
pub async fn recreate_indexes(State(state): State<Arc<AppState>>) -> ApiResult<Json<Value>> {
    let engine = Arc::clone(&state.engine);
    let indexed = state
        .run_blocking("admin_reindex", move || engine.store().rebuild_index())
        .await?;
    Ok(Json(json!({ "status": "recreated", "indexed": indexed })))
}

/// GET /api/v1/admin/status — counts and health
pub async fn status(State(state): State<Arc<AppState>>) -> ApiResult<Json<Value>> {
    let engine = Arc::clone(&state.engine);
    let stats = state
        .run_blocking("admin_status", move || engine.stats())
        .await?;
    Ok(Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "stats": serde_json::to_value(stats).map_err(EngramError::from)?,
    })))
}
