//! HTTP Surface
//!
//! Thin axum façade over the engine: parse → validate → engine call →
//! error mapping. Rate limiting runs before auth so blocked clients are
//! rejected without key validation work; `/health` is unauthenticated.

pub mod admin;
pub mod cam;
pub mod curated;

use std::sync::Arc;

use axum::middleware;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;

use crate::auth;
use crate::state::AppState;

/// Build the full application router
pub fn router(state: Arc<AppState>) -> Router {
    let public = Router::new()
        .route("/cam/store", post(cam::store_single))
        .route("/cam/retrieve", post(cam::retrieve_single))
        .route("/cam/memory/{id}", get(cam::get_memory))
        .route("/cam/memory/{id}/annotate", post(cam::annotate))
        .route("/cam/memory/{id}/annotations", get(cam::annotations))
        .route("/cam/multi/store", post(cam::store_multi))
        .route("/cam/multi/retrieve", post(cam::retrieve_multi))
        .route("/cam/multi/memory/{id}", get(cam::get_memory_multi))
        .route("/cam/multi/situations/{entity_id}", get(cam::situations))
        .route("/cam/curated/analyze", post(curated::analyze))
        .route("/cam/curated/store", post(curated::store))
        .route("/cam/curated/retrieve", post(curated::retrieve))
        .route("/cam/curated/stats/{entity_id}", get(curated::stats))
        .route("/mcp/", post(crate::mcp::handle))
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            auth::require_api_key,
        ))
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            auth::enforce_rate_limit,
        ));

    let admin = Router::new()
        .route("/api/v1/admin/flush/memories", post(admin::flush_memories))
        .route("/api/v1/admin/recreate/indexes", post(admin::recreate_indexes))
        .route("/api/v1/admin/status", get(admin::status))
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            auth::require_admin,
        ))
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            auth::enforce_rate_limit,
        ));

    Router::new()
        .route("/health", get(health))
        .merge(public)
        .merge(admin)
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// GET /health — unauthenticated liveness
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "engram",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
