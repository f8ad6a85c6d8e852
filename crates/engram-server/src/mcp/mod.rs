//! MCP Endpoint
//!
//! JSON-RPC 2.0 over `POST /mcp/`. The transport is plain HTTP:
//! request in, response out, `202 Accepted` for notifications.

pub mod messages;
pub mod server;
pub mod tools;
pub mod types;

use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use tracing::warn;

use crate::state::AppState;

use self::server::McpServer;
use self::types::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};

/// POST /mcp/ — handle one JSON-RPC request
pub async fn handle(State(state): State<Arc<AppState>>, body: String) -> Response {
    let request: JsonRpcRequest = match serde_json::from_str(&body) {
        Ok(r) => r,
        Err(e) => {
            warn!("Failed to parse JSON-RPC request: {e}");
            let error = JsonRpcResponse::reply(None, Err(JsonRpcError::parse()));
            return (
                StatusCode::BAD_REQUEST,
                [(header::CONTENT_TYPE, "application/json")],
                serde_json::to_string(&error).unwrap_or_default(),
            )
                .into_response();
        }
    };

    let server = McpServer::new(state);
    match server.handle_request(request).await {
        Some(response) => {
            let json = serde_json::to_string(&response).unwrap_or_else(|e| {
                warn!("Failed to serialize MCP response: {e}");
                r#"{"jsonrpc":"2.0","id":null,"error":{"code":-32603,"message":"Internal error"}}"#
                    .to_string()
            });
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "application/json")],
                json,
            )
                .into_response()
        }
        // Notification: no response body
        None => StatusCode::ACCEPTED.into_response(),
    }
}
