//! Authentication
//!
//! API-key validation for the public surface and HTTP Basic for the
//! admin surface. Keys are accepted from `X-API-Key`,
//! `Authorization: Bearer`, or the `api_key` query parameter (permitted
//! but logged as less secure). All comparisons are constant-time.

use axum::body::Body;
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use base64::Engine as _;
use std::sync::Arc;

use engram_core::EngramError;

use crate::error::ApiError;
use crate::state::AppState;

/// Constant-time byte comparison: the scan never short-circuits, so
/// timing reveals nothing about the position of the first mismatch.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

/// Pull the presented API key out of a request, checking header, bearer
/// token, then query string
pub fn presented_key(req: &Request<Body>) -> Option<String> {
    if let Some(key) = req
        .headers()
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
    {
        return Some(key.to_string());
    }
    if let Some(bearer) = req
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
    {
        return Some(bearer.to_string());
    }
    if let Some(query) = req.uri().query() {
        for pair in query.split('&') {
            if let Some(key) = pair.strip_prefix("api_key=") {
                tracing::warn!("api key presented via query parameter; prefer the X-API-Key header");
                return Some(key.to_string());
            }
        }
    }
    None
}

/// API-key middleware for the public surface
pub async fn require_api_key(
    State(state): State<Arc<AppState>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    if !state.config.auth_enabled {
        return next.run(req).await;
    }
    let Some(expected) = state.config.api_key.as_deref() else {
        // Auth enabled with no key configured is a deployment error;
        // fail closed.
        return ApiError(EngramError::Unauthorized("no API key configured".into()))
            .into_response();
    };

    match presented_key(&req) {
        Some(presented) if constant_time_eq(presented.as_bytes(), expected.as_bytes()) => {
            next.run(req).await
        }
        Some(_) => ApiError(EngramError::Unauthorized("invalid API key".into())).into_response(),
        None => ApiError(EngramError::Unauthorized("missing API key".into())).into_response(),
    }
}

/// Admin middleware: HTTP Basic credentials *and* a valid API key
pub async fn require_admin(
    State(state): State<Arc<AppState>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let (Some(user), Some(password)) = (
        state.config.admin_user.as_deref(),
        state.config.admin_password.as_deref(),
    ) else {
        return ApiError(EngramError::Unauthorized(
            "admin credentials not configured".into(),
        ))
        .into_response();
    };

    let authorized = req
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Basic "))
        .and_then(|b64| base64::engine::general_purpose::STANDARD.decode(b64).ok())
        .is_some_and(|decoded| {
            let expected = format!("{user}:{password}");
            constant_time_eq(&decoded, expected.as_bytes())
        });

    if !authorized {
        return ApiError(EngramError::Unauthorized("admin authentication failed".into()))
            .into_response();
    }
    require_api_key(State(state), req, next).await
}

/// Rate-limit middleware; rejects with 429 immediately, never queues
pub async fn enforce_rate_limit(
    State(state): State<Arc<AppState>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let client = client_address(&req);
    if let Err(e) = state.limiter.check(&client) {
        return ApiError(e).into_response();
    }
    next.run(req).await
}

/// Best-effort client address: `X-Forwarded-For` first hop, then the
/// socket peer, then a shared bucket
fn client_address(req: &Request<Body>) -> String {
    if let Some(forwarded) = req
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
    {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }
    req.extensions()
        .get::<axum::extract::ConnectInfo<std::net::SocketAddr>>()
        .map(|info| info.0.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"secret", b"secret"));
        assert!(!constant_time_eq(b"secret", b"secres"));
        assert!(!constant_time_eq(b"secret", b"secret1"));
        assert!(constant_time_eq(b"", b""));
    }

    #[test]
    fn test_presented_key_sources() {
        let req = Request::builder()
            .uri("/cam/store")
            .header("x-api-key", "k1")
            .body(Body::empty())
            .unwrap();
        assert_eq!(presented_key(&req).as_deref(), Some("k1"));

        let req = Request::builder()
            .uri("/cam/store")
            .header("authorization", "Bearer k2")
            .body(Body::empty())
            .unwrap();
        assert_eq!(presented_key(&req).as_deref(), Some("k2"));

        let req = Request::builder()
            .uri("/cam/store?api_key=k3&x=1")
            .body(Body::empty())
            .unwrap();
        assert_eq!(presented_key(&req).as_deref(), Some("k3"));

        let req = Request::builder()
            .uri("/cam/store")
            .body(Body::empty())
            .unwrap();
        assert!(presented_key(&req).is_none());
    }

    #[test]
    fn test_header_beats_query() {
        let req = Request::builder()
            .uri("/cam/store?api_key=query-key")
            .header("x-api-key", "header-key")
            .body(Body::empty())
            .unwrap();
        assert_eq!(presented_key(&req).as_deref(), Some("header-key"));
    }
}
