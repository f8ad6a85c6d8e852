//! HTTP Error Mapping
//!
//! Maps the engine error taxonomy onto HTTP statuses and the
//! `{"error": {"code", "message", "details?"}}` envelope. Internal
//! failures are returned as a short opaque message plus a correlation
//! id; the detailed cause only goes to the log.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use uuid::Uuid;

use engram_core::EngramError;

/// Handler-level error: an engine error plus the response machinery
#[derive(Debug)]
pub struct ApiError(pub EngramError);

impl From<EngramError> for ApiError {
    fn from(e: EngramError) -> Self {
        ApiError(e)
    }
}

/// Handler result alias
pub type ApiResult<T> = std::result::Result<T, ApiError>;

impl ApiError {
    /// `(status, code)` pair per error kind
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match &self.0 {
            EngramError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
            EngramError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "unauthorized"),
            EngramError::Forbidden(_) => (StatusCode::FORBIDDEN, "forbidden"),
            EngramError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            EngramError::AlreadyExists(_) => (StatusCode::CONFLICT, "already_exists"),
            EngramError::RateLimited { .. } => (StatusCode::TOO_MANY_REQUESTS, "rate_limited"),
            EngramError::Timeout(_) => (StatusCode::GATEWAY_TIMEOUT, "timeout"),
            EngramError::Storage(_) => (StatusCode::SERVICE_UNAVAILABLE, "storage_error"),
            EngramError::Upstream(_) => (StatusCode::BAD_GATEWAY, "upstream_error"),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let body = match &self.0 {
            // Backend details stay in the log; clients get an opaque
            // message and a correlation id.
            EngramError::Storage(detail) | EngramError::Upstream(detail) => {
                let correlation_id = Uuid::new_v4().to_string();
                tracing::error!(%correlation_id, code, "request failed: {detail}");
                json!({
                    "error": {
                        "code": code,
                        "message": "internal backend failure",
                        "correlation_id": correlation_id,
                    }
                })
            }
            EngramError::RateLimited {
                retry_after_seconds,
            } => json!({
                "error": {
                    "code": code,
                    "message": self.0.to_string(),
                    "retry_after_seconds": retry_after_seconds,
                }
            }),
            other => json!({
                "error": {
                    "code": code,
                    "message": other.to_string(),
                }
            }),
        };

        (status, Json(body)).into_response()
    }
}

/// Parse a JSON body into a typed request, mapping failures onto
/// `InvalidRequest` so the error envelope stays consistent.
pub fn parse_body<T: serde::de::DeserializeOwned>(value: serde_json::Value) -> ApiResult<T> {
    serde_json::from_value(value)
        .map_err(|e| ApiError(EngramError::InvalidRequest(format!("body: {e}"))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (EngramError::InvalidRequest("x".into()), StatusCode::BAD_REQUEST),
            (EngramError::Unauthorized("x".into()), StatusCode::UNAUTHORIZED),
            (EngramError::Forbidden("x".into()), StatusCode::FORBIDDEN),
            (EngramError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (EngramError::AlreadyExists("x".into()), StatusCode::CONFLICT),
            (
                EngramError::RateLimited { retry_after_seconds: 1 },
                StatusCode::TOO_MANY_REQUESTS,
            ),
            (EngramError::Timeout("x".into()), StatusCode::GATEWAY_TIMEOUT),
            (EngramError::Storage("x".into()), StatusCode::SERVICE_UNAVAILABLE),
            (EngramError::Upstream("x".into()), StatusCode::BAD_GATEWAY),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError(err).status_and_code().0, status);
        }
    }

    #[test]
    fn test_parse_body_maps_to_invalid_request() {
        #[derive(Debug, serde::Deserialize)]
        struct Needs {
            #[allow(dead_code)]
            field: String,
        }
        let err = parse_body::<Needs>(json!({"wrong": 1})).unwrap_err();
        assert!(matches!(err.0, EngramError::InvalidRequest(_)));
    }
}
