//! Engine Error Taxonomy
//!
//! One error enum for the whole engine. The protocol layers map these onto
//! HTTP status codes and JSON-RPC tool errors; the variants are chosen so
//! that mapping is a straight match statement.

/// Engine error type
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum EngramError {
    /// Schema or field-type violation; the message enumerates offending paths
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    /// Missing or bad API key
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    /// Witness check failed
    #[error("Forbidden: {0}")]
    Forbidden(String),
    /// Unknown memory id
    #[error("Not found: {0}")]
    NotFound(String),
    /// Duplicate memory id
    #[error("Already exists: {0}")]
    AlreadyExists(String),
    /// Per-client request cap exceeded
    #[error("Rate limited, retry after {retry_after_seconds}s")]
    RateLimited { retry_after_seconds: u64 },
    /// Deadline expired; safe to retry on reads, unsafe on writes
    #[error("Timed out: {0}")]
    Timeout(String),
    /// Transient backend failure
    #[error("Storage error: {0}")]
    Storage(String),
    /// Embedder or curator call failed
    #[error("Upstream error: {0}")]
    Upstream(String),
}

impl From<rusqlite::Error> for EngramError {
    fn from(e: rusqlite::Error) -> Self {
        EngramError::Storage(e.to_string())
    }
}

impl From<serde_json::Error> for EngramError {
    fn from(e: serde_json::Error) -> Self {
        EngramError::Storage(format!("serialization: {e}"))
    }
}

/// Engine result type
pub type Result<T> = std::result::Result<T, EngramError>;
