//! # Engram Server
//!
//! The service binary's library: an axum REST surface and an MCP
//! JSON-RPC endpoint over one shared witness-scoped memory engine,
//! with API-key auth, per-IP rate limiting and input sanitisation in
//! front of both.

pub mod auth;
pub mod error;
pub mod http;
pub mod mcp;
pub mod rate_limit;
pub mod sanitize;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use rate_limit::RateLimiter;
pub use state::AppState;
