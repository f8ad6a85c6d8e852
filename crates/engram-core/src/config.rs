//! Process Configuration
//!
//! Read once from `ENGRAM_`-prefixed environment variables at startup and
//! immutable for the process lifetime. Every knob has a documented
//! default; hot-reload is deliberately not supported.

use std::path::PathBuf;

/// Cleanup scheduler configuration
#[derive(Debug, Clone)]
pub struct CleanupConfig {
    /// TTL expiry job period (default: daily)
    pub expiry_interval_secs: u64,
    /// Consolidation job period (default: weekly)
    pub consolidation_interval_secs: u64,
    /// Importance decay job period (default: monthly)
    pub decay_interval_secs: u64,
    /// Cosine similarity above which same-witness pairs are merged
    pub consolidation_threshold: f32,
    /// Decay rate per day of age
    pub decay_lambda: f64,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            expiry_interval_secs: 86_400,
            consolidation_interval_secs: 604_800,
            decay_interval_secs: 2_592_000,
            consolidation_threshold: 0.95,
            decay_lambda: 0.01,
        }
    }
}

/// Process-wide configuration
#[derive(Debug, Clone)]
pub struct EngramConfig {
    /// SQLite path; platform data directory when unset
    pub db_path: Option<PathBuf>,
    /// Embedding dimension D, fixed per deployment
    pub dimensions: usize,
    /// Base URL of the embedding model API
    pub embedding_url: String,
    /// Embedding model identifier
    pub embedding_model: String,
    /// Base URL of the curator model API
    pub curator_url: String,
    /// Curator model identifier
    pub curator_model: String,
    /// The API secret key clients must present
    pub api_key: Option<String>,
    /// Whether API-key auth is enforced
    pub auth_enabled: bool,
    /// Sliding-window caps per client IP
    pub rate_limit_per_minute: u32,
    pub rate_limit_per_hour: u32,
    /// Block duration after an hour-limit breach
    pub rate_limit_block_secs: u64,
    /// Byte ceiling for comment-like text fields
    pub max_comment_bytes: usize,
    /// Byte ceiling for everything else
    pub max_body_bytes: usize,
    /// Admin basic-auth credentials
    pub admin_user: Option<String>,
    pub admin_password: Option<String>,
    /// Per-request deadline
    pub request_timeout_secs: u64,
    pub cleanup: CleanupConfig,
    /// HTTP bind address
    pub host: String,
    pub port: u16,
}

impl Default for EngramConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            dimensions: 768,
            embedding_url: "http://localhost:11434".into(),
            embedding_model: "nomic-embed-text".into(),
            curator_url: "http://localhost:11434".into(),
            curator_model: "llama3.1".into(),
            api_key: None,
            auth_enabled: true,
            rate_limit_per_minute: 60,
            rate_limit_per_hour: 1000,
            rate_limit_block_secs: 3600,
            max_comment_bytes: 10_000,
            max_body_bytes: 1024 * 1024,
            admin_user: None,
            admin_password: None,
            request_timeout_secs: 30,
            cleanup: CleanupConfig::default(),
            host: "127.0.0.1".into(),
            port: 8900,
        }
    }
}

impl EngramConfig {
    /// Load configuration from `ENGRAM_*` environment variables,
    /// falling back to defaults for anything unset.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let cleanup_defaults = CleanupConfig::default();
        Self {
            db_path: var("ENGRAM_DB_PATH").map(PathBuf::from),
            dimensions: parsed("ENGRAM_VECTOR_DIM", defaults.dimensions),
            embedding_url: var("ENGRAM_EMBEDDING_URL").unwrap_or(defaults.embedding_url),
            embedding_model: var("ENGRAM_EMBEDDING_MODEL").unwrap_or(defaults.embedding_model),
            curator_url: var("ENGRAM_CURATOR_URL").unwrap_or(defaults.curator_url),
            curator_model: var("ENGRAM_CURATOR_MODEL").unwrap_or(defaults.curator_model),
            api_key: var("ENGRAM_API_KEY"),
            auth_enabled: parsed_bool("ENGRAM_ENABLE_AUTH", defaults.auth_enabled),
            rate_limit_per_minute: parsed(
                "ENGRAM_RATE_LIMIT_PER_MINUTE",
                defaults.rate_limit_per_minute,
            ),
            rate_limit_per_hour: parsed("ENGRAM_RATE_LIMIT_PER_HOUR", defaults.rate_limit_per_hour),
            rate_limit_block_secs: parsed(
                "ENGRAM_RATE_LIMIT_BLOCK_SECS",
                defaults.rate_limit_block_secs,
            ),
            max_comment_bytes: parsed("ENGRAM_MAX_COMMENT_BYTES", defaults.max_comment_bytes),
            max_body_bytes: parsed("ENGRAM_MAX_BODY_BYTES", defaults.max_body_bytes),
            admin_user: var("ENGRAM_ADMIN_USER"),
            admin_password: var("ENGRAM_ADMIN_PASSWORD"),
            request_timeout_secs: parsed(
                "ENGRAM_REQUEST_TIMEOUT_SECS",
                defaults.request_timeout_secs,
            ),
            cleanup: CleanupConfig {
                expiry_interval_secs: parsed(
                    "ENGRAM_CLEANUP_EXPIRY_SECS",
                    cleanup_defaults.expiry_interval_secs,
                ),
                consolidation_interval_secs: parsed(
                    "ENGRAM_CLEANUP_CONSOLIDATION_SECS",
                    cleanup_defaults.consolidation_interval_secs,
                ),
                decay_interval_secs: parsed(
                    "ENGRAM_CLEANUP_DECAY_SECS",
                    cleanup_defaults.decay_interval_secs,
                ),
                consolidation_threshold: parsed(
                    "ENGRAM_CONSOLIDATION_THRESHOLD",
                    cleanup_defaults.consolidation_threshold,
                ),
                decay_lambda: parsed("ENGRAM_DECAY_LAMBDA", cleanup_defaults.decay_lambda),
            },
            host: var("ENGRAM_HOST").unwrap_or(defaults.host),
            port: parsed("ENGRAM_PORT", defaults.port),
        }
    }
}

fn var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn parsed<T: std::str::FromStr>(name: &str, default: T) -> T {
    var(name).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn parsed_bool(name: &str, default: bool) -> bool {
    match var(name).as_deref() {
        Some("1") | Some("true") | Some("yes") | Some("on") => true,
        Some("0") | Some("false") | Some("no") | Some("off") => false,
        _ => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = EngramConfig::default();
        assert_eq!(cfg.dimensions, 768);
        assert_eq!(cfg.rate_limit_per_minute, 60);
        assert_eq!(cfg.rate_limit_per_hour, 1000);
        assert_eq!(cfg.max_comment_bytes, 10_000);
        assert!(cfg.auth_enabled);
    }

    #[test]
    fn test_parsed_bool_forms() {
        assert!(parsed_bool("ENGRAM_TEST_UNSET_FLAG", true));
        assert!(!parsed_bool("ENGRAM_TEST_UNSET_FLAG", false));
    }
}
