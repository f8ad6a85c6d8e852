//! Shared Application State
//!
//! One engine, one curation pipeline, one rate limiter, handed to every
//! handler behind an `Arc`.

use std::sync::Arc;
use std::time::Duration;

use engram_core::{
    CurationPipeline, Embedder, EngramConfig, EngramError, MemoryEngine, Result,
};

use crate::rate_limit::RateLimiter;

/// Shared application state
pub struct AppState {
    pub engine: Arc<MemoryEngine>,
    pub pipeline: Arc<CurationPipeline>,
    pub embedder: Arc<dyn Embedder>,
    pub config: Arc<EngramConfig>,
    pub limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn new(
        engine: Arc<MemoryEngine>,
        pipeline: Arc<CurationPipeline>,
        embedder: Arc<dyn Embedder>,
        config: EngramConfig,
    ) -> Arc<Self> {
        let limiter = Arc::new(RateLimiter::new(
            config.rate_limit_per_minute,
            config.rate_limit_per_hour,
            config.rate_limit_block_secs,
        ));
        Arc::new(Self {
            engine,
            pipeline,
            embedder,
            config: Arc::new(config),
            limiter,
        })
    }

    /// Time-box a future with the configured request deadline and map
    /// expiry onto `Timeout`
    pub async fn with_deadline<T>(
        &self,
        operation: &str,
        fut: impl std::future::Future<Output = Result<T>>,
    ) -> Result<T> {
        let deadline = Duration::from_secs(self.config.request_timeout_secs.max(1));
        match tokio::time::timeout(deadline, fut).await {
            Ok(result) => result,
            Err(_) => Err(EngramError::Timeout(format!(
                "{operation} exceeded {}s deadline",
                deadline.as_secs()
            ))),
        }
    }

    /// Run a synchronous engine call on the blocking pool under the
    /// request deadline, keeping async workers free of store I/O
    pub async fn run_blocking<T, F>(&self, operation: &str, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        self.with_deadline(operation, async {
            tokio::task::spawn_blocking(f)
                .await
                .map_err(|e| EngramError::Storage(format!("worker failed: {e}")))?
        })
        .await
    }
}
