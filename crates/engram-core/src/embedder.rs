//! Embedder Client
//!
//! The embedding model lives out of process. The engine only ever sees a
//! `Vec<f32>` of the configured dimension; production wires this to an
//! OpenAI-compatible embeddings endpoint, tests wire a deterministic
//! fake.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;

use crate::error::{EngramError, Result};
use crate::memory::validate_vector;

/// Produces fixed-dimension embedding vectors for text
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a single text; the result has exactly `dimensions()` finite
    /// components
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// The vector dimension this embedder produces
    fn dimensions(&self) -> usize;
}

/// Embedder backed by an OpenAI-compatible `/v1/embeddings` endpoint
pub struct HttpEmbedder {
    client: Client,
    base_url: String,
    model: String,
    dimensions: usize,
}

impl HttpEmbedder {
    pub fn new(base_url: &str, model: &str, dimensions: usize) -> Self {
        Self {
            client: Client::builder()
                .connect_timeout(Duration::from_secs(10))
                .timeout(Duration::from_secs(60))
                .build()
                .unwrap_or_default(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            dimensions,
        }
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(EngramError::InvalidRequest(
                "cannot embed empty text".into(),
            ));
        }

        let url = format!("{}/v1/embeddings", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&json!({
                "model": self.model,
                "input": [text],
            }))
            .send()
            .await
            .map_err(|e| EngramError::Upstream(format!("embedder request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(EngramError::Upstream(format!(
                "embedder returned {status}"
            )));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| EngramError::Upstream(format!("embedder response unreadable: {e}")))?;

        let vector: Vec<f32> = body["data"][0]["embedding"]
            .as_array()
            .ok_or_else(|| EngramError::Upstream("embedder reply missing data[0].embedding".into()))?
            .iter()
            .map(|v| v.as_f64().unwrap_or(f64::NAN) as f32)
            .collect();

        validate_vector(&vector, self.dimensions)
            .map_err(|e| EngramError::Upstream(format!("embedder produced a bad vector: {e}")))?;
        Ok(vector)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
