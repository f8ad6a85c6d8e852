//! Collaborator fakes
//!
//! The embedder hashes text into a stable unit vector; the curator
//! replays a scripted reply (or a scripted failure). Both are fully
//! deterministic so scenario assertions stay exact across runs.

use async_trait::async_trait;
use std::sync::Mutex;

use engram_core::{
    ConversationTurn, Curator, CuratorReply, Embedder, EngramError, Observation, PrivacyLevel,
    Result, StorageType,
};

/// Embedding dimension used throughout the e2e suite
pub const TEST_DIMENSIONS: usize = 32;

/// Deterministic text embedder.
///
/// A shared positive base keeps any two English sentences loosely
/// similar (they share the bulk of the direction), while byte-position
/// hashing separates genuinely different content enough for ranking
/// assertions.
pub struct HashEmbedder {
    pub dimensions: usize,
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self {
            dimensions: TEST_DIMENSIONS,
        }
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(EngramError::InvalidRequest("cannot embed empty text".into()));
        }
        let mut v = vec![0.3_f32; self.dimensions];
        for (i, b) in text.bytes().enumerate() {
            v[(i * 7 + b as usize) % self.dimensions] += (b as f32) / 512.0;
        }
        engram_core::normalize_unit(&mut v);
        Ok(v)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// Curator that replays a scripted outcome
pub struct ScriptedCurator {
    reply: Mutex<std::result::Result<CuratorReply, String>>,
}

impl ScriptedCurator {
    pub fn replying(reply: CuratorReply) -> Self {
        Self {
            reply: Mutex::new(Ok(reply)),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            reply: Mutex::new(Err(message.to_string())),
        }
    }

    /// The standard two-observation script: one durable fact, one
    /// transient weather remark
    pub fn fact_and_weather() -> Self {
        Self::replying(CuratorReply {
            observations: vec![
                Observation {
                    memory_type: StorageType::Facts,
                    content: "Christian lives in Liversedge".into(),
                    confidence_score: 0.95,
                    ephemerality_score: 0.1,
                    contextual_value: 0.9,
                    privacy_level: PrivacyLevel::ParticipantsOnly,
                    rationale: "stable personal fact".into(),
                    requires_review: false,
                },
                Observation {
                    memory_type: StorageType::Temporary,
                    content: "It is raining right now".into(),
                    confidence_score: 0.9,
                    ephemerality_score: 0.95,
                    contextual_value: 0.3,
                    privacy_level: PrivacyLevel::ParticipantsOnly,
                    rationale: "weather is transient".into(),
                    requires_review: false,
                },
            ],
            should_store: true,
            overall_reasoning: "one durable fact, one transient observation".into(),
        })
    }
}

#[async_trait]
impl Curator for ScriptedCurator {
    async fn curate(&self, _turn: &ConversationTurn) -> Result<CuratorReply> {
        let guard = self
            .reply
            .lock()
            .map_err(|_| EngramError::Upstream("script lock poisoned".into()))?;
        match &*guard {
            Ok(reply) => Ok(reply.clone()),
            Err(message) => Err(EngramError::Upstream(message.clone())),
        }
    }
}
