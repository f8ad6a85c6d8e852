//! Curator Client
//!
//! An AI observer that decomposes a conversation turn into scored
//! candidate observations. Production wires this to a chat-completion
//! model API; tests wire a deterministic fake. Upstream failure never
//! fails the request: the pipeline degrades to a low-confidence
//! `context` observation flagged for review.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;

use crate::error::{EngramError, Result};
use crate::memory::{MemoryType, PrivacyLevel};

// ============================================================================
// CURATOR VOCABULARY
// ============================================================================

/// Curator storage vocabulary; mapped onto record memory types and
/// retention policies on admission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    Facts,
    Preferences,
    Context,
    Temporary,
    Skills,
    Relationships,
}

impl StorageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageType::Facts => "facts",
            StorageType::Preferences => "preferences",
            StorageType::Context => "context",
            StorageType::Temporary => "temporary",
            StorageType::Skills => "skills",
            StorageType::Relationships => "relationships",
        }
    }

    /// Default retention policy per storage type
    pub fn retention_policy(&self) -> RetentionPolicy {
        match self {
            StorageType::Facts => RetentionPolicy::Permanent,
            StorageType::Preferences => RetentionPolicy::LongTerm,
            StorageType::Skills => RetentionPolicy::LongTerm,
            StorageType::Relationships => RetentionPolicy::LongTerm,
            StorageType::Context => RetentionPolicy::MediumTerm,
            StorageType::Temporary => RetentionPolicy::ShortTerm,
        }
    }

    /// The record memory type an admitted observation is stored under
    pub fn memory_type(&self) -> MemoryType {
        match self {
            StorageType::Facts => MemoryType::Fact,
            StorageType::Preferences => MemoryType::Preference,
            StorageType::Context => MemoryType::Conversation,
            StorageType::Temporary => MemoryType::Event,
            StorageType::Skills => MemoryType::Solution,
            StorageType::Relationships => MemoryType::Insight,
        }
    }
}

/// How long an admitted observation is retained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetentionPolicy {
    Permanent,
    LongTerm,
    MediumTerm,
    ShortTerm,
    SessionOnly,
}

impl RetentionPolicy {
    /// TTL derived from the policy: short = 7 d, medium = 30 d,
    /// long = 365 d, session = 4 h, permanent = none
    pub fn ttl_seconds(&self) -> Option<u64> {
        match self {
            RetentionPolicy::Permanent => None,
            RetentionPolicy::LongTerm => Some(365 * 86_400),
            RetentionPolicy::MediumTerm => Some(30 * 86_400),
            RetentionPolicy::ShortTerm => Some(7 * 86_400),
            RetentionPolicy::SessionOnly => Some(4 * 3_600),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RetentionPolicy::Permanent => "permanent",
            RetentionPolicy::LongTerm => "long_term",
            RetentionPolicy::MediumTerm => "medium_term",
            RetentionPolicy::ShortTerm => "short_term",
            RetentionPolicy::SessionOnly => "session_only",
        }
    }
}

// ============================================================================
// TURN AND REPLY SHAPES
// ============================================================================

/// One conversation turn handed to the curator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub user_input: String,
    pub agent_response: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_context: Option<String>,
}

/// A scored candidate memory emitted by the curator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation {
    pub memory_type: StorageType,
    pub content: String,
    /// How confident the curator is that this is true, 0-1
    pub confidence_score: f32,
    /// How quickly the information loses value, 0-1; high is ephemeral
    pub ephemerality_score: f32,
    /// How useful this will be in later conversations, 0-1
    pub contextual_value: f32,
    #[serde(default)]
    pub privacy_level: PrivacyLevel,
    pub rationale: String,
    /// Set on fallback observations that bypassed real curation
    #[serde(default)]
    pub requires_review: bool,
}

/// The curator's full reply for one turn
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CuratorReply {
    pub observations: Vec<Observation>,
    pub should_store: bool,
    pub overall_reasoning: String,
}

/// Decompose a conversation turn into scored observations
#[async_trait]
pub trait Curator: Send + Sync {
    async fn curate(&self, turn: &ConversationTurn) -> Result<CuratorReply>;
}

/// The degraded reply used when the curator is unreachable: admit the
/// whole turn as one low-confidence `context` observation flagged for
/// review.
pub fn fallback_reply(turn: &ConversationTurn) -> CuratorReply {
    CuratorReply {
        observations: vec![Observation {
            memory_type: StorageType::Context,
            content: format!("{}\n{}", turn.user_input, turn.agent_response),
            confidence_score: 0.3,
            ephemerality_score: 0.5,
            contextual_value: 0.5,
            privacy_level: PrivacyLevel::ParticipantsOnly,
            rationale: "curator unavailable; raw turn kept for review".into(),
            requires_review: true,
        }],
        should_store: true,
        overall_reasoning: "curator upstream failed; degraded to raw-turn capture".into(),
    }
}

// ============================================================================
// HTTP CURATOR
// ============================================================================

const CURATOR_SYSTEM_PROMPT: &str = "You are a memory curator for an AI agent. \
Given one conversation turn, decide which discrete observations deserve long-term storage. \
Reply with STRICT JSON only, shaped as: \
{\"observations\": [{\"memory_type\": \"facts|preferences|context|temporary|skills|relationships\", \
\"content\": \"...\", \"confidence_score\": 0.0, \"ephemerality_score\": 0.0, \
\"contextual_value\": 0.0, \"privacy_level\": \"participants_only\", \"rationale\": \"...\"}], \
\"should_store\": true, \"overall_reasoning\": \"...\"}. \
Score ephemerality high (>0.9) for transient facts like current weather, and low (<0.2) \
for stable facts like names and places.";

/// Curator backed by an OpenAI-compatible chat-completions endpoint
pub struct HttpCurator {
    client: Client,
    base_url: String,
    model: String,
}

impl HttpCurator {
    pub fn new(base_url: &str, model: &str) -> Self {
        Self {
            client: Client::builder()
                .connect_timeout(Duration::from_secs(10))
                .timeout(Duration::from_secs(120))
                .build()
                .unwrap_or_default(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        }
    }
}

#[async_trait]
impl Curator for HttpCurator {
    async fn curate(&self, turn: &ConversationTurn) -> Result<CuratorReply> {
        let mut user = format!(
            "User turn:\n{}\n\nAgent turn:\n{}",
            turn.user_input, turn.agent_response
        );
        if let Some(context) = &turn.conversation_context {
            user.push_str("\n\nConversation context:\n");
            user.push_str(context);
        }

        let url = format!("{}/v1/chat/completions", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&json!({
                "model": self.model,
                "messages": [
                    {"role": "system", "content": CURATOR_SYSTEM_PROMPT},
                    {"role": "user", "content": user},
                ],
                "temperature": 0.0,
            }))
            .send()
            .await
            .map_err(|e| EngramError::Upstream(format!("curator request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(EngramError::Upstream(format!("curator returned {status}")));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| EngramError::Upstream(format!("curator response unreadable: {e}")))?;

        let content = body["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| {
                EngramError::Upstream("curator reply missing choices[0].message.content".into())
            })?;

        serde_json::from_str::<CuratorReply>(content)
            .map_err(|e| EngramError::Upstream(format!("curator reply is not valid JSON: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retention_table() {
        assert_eq!(StorageType::Facts.retention_policy(), RetentionPolicy::Permanent);
        assert_eq!(StorageType::Preferences.retention_policy(), RetentionPolicy::LongTerm);
        assert_eq!(StorageType::Context.retention_policy(), RetentionPolicy::MediumTerm);
        assert_eq!(StorageType::Temporary.retention_policy(), RetentionPolicy::ShortTerm);
        assert_eq!(RetentionPolicy::ShortTerm.ttl_seconds(), Some(7 * 86_400));
        assert_eq!(RetentionPolicy::MediumTerm.ttl_seconds(), Some(30 * 86_400));
        assert_eq!(RetentionPolicy::LongTerm.ttl_seconds(), Some(365 * 86_400));
        assert_eq!(RetentionPolicy::SessionOnly.ttl_seconds(), Some(4 * 3_600));
        assert_eq!(RetentionPolicy::Permanent.ttl_seconds(), None);
    }

    #[test]
    fn test_fallback_reply_shape() {
        let turn = ConversationTurn {
            user_input: "hello".into(),
            agent_response: "hi".into(),
            conversation_context: None,
        };
        let reply = fallback_reply(&turn);
        assert_eq!(reply.observations.len(), 1);
        let obs = &reply.observations[0];
        assert_eq!(obs.memory_type, StorageType::Context);
        assert!((obs.confidence_score - 0.3).abs() < f32::EPSILON);
        assert!(obs.requires_review);
        assert!(obs.content.contains("hello"));
    }

    #[test]
    fn test_curator_reply_parses_model_json() {
        let raw = r#"{
            "observations": [{
                "memory_type": "facts",
                "content": "User lives in Liversedge",
                "confidence_score": 0.95,
                "ephemerality_score": 0.1,
                "contextual_value": 0.9,
                "privacy_level": "participants_only",
                "rationale": "stable personal fact"
            }],
            "should_store": true,
            "overall_reasoning": "one durable fact"
        }"#;
        let reply: CuratorReply = serde_json::from_str(raw).unwrap();
        assert_eq!(reply.observations[0].memory_type, StorageType::Facts);
        assert!(!reply.observations[0].requires_review);
    }
}
