//! Memory Record - The fundamental unit of storage
//!
//! Each record carries:
//! - Content (text, optional media references, per-speaker utterances)
//! - A fixed-dimension embedding vector (cosine metric)
//! - Structured metadata for filtered retrieval
//! - A witness set controlling who may ever see the record
//! - Situation grouping, causality links, and retention policy

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{EngramError, Result};

// ============================================================================
// CONTROLLED VOCABULARIES
// ============================================================================

/// Types of memories
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MemoryType {
    /// A discrete fact
    #[default]
    Fact,
    /// A stated preference
    Preference,
    /// Something that happened
    Event,
    /// A worked solution
    Solution,
    /// A derived insight
    Insight,
    /// A decision that was taken
    Decision,
    /// A recurring pattern
    Pattern,
    /// A conversational exchange
    Conversation,
    /// Memory imported from the single-agent surface
    LegacySingleAgent,
}

impl MemoryType {
    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryType::Fact => "fact",
            MemoryType::Preference => "preference",
            MemoryType::Event => "event",
            MemoryType::Solution => "solution",
            MemoryType::Insight => "insight",
            MemoryType::Decision => "decision",
            MemoryType::Pattern => "pattern",
            MemoryType::Conversation => "conversation",
            MemoryType::LegacySingleAgent => "legacy_single_agent",
        }
    }
}

impl std::str::FromStr for MemoryType {
    type Err = EngramError;
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "fact" => Ok(MemoryType::Fact),
            "preference" => Ok(MemoryType::Preference),
            "event" => Ok(MemoryType::Event),
            "solution" => Ok(MemoryType::Solution),
            "insight" => Ok(MemoryType::Insight),
            "decision" => Ok(MemoryType::Decision),
            "pattern" => Ok(MemoryType::Pattern),
            "conversation" => Ok(MemoryType::Conversation),
            "legacy_single_agent" => Ok(MemoryType::LegacySingleAgent),
            other => Err(EngramError::InvalidRequest(format!(
                "unknown memory_type: {other}"
            ))),
        }
    }
}

impl std::fmt::Display for MemoryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Situation type for single-agent memories stored through the legacy surface
pub const SITUATION_LEGACY_SINGLE_AGENT: &str = "legacy_single_agent";

/// Privacy level of a memory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PrivacyLevel {
    /// Visible to the single witness only
    Personal,
    /// Visible to all witnesses (the default)
    #[default]
    ParticipantsOnly,
    /// Visible to a wider group of witnesses
    Group,
    /// Visible to anyone, witness or not
    Public,
}

impl PrivacyLevel {
    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            PrivacyLevel::Personal => "personal",
            PrivacyLevel::ParticipantsOnly => "participants_only",
            PrivacyLevel::Group => "group",
            PrivacyLevel::Public => "public",
        }
    }
}

impl std::str::FromStr for PrivacyLevel {
    type Err = EngramError;
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "personal" => Ok(PrivacyLevel::Personal),
            "participants_only" => Ok(PrivacyLevel::ParticipantsOnly),
            "group" => Ok(PrivacyLevel::Group),
            "public" => Ok(PrivacyLevel::Public),
            other => Err(EngramError::InvalidRequest(format!(
                "unknown privacy_level: {other}"
            ))),
        }
    }
}

/// Decay function applied to importance during retention cleanup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DecayFunction {
    /// Importance never decays
    #[default]
    None,
    /// Linear ramp down with age
    Linear,
    /// Exponential decay with age
    Logarithmic,
}

impl DecayFunction {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecayFunction::None => "none",
            DecayFunction::Linear => "linear",
            DecayFunction::Logarithmic => "logarithmic",
        }
    }
}

impl std::str::FromStr for DecayFunction {
    type Err = EngramError;
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "none" => Ok(DecayFunction::None),
            "linear" => Ok(DecayFunction::Linear),
            "logarithmic" => Ok(DecayFunction::Logarithmic),
            other => Err(EngramError::InvalidRequest(format!(
                "unknown decay_function: {other}"
            ))),
        }
    }
}

// ============================================================================
// CONTENT
// ============================================================================

/// Kind of external media a memory references
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    Image,
    Website,
    Document,
}

/// A reference to external media attached to a memory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaRef {
    #[serde(rename = "type")]
    pub media_type: MediaType,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub authors: Vec<String>,
    #[serde(rename = "abstract", default, skip_serializing_if = "Option::is_none")]
    pub abstract_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_text: Option<String>,
}

/// Memory content: text plus optional media, speakers and summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryContent {
    /// The memory text; required and non-empty
    pub text: String,
    /// Ordered media references
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub media: Vec<MediaRef>,
    /// Per-entity utterances for multi-entity memories
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speakers: Option<BTreeMap<String, String>>,
    /// Optional short summary
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

impl MemoryContent {
    /// Content with just a text body
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            media: Vec::new(),
            speakers: None,
            summary: None,
        }
    }

    /// First 200 characters of the text, for retrieval previews
    pub fn preview(&self) -> String {
        self.text.chars().take(200).collect()
    }
}

// ============================================================================
// METADATA, CAUSALITY, RETENTION
// ============================================================================

/// Structured metadata used for filtered retrieval
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryMetadata {
    /// Event timestamp (client-supplied, UTC)
    pub timestamp: DateTime<Utc>,
    pub memory_type: MemoryType,
    /// Owning agent for single-agent memories
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    /// Confidence in the memory content, 0-1
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
    /// Importance, 0-1; subject to retention decay
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub importance: Option<f32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub topic_tags: Vec<String>,
    /// Interaction quality, 0-1
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interaction_quality: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub situation_duration_minutes: Option<f64>,
}

/// Causal provenance: which memories fed into this one
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Causality {
    /// Parent memory ids; weak references, may dangle after deletion
    #[serde(default)]
    pub parent_memories: Vec<String>,
    /// Influence weight per parent, 0-1, same length as `parent_memories`
    #[serde(default)]
    pub influence_strength: Vec<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synthesis_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

impl Causality {
    /// Structural validation: lengths match, strengths in range
    pub fn validate(&self) -> Result<()> {
        if self.parent_memories.len() != self.influence_strength.len() {
            return Err(EngramError::InvalidRequest(format!(
                "causality.parent_memories ({}) and causality.influence_strength ({}) differ in length",
                self.parent_memories.len(),
                self.influence_strength.len()
            )));
        }
        for s in &self.influence_strength {
            if !(0.0..=1.0).contains(s) {
                return Err(EngramError::InvalidRequest(format!(
                    "causality.influence_strength out of [0,1]: {s}"
                )));
            }
        }
        Ok(())
    }
}

/// Retention policy fields on a record
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Retention {
    /// Seconds until the daily cleanup may delete the record
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl_seconds: Option<u64>,
    #[serde(default)]
    pub decay_function: DecayFunction,
}

// ============================================================================
// MEMORY RECORD
// ============================================================================

/// A stored memory ("engram")
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryRecord {
    /// Opaque id, `mem-<12-hex>`, assigned on creation, immutable
    pub memory_id: String,
    pub content: MemoryContent,
    /// Embedding; length equals the deployment dimension, cosine metric
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub vector: Vec<f32>,
    pub metadata: MemoryMetadata,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Witness set: original entity id strings, deduplicated after
    /// normalisation, never shrinks
    pub witnessed_by: Vec<String>,
    pub situation_id: String,
    pub situation_type: String,
    #[serde(default)]
    pub privacy_level: PrivacyLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub causality: Option<Causality>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retention: Option<Retention>,
    /// Engine-assigned creation time
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub access_count: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_accessed_at: Option<DateTime<Utc>>,
}

impl MemoryRecord {
    /// Allocate a fresh memory id: `mem-<12-hex>`
    pub fn new_memory_id() -> String {
        let hex = Uuid::new_v4().simple().to_string();
        format!("mem-{}", &hex[..12])
    }

    /// Allocate a fresh situation id: `sit-<12-hex>`
    pub fn new_situation_id() -> String {
        let hex = Uuid::new_v4().simple().to_string();
        format!("sit-{}", &hex[..12])
    }

    /// Structural validation of a record about to be stored
    pub fn validate(&self, dimensions: usize) -> Result<()> {
        if self.content.text.trim().is_empty() {
            return Err(EngramError::InvalidRequest(
                "content.text must be a non-empty string".into(),
            ));
        }
        validate_vector(&self.vector, dimensions)?;
        if self.witnessed_by.is_empty() {
            return Err(EngramError::InvalidRequest(
                "witnessed_by must contain at least one entity".into(),
            ));
        }
        if self.situation_type.trim().is_empty() {
            return Err(EngramError::InvalidRequest(
                "situation_type must be non-empty".into(),
            ));
        }
        for (field, value) in [
            ("metadata.confidence", self.metadata.confidence),
            ("metadata.importance", self.metadata.importance),
            (
                "metadata.interaction_quality",
                self.metadata.interaction_quality,
            ),
        ] {
            if let Some(v) = value {
                if !(0.0..=1.0).contains(&v) {
                    return Err(EngramError::InvalidRequest(format!(
                        "{field} out of [0,1]: {v}"
                    )));
                }
            }
        }
        if let Some(c) = &self.causality {
            c.validate()?;
        }
        Ok(())
    }
}

/// Validate an embedding vector: exact dimension, all components finite.
///
/// Never truncates or pads; a wrong-length vector is a request error.
pub fn validate_vector(vector: &[f32], dimensions: usize) -> Result<()> {
    if vector.len() != dimensions {
        return Err(EngramError::InvalidRequest(format!(
            "vector has {} dimensions, expected {dimensions}",
            vector.len()
        )));
    }
    if vector.iter().any(|v| !v.is_finite()) {
        return Err(EngramError::InvalidRequest(
            "vector contains NaN or infinite components".into(),
        ));
    }
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn record(dim: usize) -> MemoryRecord {
        MemoryRecord {
            memory_id: MemoryRecord::new_memory_id(),
            content: MemoryContent::from_text("the pipeline deploys from main"),
            vector: vec![0.5; dim],
            metadata: MemoryMetadata {
                timestamp: Utc::now(),
                memory_type: MemoryType::Fact,
                agent_id: Some("claude".into()),
                domain: None,
                confidence: Some(0.9),
                importance: Some(0.5),
                topic_tags: vec!["deploy".into()],
                interaction_quality: None,
                situation_duration_minutes: None,
            },
            tags: vec![],
            witnessed_by: vec!["claude".into()],
            situation_id: MemoryRecord::new_situation_id(),
            situation_type: SITUATION_LEGACY_SINGLE_AGENT.into(),
            privacy_level: PrivacyLevel::default(),
            causality: None,
            retention: None,
            created_at: Utc::now(),
            access_count: 0,
            last_accessed_at: None,
        }
    }

    #[test]
    fn test_id_format() {
        let id = MemoryRecord::new_memory_id();
        assert!(id.starts_with("mem-"));
        assert_eq!(id.len(), 16);
        assert!(id[4..].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_valid_record_passes() {
        assert!(record(8).validate(8).is_ok());
    }

    #[test]
    fn test_wrong_dimension_rejected() {
        let r = record(8);
        assert!(r.validate(16).is_err());
    }

    #[test]
    fn test_nan_vector_rejected() {
        let mut r = record(8);
        r.vector[3] = f32::NAN;
        assert!(r.validate(8).is_err());
    }

    #[test]
    fn test_empty_witness_set_rejected() {
        let mut r = record(8);
        r.witnessed_by.clear();
        assert!(r.validate(8).is_err());
    }

    #[test]
    fn test_causality_length_mismatch_rejected() {
        let mut r = record(8);
        r.causality = Some(Causality {
            parent_memories: vec!["mem-000000000001".into()],
            influence_strength: vec![0.5, 0.5],
            synthesis_type: None,
            reasoning: None,
        });
        assert!(r.validate(8).is_err());
    }

    #[test]
    fn test_memory_type_parse_rejects_unknown() {
        assert!("fact".parse::<MemoryType>().is_ok());
        assert!("vibes".parse::<MemoryType>().is_err());
    }

    #[test]
    fn test_preview_truncates_at_200_chars() {
        let content = MemoryContent::from_text("x".repeat(500));
        assert_eq!(content.preview().chars().count(), 200);
    }
}
