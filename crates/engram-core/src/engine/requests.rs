//! Engine Request/Response Shapes
//!
//! Wire-level DTOs for the store and retrieve operations. Store inputs
//! use `deny_unknown_fields` to prevent field injection; retrieve inputs
//! use `flatten` internally and stay lenient.

use serde::{Deserialize, Serialize};

use crate::error::{EngramError, Result};
use crate::memory::{
    Causality, MemoryContent, MemoryMetadata, MemoryRecord, MemoryType, PrivacyLevel, Retention,
};
use crate::search::ResonanceVector;
use crate::store::StoreStats;
use crate::time::parse_rfc3339_z;

// ============================================================================
// STORE REQUESTS
// ============================================================================

/// Client-supplied metadata; the timestamp arrives as a string so the
/// trailing-`Z` rule can be enforced before parsing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetadataInput {
    pub timestamp: String,
    pub memory_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub importance: Option<f32>,
    #[serde(default)]
    pub topic_tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interaction_quality: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub situation_duration_minutes: Option<f64>,
}

impl MetadataInput {
    /// Validate and convert into the stored metadata form
    pub fn into_metadata(self) -> Result<MemoryMetadata> {
        Ok(MemoryMetadata {
            timestamp: parse_rfc3339_z(&self.timestamp)?,
            memory_type: self.memory_type.parse::<MemoryType>()?,
            agent_id: self.agent_id,
            domain: self.domain,
            confidence: self.confidence,
            importance: self.importance,
            topic_tags: self.topic_tags,
            interaction_quality: self.interaction_quality,
            situation_duration_minutes: self.situation_duration_minutes,
        })
    }
}

/// Single-agent store request (legacy surface)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreSingleRequest {
    pub content: MemoryContent,
    pub primary_vector: Vec<f32>,
    pub metadata: MetadataInput,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub causality: Option<Causality>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retention: Option<Retention>,
    /// Defaults to `legacy_single_agent`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub situation_type: Option<String>,
}

/// Access-control block on a multi-entity store request
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct AccessControl {
    #[serde(default)]
    pub privacy_level: PrivacyLevel,
}

/// Multi-entity store request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreMultiRequest {
    /// Entities present when the memory formed; at least one
    pub witnessed_by: Vec<String>,
    pub situation_type: String,
    /// Synthesised when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub situation_id: Option<String>,
    pub content: MemoryContent,
    pub primary_vector: Vec<f32>,
    pub metadata: MetadataInput,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub causality: Option<Causality>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retention: Option<Retention>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_control: Option<AccessControl>,
}

/// Result of a store operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreResponse {
    pub memory_id: String,
    pub status: String,
    pub timestamp: String,
    pub situation_id: String,
}

// ============================================================================
// RETRIEVE REQUESTS
// ============================================================================

/// Include/exclude tag filters; includes AND together, excludes AND-NOT
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TagFilters {
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
}

/// Inclusive timestamp bounds, RFC-3339 `Z` strings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TimestampRange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
}

/// Structured metadata filters
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RetrievalFilters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp_range: Option<TimestampRange>,
    #[serde(default)]
    pub memory_types: Vec<String>,
    #[serde(default)]
    pub agent_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_threshold: Option<f32>,
    #[serde(default)]
    pub domains: Vec<String>,
    #[serde(default)]
    pub situation_types: Vec<String>,
}

/// Result ordering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderBy {
    #[default]
    Similarity,
    Recency,
    Importance,
}

/// Ranking knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalParams {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default)]
    pub similarity_threshold: f32,
    /// MMR diversity weight; > 0 enables diversity reranking over the
    /// candidate pool
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diversity_lambda: Option<f32>,
    /// Multiplicative recency boost on `similarity_score`
    #[serde(default)]
    pub boost_recent: bool,
}

fn default_top_k() -> usize {
    10
}

impl Default for RetrievalParams {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            similarity_threshold: 0.0,
            diversity_lambda: None,
            boost_recent: false,
        }
    }
}

/// Single-agent retrieval request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrieveRequest {
    pub resonance_vectors: Vec<ResonanceVector>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<TagFilters>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filters: Option<RetrievalFilters>,
    #[serde(default)]
    pub retrieval: RetrievalParams,
    #[serde(default)]
    pub ordering: OrderBy,
}

/// Witness-relationship filters on multi-entity retrieval
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EntityFilters {
    /// Every listed entity must be a co-witness
    #[serde(default)]
    pub co_participants: Vec<String>,
    /// Reject memories shared with exactly this set of entities
    #[serde(default)]
    pub exclude_private_to: Vec<String>,
}

/// Multi-entity retrieval request; everything in `RetrieveRequest` plus
/// the requesting entity and witness-relationship filters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrieveMultiRequest {
    pub requesting_entity: String,
    #[serde(flatten)]
    pub request: RetrieveRequest,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_filters: Option<EntityFilters>,
}

// ============================================================================
// RETRIEVE RESPONSES
// ============================================================================

/// One retrieval hit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedMemory {
    pub memory_id: String,
    pub similarity_score: f32,
    /// First 200 characters of the content text
    pub content_preview: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub metadata: MemoryMetadata,
    pub tags: Vec<String>,
    pub witnessed_by: Vec<String>,
    pub situation_id: String,
    pub situation_type: String,
    pub privacy_level: PrivacyLevel,
    pub media_count: usize,
    pub annotation_count: i64,
    /// Causal provenance with dangling parents filtered out
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub causality: Option<Causality>,
    pub access_count: i64,
}

/// Result of a single-agent retrieval
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrieveResponse {
    pub memories: Vec<RetrievedMemory>,
    pub total_found: usize,
    pub search_time_ms: u64,
    pub query_vector_dims: usize,
}

/// Witness-scope statement attached to multi-entity results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityVerification {
    pub requesting_entity: String,
    pub search_scope: String,
}

/// Result of a multi-entity retrieval
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrieveMultiResponse {
    #[serde(flatten)]
    pub base: RetrieveResponse,
    pub access_granted_count: usize,
    pub access_denied_count: usize,
    pub entity_verification: EntityVerification,
}

/// Engine statistics (store counters plus index shape)
pub type EngineStats = StoreStats;

// ============================================================================
// HELPERS
// ============================================================================

impl StoreSingleRequest {
    /// The witness for a single-agent store is the owning agent
    pub fn agent_id(&self) -> Result<&str> {
        self.metadata
            .agent_id
            .as_deref()
            .filter(|a| !a.trim().is_empty())
            .ok_or_else(|| {
                EngramError::InvalidRequest("metadata.agent_id is required for single-agent store".into())
            })
    }
}

impl StoreResponse {
    pub fn stored(record: &MemoryRecord) -> Self {
        Self {
            memory_id: record.memory_id.clone(),
            status: "stored".into(),
            timestamp: crate::time::to_rfc3339_z(record.created_at),
            situation_id: record.situation_id.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_requires_z_suffix() {
        let input = MetadataInput {
            timestamp: "2026-08-01T10:00:00+00:00".into(),
            memory_type: "fact".into(),
            agent_id: None,
            domain: None,
            confidence: None,
            importance: None,
            topic_tags: vec![],
            interaction_quality: None,
            situation_duration_minutes: None,
        };
        assert!(input.into_metadata().is_err());
    }

    #[test]
    fn test_metadata_rejects_unknown_memory_type() {
        let input = MetadataInput {
            timestamp: "2026-08-01T10:00:00Z".into(),
            memory_type: "gossip".into(),
            agent_id: None,
            domain: None,
            confidence: None,
            importance: None,
            topic_tags: vec![],
            interaction_quality: None,
            situation_duration_minutes: None,
        };
        assert!(input.into_metadata().is_err());
    }

    #[test]
    fn test_store_request_denies_unknown_fields() {
        let json = r#"{
            "content": {"text": "hi"},
            "primary_vector": [1.0],
            "metadata": {"timestamp": "2026-08-01T10:00:00Z", "memory_type": "fact"},
            "surprise": true
        }"#;
        let parsed: std::result::Result<StoreSingleRequest, _> = serde_json::from_str(json);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_retrieve_multi_flattens_base_fields() {
        let json = r#"{
            "requesting_entity": "human-alice-123",
            "resonance_vectors": [{"vector": [1.0, 0.0], "weight": 1.0}],
            "retrieval": {"top_k": 5, "similarity_threshold": 0.2}
        }"#;
        let parsed: RetrieveMultiRequest = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.requesting_entity, "human-alice-123");
        assert_eq!(parsed.request.retrieval.top_k, 5);
        assert_eq!(parsed.request.ordering, OrderBy::Similarity);
    }
}
