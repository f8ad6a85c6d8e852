//! Retrieval Support
//!
//! Vector index, similarity math, resonance-vector combination, the
//! record-level retrieval filter, and MMR diversity reranking.

mod mmr;
mod vector;

pub use mmr::{mmr_select, MmrCandidate};
pub use vector::{HnswParams, VectorIndex, VectorIndexStats};

use chrono::{DateTime, Utc};

use crate::error::{EngramError, Result};
use crate::memory::{
    normalize_entity_id, validate_vector, witness_contains, MemoryRecord, PrivacyLevel,
};

// ============================================================================
// SIMILARITY MATH
// ============================================================================

/// Cosine similarity between two vectors of equal length
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if mag_a < f32::EPSILON || mag_b < f32::EPSILON {
        return 0.0;
    }
    (dot / (mag_a * mag_b)).clamp(-1.0, 1.0)
}

/// Normalise a vector to unit length in place
pub fn normalize_unit(vector: &mut [f32]) {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in vector.iter_mut() {
            *x /= norm;
        }
    }
}

/// A query embedding with a combination weight
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ResonanceVector {
    pub vector: Vec<f32>,
    #[serde(default = "default_weight")]
    pub weight: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

fn default_weight() -> f32 {
    1.0
}

/// Combine resonance vectors into a single query direction:
/// weighted mean, then renormalised to unit length.
///
/// Order-independent for equal weights; a single vector passes through
/// (normalised).
pub fn combine_resonance(vectors: &[ResonanceVector], dimensions: usize) -> Result<Vec<f32>> {
    if vectors.is_empty() {
        return Err(EngramError::InvalidRequest(
            "resonance_vectors must contain at least one vector".into(),
        ));
    }
    let mut combined = vec![0.0_f32; dimensions];
    let mut total_weight = 0.0_f32;
    for rv in vectors {
        validate_vector(&rv.vector, dimensions)?;
        if !rv.weight.is_finite() || rv.weight < 0.0 {
            return Err(EngramError::InvalidRequest(format!(
                "resonance weight must be finite and non-negative: {}",
                rv.weight
            )));
        }
        for (acc, v) in combined.iter_mut().zip(rv.vector.iter()) {
            *acc += v * rv.weight;
        }
        total_weight += rv.weight;
    }
    if total_weight <= 0.0 {
        return Err(EngramError::InvalidRequest(
            "resonance weights sum to zero".into(),
        ));
    }
    for v in combined.iter_mut() {
        *v /= total_weight;
    }
    normalize_unit(&mut combined);
    Ok(combined)
}

// ============================================================================
// RETRIEVAL FILTER
// ============================================================================

/// Record-level predicate applied to KNN candidates.
///
/// All populated constraints are ANDed. Entity ids are compared on their
/// normalised forms.
#[derive(Debug, Clone, Default)]
pub struct RetrievalFilter {
    /// Requesting entity (normalised); when set, only memories witnessed
    /// by this entity (or public ones) pass
    pub witness: Option<String>,
    /// Every include tag must be present
    pub include_tags: Vec<String>,
    /// No exclude tag may be present
    pub exclude_tags: Vec<String>,
    pub memory_types: Vec<String>,
    pub agent_ids: Vec<String>,
    pub domains: Vec<String>,
    pub situation_types: Vec<String>,
    /// Minimum metadata confidence
    pub confidence_floor: Option<f32>,
    /// Inclusive timestamp bounds
    pub after: Option<DateTime<Utc>>,
    pub before: Option<DateTime<Utc>>,
    /// All of these entities (normalised) must be co-witnesses
    pub co_participants: Vec<String>,
    /// Reject memories private to exactly this set of entities
    /// (normalised, requester excluded)
    pub exclude_private_to: Vec<String>,
}

impl RetrievalFilter {
    /// Filter scoped to a requesting entity's witnessed memories
    pub fn for_entity(entity_id: &str) -> Self {
        Self {
            witness: Some(normalize_entity_id(entity_id)),
            ..Default::default()
        }
    }

    /// Evaluate the predicate against a hydrated record
    pub fn matches(&self, record: &MemoryRecord) -> bool {
        if let Some(witness) = &self.witness {
            let visible = record.privacy_level == PrivacyLevel::Public
                || witness_contains(&record.witnessed_by, witness);
            if !visible {
                return false;
            }
        }
        if !self.include_tags.is_empty()
            && !self.include_tags.iter().all(|t| record.tags.contains(t))
        {
            return false;
        }
        if self.exclude_tags.iter().any(|t| record.tags.contains(t)) {
            return false;
        }
        if !self.memory_types.is_empty()
            && !self
                .memory_types
                .iter()
                .any(|t| t == record.metadata.memory_type.as_str())
        {
            return false;
        }
        if !self.agent_ids.is_empty() {
            match &record.metadata.agent_id {
                Some(agent) => {
                    if !self.agent_ids.iter().any(|a| a == agent) {
                        return false;
                    }
                }
                None => return false,
            }
        }
        if !self.domains.is_empty() {
            match &record.metadata.domain {
                Some(domain) => {
                    if !self.domains.iter().any(|d| d == domain) {
                        return false;
                    }
                }
                None => return false,
            }
        }
        if !self.situation_types.is_empty()
            && !self
                .situation_types
                .iter()
                .any(|t| t == &record.situation_type)
        {
            return false;
        }
        if let Some(floor) = self.confidence_floor {
            if record.metadata.confidence.unwrap_or(0.0) < floor {
                return false;
            }
        }
        if let Some(after) = self.after {
            if record.metadata.timestamp < after {
                return false;
            }
        }
        if let Some(before) = self.before {
            if record.metadata.timestamp > before {
                return false;
            }
        }
        if !self.co_participants.is_empty()
            && !self
                .co_participants
                .iter()
                .all(|p| witness_contains(&record.witnessed_by, p))
        {
            return false;
        }
        if !self.exclude_private_to.is_empty() {
            let mut others: Vec<String> = record
                .witnessed_by
                .iter()
                .map(|w| normalize_entity_id(w))
                .filter(|w| Some(w) != self.witness.as_ref())
                .collect();
            others.sort();
            others.dedup();
            let mut excluded = self.exclude_private_to.clone();
            excluded.sort();
            excluded.dedup();
            if others == excluded {
                return false;
            }
        }
        true
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryContent, MemoryMetadata, MemoryType};

    fn record(witnesses: &[&str], tags: &[&str]) -> MemoryRecord {
        MemoryRecord {
            memory_id: MemoryRecord::new_memory_id(),
            content: MemoryContent::from_text("algorithm optimization"),
            vector: vec![1.0, 0.0],
            metadata: MemoryMetadata {
                timestamp: Utc::now(),
                memory_type: MemoryType::Fact,
                agent_id: None,
                domain: None,
                confidence: Some(0.8),
                importance: None,
                topic_tags: vec![],
                interaction_quality: None,
                situation_duration_minutes: None,
            },
            tags: tags.iter().map(|t| t.to_string()).collect(),
            witnessed_by: witnesses.iter().map(|w| w.to_string()).collect(),
            situation_id: "sit-000000000001".into(),
            situation_type: "consultation_1to1".into(),
            privacy_level: PrivacyLevel::ParticipantsOnly,
            causality: None,
            retention: None,
            created_at: Utc::now(),
            access_count: 0,
            last_accessed_at: None,
        }
    }

    #[test]
    fn test_cosine_identity() {
        let v = vec![0.3, 0.4, 0.5];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_combine_is_order_invariant_for_equal_weights() {
        let a = ResonanceVector { vector: vec![1.0, 0.0], weight: 1.0, label: None };
        let b = ResonanceVector { vector: vec![0.0, 1.0], weight: 1.0, label: None };
        let ab = combine_resonance(&[a.clone(), b.clone()], 2).unwrap();
        let ba = combine_resonance(&[b, a], 2).unwrap();
        for (x, y) in ab.iter().zip(ba.iter()) {
            assert!((x - y).abs() < 1e-6);
        }
        // Unit length after combination
        let norm: f32 = ab.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_combine_rejects_dimension_mismatch() {
        let bad = ResonanceVector { vector: vec![1.0, 0.0, 0.0], weight: 1.0, label: None };
        assert!(combine_resonance(&[bad], 2).is_err());
    }

    #[test]
    fn test_witness_filter() {
        let r = record(&["human-alice-123", "claude"], &[]);
        assert!(RetrievalFilter::for_entity("human-alice-123").matches(&r));
        assert!(RetrievalFilter::for_entity("humanalice123").matches(&r));
        assert!(!RetrievalFilter::for_entity("bob").matches(&r));
    }

    #[test]
    fn test_public_bypasses_witness_filter() {
        let mut r = record(&["alice"], &[]);
        r.privacy_level = PrivacyLevel::Public;
        assert!(RetrievalFilter::for_entity("stranger").matches(&r));
    }

    #[test]
    fn test_tag_include_exclude() {
        let r = record(&["alice"], &["rust", "deploy"]);
        let mut f = RetrievalFilter::for_entity("alice");
        f.include_tags = vec!["rust".into()];
        assert!(f.matches(&r));
        f.include_tags = vec!["rust".into(), "python".into()];
        assert!(!f.matches(&r));
        f.include_tags.clear();
        f.exclude_tags = vec!["deploy".into()];
        assert!(!f.matches(&r));
    }

    #[test]
    fn test_exclude_private_to() {
        let r = record(&["alice", "claude"], &[]);
        let mut f = RetrievalFilter::for_entity("alice");
        f.exclude_private_to = vec!["claude".into()];
        assert!(!f.matches(&r), "memory private to {{claude}} besides requester is excluded");

        let wider = record(&["alice", "claude", "bob"], &[]);
        assert!(f.matches(&wider), "a wider witness set is not 'private to' claude");
    }

    #[test]
    fn test_co_participants() {
        let r = record(&["alice", "claude", "bob"], &[]);
        let mut f = RetrievalFilter::for_entity("alice");
        f.co_participants = vec![normalize_entity_id("bob"), normalize_entity_id("claude")];
        assert!(f.matches(&r));
        f.co_participants.push(normalize_entity_id("dave"));
        assert!(!f.matches(&r));
    }
}
