//! Curation Pipeline
//!
//! Consumes conversation turns, calls the curator, applies the admission
//! rule, and routes admitted observations through the engine with
//! retention fields set. Every decision (including rejections) is
//! reported back so callers can explain behaviour, and journalled for
//! per-entity statistics.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::curator::{
    fallback_reply, ConversationTurn, Curator, CuratorReply, Observation, RetentionPolicy,
};
use crate::embedder::Embedder;
use crate::engine::{AccessControl, MemoryEngine, MetadataInput, StoreMultiRequest, StoreResponse};
use crate::error::Result;
use crate::memory::{DecayFunction, MemoryContent, MemoryType, Retention};
use crate::time::to_rfc3339_z;

// ============================================================================
// REQUEST / REPORT SHAPES
// ============================================================================

/// Admission thresholds; callers may tighten or loosen per request
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CurationPreferences {
    /// Observations below this confidence are dropped
    pub min_confidence: f32,
    /// Observations above this ephemerality are dropped
    pub max_ephemerality: f32,
    /// Observations below this contextual value are dropped
    pub min_contextual_value: f32,
}

impl Default for CurationPreferences {
    fn default() -> Self {
        Self {
            min_confidence: 0.3,
            max_ephemerality: 0.8,
            min_contextual_value: 0.2,
        }
    }
}

/// One curation request: a turn, the entity whose memory lane it lands
/// in, and optional overrides
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurationRequest {
    pub user_input: String,
    pub agent_response: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_context: Option<String>,
    /// Witness and owner of whatever gets stored
    pub entity_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub curation_preferences: Option<CurationPreferences>,
    /// Bypass curation entirely and store the raw turn as one memory
    #[serde(default)]
    pub force_storage: bool,
}

impl CurationRequest {
    fn turn(&self) -> ConversationTurn {
        ConversationTurn {
            user_input: self.user_input.clone(),
            agent_response: self.agent_response.clone(),
            conversation_context: self.conversation_context.clone(),
        }
    }
}

/// The fate of one observation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservationDecision {
    pub observation: Observation,
    pub admitted: bool,
    pub reason: String,
    pub retention_policy: RetentionPolicy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl_seconds: Option<u64>,
    /// Set when the observation was stored
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_id: Option<String>,
}

/// Full decision report for a curated turn
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurationReport {
    pub decisions: Vec<ObservationDecision>,
    pub should_store: bool,
    pub overall_reasoning: String,
    pub stored_memory_ids: Vec<String>,
    /// True when the curator was unreachable and the degraded path ran
    pub fallback_used: bool,
}

// ============================================================================
// PIPELINE
// ============================================================================

/// The curation pipeline
pub struct CurationPipeline {
    engine: Arc<MemoryEngine>,
    embedder: Arc<dyn Embedder>,
    curator: Arc<dyn Curator>,
}

impl CurationPipeline {
    pub fn new(
        engine: Arc<MemoryEngine>,
        embedder: Arc<dyn Embedder>,
        curator: Arc<dyn Curator>,
    ) -> Self {
        Self {
            engine,
            embedder,
            curator,
        }
    }

    /// Decision report only; nothing is stored. A pure function of the
    /// inputs and the curator output.
    pub async fn analyze(&self, request: &CurationRequest) -> Result<CurationReport> {
        let (reply, fallback_used) = self.curate(request).await;
        Ok(self.decide(&reply, request, fallback_used))
    }

    /// Curate, then persist every admitted observation with retention
    /// fields set. Rejected observations stay in the report.
    pub async fn curate_and_store(&self, request: &CurationRequest) -> Result<CurationReport> {
        if request.force_storage {
            return self.force_store(request).await;
        }

        let (reply, fallback_used) = self.curate(request).await;
        let mut report = self.decide(&reply, request, fallback_used);

        for decision in report.decisions.iter_mut() {
            if !decision.admitted {
                self.journal(request, decision)?;
                continue;
            }
            let stored = self.store_observation(request, decision).await?;
            decision.memory_id = Some(stored.memory_id.clone());
            report.stored_memory_ids.push(stored.memory_id);
            self.journal(request, decision)?;
        }

        info!(
            entity = %request.entity_id,
            stored = report.stored_memory_ids.len(),
            rejected = report.decisions.len() - report.stored_memory_ids.len(),
            fallback = report.fallback_used,
            "curated turn"
        );
        Ok(report)
    }

    async fn curate(&self, request: &CurationRequest) -> (CuratorReply, bool) {
        let turn = request.turn();
        match self.curator.curate(&turn).await {
            Ok(reply) => (reply, false),
            Err(e) => {
                warn!("curator upstream failed, degrading: {e}");
                (fallback_reply(&turn), true)
            }
        }
    }

    /// Apply the admission rule to every observation
    fn decide(
        &self,
        reply: &CuratorReply,
        request: &CurationRequest,
        fallback_used: bool,
    ) -> CurationReport {
        let prefs = request.curation_preferences.unwrap_or_default();
        let decisions = reply
            .observations
            .iter()
            .map(|obs| {
                let policy = obs.memory_type.retention_policy();
                let (admitted, reason) = admission(obs, &prefs);
                ObservationDecision {
                    observation: obs.clone(),
                    admitted,
                    reason,
                    retention_policy: policy,
                    ttl_seconds: policy.ttl_seconds(),
                    memory_id: None,
                }
            })
            .collect();
        CurationReport {
            decisions,
            should_store: reply.should_store,
            overall_reasoning: reply.overall_reasoning.clone(),
            stored_memory_ids: vec![],
            fallback_used,
        }
    }

    async fn store_observation(
        &self,
        request: &CurationRequest,
        decision: &ObservationDecision,
    ) -> Result<StoreResponse> {
        let obs = &decision.observation;
        let vector = self.embedder.embed(&obs.content).await?;
        self.engine.store_multi(StoreMultiRequest {
            witnessed_by: vec![request.entity_id.clone()],
            situation_type: "conversation".into(),
            situation_id: None,
            content: MemoryContent::from_text(obs.content.clone()),
            primary_vector: vector,
            metadata: MetadataInput {
                timestamp: to_rfc3339_z(chrono::Utc::now()),
                memory_type: obs.memory_type.memory_type().as_str().into(),
                agent_id: Some(request.entity_id.clone()),
                domain: None,
                confidence: Some(obs.confidence_score),
                importance: Some(obs.contextual_value),
                topic_tags: vec![],
                interaction_quality: None,
                situation_duration_minutes: None,
            },
            tags: vec![],
            causality: None,
            retention: Some(Retention {
                ttl_seconds: decision.ttl_seconds,
                decay_function: DecayFunction::None,
            }),
            access_control: Some(AccessControl {
                privacy_level: obs.privacy_level,
            }),
        })
    }

    /// `force_storage` bypasses curation and admission entirely: exactly
    /// one memory holding the raw turn.
    async fn force_store(&self, request: &CurationRequest) -> Result<CurationReport> {
        let content = format!("{}\n{}", request.user_input, request.agent_response);
        let vector = self.embedder.embed(&content).await?;
        let stored = self.engine.store_multi(StoreMultiRequest {
            witnessed_by: vec![request.entity_id.clone()],
            situation_type: "conversation".into(),
            situation_id: None,
            content: MemoryContent::from_text(content.clone()),
            primary_vector: vector,
            metadata: MetadataInput {
                timestamp: to_rfc3339_z(chrono::Utc::now()),
                memory_type: MemoryType::Conversation.as_str().into(),
                agent_id: Some(request.entity_id.clone()),
                domain: None,
                confidence: None,
                importance: None,
                topic_tags: vec![],
                interaction_quality: None,
                situation_duration_minutes: None,
            },
            tags: vec![],
            causality: None,
            retention: None,
            access_control: None,
        })?;

        self.engine.store().log_curation(
            &request.entity_id,
            "context",
            true,
            Some(&stored.memory_id),
            "force_storage override",
        )?;

        Ok(CurationReport {
            decisions: vec![],
            should_store: true,
            overall_reasoning: "force_storage: raw turn stored without curation".into(),
            stored_memory_ids: vec![stored.memory_id],
            fallback_used: false,
        })
    }

    fn journal(&self, request: &CurationRequest, decision: &ObservationDecision) -> Result<()> {
        self.engine.store().log_curation(
            &request.entity_id,
            decision.observation.memory_type.as_str(),
            decision.admitted,
            decision.memory_id.as_deref(),
            &decision.reason,
        )
    }
}

/// The admission rule: drop high-ephemerality, low-confidence or
/// low-value observations, in that precedence order
fn admission(obs: &Observation, prefs: &CurationPreferences) -> (bool, String) {
    if obs.ephemerality_score > prefs.max_ephemerality {
        return (
            false,
            format!(
                "ephemerality {:.2} above ceiling {:.2}",
                obs.ephemerality_score, prefs.max_ephemerality
            ),
        );
    }
    if obs.confidence_score < prefs.min_confidence {
        return (
            false,
            format!(
                "confidence {:.2} below floor {:.2}",
                obs.confidence_score, prefs.min_confidence
            ),
        );
    }
    if obs.contextual_value < prefs.min_contextual_value {
        return (
            false,
            format!(
                "contextual value {:.2} below floor {:.2}",
                obs.contextual_value, prefs.min_contextual_value
            ),
        );
    }
    (true, "admitted".into())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curator::StorageType;
    use crate::error::EngramError;
    use crate::memory::PrivacyLevel;
    use crate::search::normalize_unit;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use tempfile::TempDir;

    const DIM: usize = 8;

    /// Deterministic embedder: hashes bytes into a unit vector
    struct HashEmbedder;

    #[async_trait]
    impl Embedder for HashEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            let mut v = vec![0.1_f32; DIM];
            for (i, b) in text.bytes().enumerate() {
                v[i % DIM] += (b as f32) / 255.0;
            }
            normalize_unit(&mut v);
            Ok(v)
        }
        fn dimensions(&self) -> usize {
            DIM
        }
    }

    /// Curator with a scripted reply
    struct ScriptedCurator {
        reply: std::result::Result<CuratorReply, String>,
    }

    #[async_trait]
    impl Curator for ScriptedCurator {
        async fn curate(&self, _turn: &ConversationTurn) -> Result<CuratorReply> {
            self.reply
                .clone()
                .map_err(|e| EngramError::Upstream(e))
        }
    }

    fn observation(
        memory_type: StorageType,
        content: &str,
        confidence: f32,
        ephemerality: f32,
        value: f32,
    ) -> Observation {
        Observation {
            memory_type,
            content: content.into(),
            confidence_score: confidence,
            ephemerality_score: ephemerality,
            contextual_value: value,
            privacy_level: PrivacyLevel::ParticipantsOnly,
            rationale: "test".into(),
            requires_review: false,
        }
    }

    fn pipeline(dir: &TempDir, curator: ScriptedCurator) -> CurationPipeline {
        let store = MemoryStore::open(Some(dir.path().join("engram.db")), DIM).unwrap();
        let engine = Arc::new(MemoryEngine::new(Arc::new(store)));
        CurationPipeline::new(engine, Arc::new(HashEmbedder), Arc::new(curator))
    }

    fn request() -> CurationRequest {
        CurationRequest {
            user_input: "My name is Christian and I live in Liversedge. It's raining.".into(),
            agent_response: "Nice to meet you, Christian.".into(),
            conversation_context: None,
            entity_id: "agent-main".into(),
            curation_preferences: None,
            force_storage: false,
        }
    }

    fn two_observation_reply() -> CuratorReply {
        CuratorReply {
            observations: vec![
                observation(StorageType::Facts, "Christian lives in Liversedge", 0.95, 0.1, 0.9),
                observation(StorageType::Temporary, "It is raining right now", 0.9, 0.95, 0.3),
            ],
            should_store: true,
            overall_reasoning: "one durable fact, one transient observation".into(),
        }
    }

    #[tokio::test]
    async fn test_ephemerality_filter_stores_fact_drops_weather() {
        let dir = TempDir::new().unwrap();
        let p = pipeline(&dir, ScriptedCurator { reply: Ok(two_observation_reply()) });

        let report = p.curate_and_store(&request()).await.unwrap();
        assert_eq!(report.decisions.len(), 2, "report lists both decisions");
        assert_eq!(report.stored_memory_ids.len(), 1);

        let fact = &report.decisions[0];
        assert!(fact.admitted);
        assert!(fact.observation.content.contains("Liversedge"));
        assert_eq!(fact.retention_policy, RetentionPolicy::Permanent);
        assert!(fact.memory_id.is_some());

        let weather = &report.decisions[1];
        assert!(!weather.admitted);
        assert!(weather.reason.contains("ephemerality"));
        assert!(weather.memory_id.is_none());
    }

    #[tokio::test]
    async fn test_analyze_is_pure_and_repeatable() {
        let dir = TempDir::new().unwrap();
        let p = pipeline(&dir, ScriptedCurator { reply: Ok(two_observation_reply()) });

        let a = p.analyze(&request()).await.unwrap();
        let b = p.analyze(&request()).await.unwrap();
        assert_eq!(
            serde_json::to_value(&a).unwrap(),
            serde_json::to_value(&b).unwrap()
        );
        assert!(a.stored_memory_ids.is_empty());
        assert_eq!(p.engine.stats().unwrap().total_memories, 0);
    }

    #[tokio::test]
    async fn test_curator_failure_degrades_to_context_memory() {
        let dir = TempDir::new().unwrap();
        let p = pipeline(&dir, ScriptedCurator { reply: Err("503 from model".into()) });

        let report = p.curate_and_store(&request()).await.unwrap();
        assert!(report.fallback_used);
        assert_eq!(report.stored_memory_ids.len(), 1);
        let decision = &report.decisions[0];
        assert_eq!(decision.observation.memory_type, StorageType::Context);
        assert!((decision.observation.confidence_score - 0.3).abs() < f32::EPSILON);
        assert!(decision.observation.requires_review);
    }

    #[tokio::test]
    async fn test_force_storage_stores_exactly_one_raw_turn() {
        let dir = TempDir::new().unwrap();
        // Scripted curator would reject everything; force bypasses it.
        let p = pipeline(&dir, ScriptedCurator { reply: Err("unused".into()) });

        let mut req = request();
        req.force_storage = true;
        let report = p.curate_and_store(&req).await.unwrap();
        assert_eq!(report.stored_memory_ids.len(), 1);
        assert!(!report.fallback_used);

        let record = p
            .engine
            .get(&report.stored_memory_ids[0], Some("agent-main"))
            .unwrap();
        assert!(record.content.text.contains("Liversedge"));
        assert!(record.content.text.contains("Nice to meet you"));
    }

    #[tokio::test]
    async fn test_preferences_override_thresholds() {
        let dir = TempDir::new().unwrap();
        let p = pipeline(&dir, ScriptedCurator { reply: Ok(two_observation_reply()) });

        let mut req = request();
        req.curation_preferences = Some(CurationPreferences {
            min_confidence: 0.3,
            max_ephemerality: 0.99, // let the weather through
            min_contextual_value: 0.2,
        });
        let report = p.curate_and_store(&req).await.unwrap();
        assert_eq!(report.stored_memory_ids.len(), 2);
    }

    #[tokio::test]
    async fn test_curation_stats_journal() {
        let dir = TempDir::new().unwrap();
        let p = pipeline(&dir, ScriptedCurator { reply: Ok(two_observation_reply()) });

        p.curate_and_store(&request()).await.unwrap();
        let stats = p.engine.store().curation_stats("agent-main").unwrap();
        assert_eq!(stats.observations_seen, 2);
        assert_eq!(stats.observations_stored, 1);
        assert_eq!(stats.observations_rejected, 1);
    }
}
