//! Memory Engine
//!
//! Orchestrates store / retrieve / annotate / situation lookup over the
//! record store. There is exactly one storage path: a single-agent memory
//! is a multi-entity memory with one witness and
//! `situation_type = "legacy_single_agent"`; the dual API surface exists
//! for compatibility only.

mod access;
mod requests;

pub use access::allow;
pub use requests::{
    AccessControl, EngineStats, EntityFilters, EntityVerification, MetadataInput, OrderBy,
    RetrievalFilters, RetrievalParams, RetrieveMultiRequest, RetrieveMultiResponse,
    RetrieveRequest, RetrieveResponse, RetrievedMemory, StoreMultiRequest, StoreResponse,
    StoreSingleRequest, TagFilters, TimestampRange,
};

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::debug;

use crate::error::{EngramError, Result};
use crate::memory::{
    normalize_entity_id, normalize_witness_set, Annotation, MemoryRecord, Situation,
    SITUATION_LEGACY_SINGLE_AGENT,
};
use crate::search::{combine_resonance, mmr_select, MmrCandidate, RetrievalFilter};
use crate::store::{MemoryStore, ScoredMemory};
use crate::time::parse_rfc3339_z;

/// Weight of the multiplicative recency boost
const RECENT_BOOST_WEIGHT: f32 = 0.1;

/// Recency boost e-folding time in days
const RECENT_BOOST_TIME_DAYS: f64 = 7.0;

/// Candidate pool for reranking: `max(4·top_k, 50)`
fn candidate_pool(top_k: usize) -> usize {
    std::cmp::max(4 * top_k, 50)
}

/// The memory engine
pub struct MemoryEngine {
    store: Arc<MemoryStore>,
}

impl MemoryEngine {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self { store }
    }

    /// Shared record store (cleanup jobs and the admin surface use it
    /// directly)
    pub fn store(&self) -> &Arc<MemoryStore> {
        &self.store
    }

    pub fn dimensions(&self) -> usize {
        self.store.dimensions()
    }

    // ========================================================================
    // STORE
    // ========================================================================

    /// Store a single-agent memory (legacy surface). The witness set is
    /// `{agent_id}`.
    pub fn store_single(&self, req: StoreSingleRequest) -> Result<StoreResponse> {
        let agent_id = req.agent_id()?.to_string();
        let situation_type = req
            .situation_type
            .clone()
            .unwrap_or_else(|| SITUATION_LEGACY_SINGLE_AGENT.to_string());

        let record = MemoryRecord {
            memory_id: MemoryRecord::new_memory_id(),
            content: req.content,
            vector: req.primary_vector,
            metadata: req.metadata.into_metadata()?,
            tags: req.tags,
            witnessed_by: vec![agent_id],
            situation_id: MemoryRecord::new_situation_id(),
            situation_type,
            privacy_level: Default::default(),
            causality: req.causality,
            retention: req.retention,
            created_at: Utc::now(),
            access_count: 0,
            last_accessed_at: None,
        };
        self.store.put(&record)?;
        debug!(memory_id = %record.memory_id, "stored single-agent memory");
        Ok(StoreResponse::stored(&record))
    }

    /// Store a multi-entity memory
    pub fn store_multi(&self, req: StoreMultiRequest) -> Result<StoreResponse> {
        let (witnessed_by, _) = normalize_witness_set(&req.witnessed_by);
        if witnessed_by.is_empty() {
            return Err(EngramError::InvalidRequest(
                "witnessed_by must contain at least one non-empty entity".into(),
            ));
        }

        let record = MemoryRecord {
            memory_id: MemoryRecord::new_memory_id(),
            content: req.content,
            vector: req.primary_vector,
            metadata: req.metadata.into_metadata()?,
            tags: req.tags,
            witnessed_by,
            situation_id: req
                .situation_id
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(MemoryRecord::new_situation_id),
            situation_type: req.situation_type,
            privacy_level: req.access_control.unwrap_or_default().privacy_level,
            causality: req.causality,
            retention: req.retention,
            created_at: Utc::now(),
            access_count: 0,
            last_accessed_at: None,
        };
        self.store.put(&record)?;
        debug!(
            memory_id = %record.memory_id,
            witnesses = record.witnessed_by.len(),
            "stored multi-entity memory"
        );
        Ok(StoreResponse::stored(&record))
    }

    // ========================================================================
    // RETRIEVE
    // ========================================================================

    /// Single-agent retrieval (legacy surface, no witness scoping;
    /// callers filter by `agent_ids`)
    pub fn retrieve_single(&self, req: RetrieveRequest) -> Result<RetrieveResponse> {
        let (response, _denied) = self.retrieve_core(&req, None, None)?;
        Ok(response)
    }

    /// Witness-scoped retrieval. The KNN pass always carries the
    /// requesting entity as a filter; the access predicate re-checks
    /// every hit as defence in depth.
    pub fn retrieve_multi(&self, req: RetrieveMultiRequest) -> Result<RetrieveMultiResponse> {
        if req.requesting_entity.trim().is_empty() {
            return Err(EngramError::InvalidRequest(
                "requesting_entity must be non-empty".into(),
            ));
        }
        let (base, denied) = self.retrieve_core(
            &req.request,
            Some(&req.requesting_entity),
            req.entity_filters.as_ref(),
        )?;
        let granted = base.memories.len();
        Ok(RetrieveMultiResponse {
            base,
            access_granted_count: granted,
            access_denied_count: denied,
            entity_verification: EntityVerification {
                requesting_entity: req.requesting_entity,
                search_scope: "witnessed_memories_only".into(),
            },
        })
    }

    fn retrieve_core(
        &self,
        req: &RetrieveRequest,
        requesting_entity: Option<&str>,
        entity_filters: Option<&EntityFilters>,
    ) -> Result<(RetrieveResponse, usize)> {
        let start = Instant::now();
        let dimensions = self.dimensions();
        let query = combine_resonance(&req.resonance_vectors, dimensions)?;
        let params = &req.retrieval;

        if params.top_k == 0 {
            return Ok((
                RetrieveResponse {
                    memories: vec![],
                    total_found: 0,
                    search_time_ms: start.elapsed().as_millis() as u64,
                    query_vector_dims: dimensions,
                },
                0,
            ));
        }

        let filter = build_filter(req, requesting_entity, entity_filters)?;
        let mut candidates = self.store.search_filtered(
            &query,
            params.top_k,
            candidate_pool(params.top_k),
            params.similarity_threshold,
            &filter,
        )?;

        // Defence in depth: the store filter already enforces witness
        // scope, but every hit is re-checked before it can leave the
        // engine. Rejections are reported, not silently dropped.
        let mut denied = 0usize;
        if let Some(entity) = requesting_entity {
            candidates.retain(|c| {
                let ok = allow(&c.record, entity);
                if !ok {
                    denied += 1;
                }
                ok
            });
        }

        // Recency boost is multiplicative on similarity_score and applied
        // after the similarity floor, so it can reorder but never
        // resurrect sub-threshold hits.
        if params.boost_recent {
            let now = Utc::now();
            for c in candidates.iter_mut() {
                let age_days =
                    (now - c.record.created_at).num_seconds().max(0) as f64 / 86_400.0;
                let boost =
                    1.0 + RECENT_BOOST_WEIGHT * (-age_days / RECENT_BOOST_TIME_DAYS).exp() as f32;
                c.similarity *= boost;
            }
            candidates.sort_by(|a, b| {
                b.similarity
                    .partial_cmp(&a.similarity)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
        }

        let selected = self.rank(candidates, req)?;
        let total_found = selected.len();

        let mut memories = Vec::with_capacity(selected.len());
        for scored in selected {
            self.store.record_access(&scored.record.memory_id)?;
            memories.push(self.to_retrieved(scored)?);
        }

        Ok((
            RetrieveResponse {
                memories,
                total_found,
                search_time_ms: start.elapsed().as_millis() as u64,
                query_vector_dims: dimensions,
            },
            denied,
        ))
    }

    /// Order the floor-filtered candidate pool and truncate to `top_k`.
    /// MMR (when `diversity_lambda > 0`) runs over the already
    /// floor-filtered pool.
    fn rank(&self, candidates: Vec<ScoredMemory>, req: &RetrieveRequest) -> Result<Vec<ScoredMemory>> {
        let top_k = req.retrieval.top_k;
        if let Some(lambda) = req.retrieval.diversity_lambda.filter(|l| *l > 0.0) {
            let pool: Vec<MmrCandidate<'_>> = candidates
                .iter()
                .map(|c| MmrCandidate {
                    score: c.similarity,
                    vector: &c.record.vector,
                })
                .collect();
            let order = mmr_select(&pool, lambda, top_k);
            let mut picked: Vec<Option<ScoredMemory>> = candidates.into_iter().map(Some).collect();
            return Ok(order
                .into_iter()
                .filter_map(|i| picked[i].take())
                .collect());
        }

        let mut candidates = candidates;
        match req.ordering {
            OrderBy::Similarity => {} // already sorted by the store
            OrderBy::Recency => {
                candidates.sort_by(|a, b| b.record.created_at.cmp(&a.record.created_at));
            }
            OrderBy::Importance => {
                candidates.sort_by(|a, b| {
                    let ia = a.record.metadata.importance.unwrap_or(0.0);
                    let ib = b.record.metadata.importance.unwrap_or(0.0);
                    ib.partial_cmp(&ia).unwrap_or(std::cmp::Ordering::Equal)
                });
            }
        }
        candidates.truncate(top_k);
        Ok(candidates)
    }

    fn to_retrieved(&self, scored: ScoredMemory) -> Result<RetrievedMemory> {
        let record = scored.record;
        let causality = match &record.causality {
            Some(c) => {
                let filtered = self.store.filter_dangling_parents(c)?;
                if filtered.parent_memories.is_empty() && c.synthesis_type.is_none() {
                    None
                } else {
                    Some(filtered)
                }
            }
            None => None,
        };
        Ok(RetrievedMemory {
            content_preview: record.content.preview(),
            summary: record.content.summary.clone(),
            annotation_count: self.store.annotation_count(&record.memory_id)?,
            media_count: record.content.media.len(),
            similarity_score: scored.similarity,
            metadata: record.metadata,
            tags: record.tags,
            witnessed_by: record.witnessed_by,
            situation_id: record.situation_id,
            situation_type: record.situation_type,
            privacy_level: record.privacy_level,
            causality,
            access_count: record.access_count,
            memory_id: record.memory_id,
        })
    }

    // ========================================================================
    // POINT READS, ANNOTATIONS, SITUATIONS
    // ========================================================================

    /// Fetch a memory. With a requesting entity, the access predicate is
    /// applied and denial is reported as `NotFound` so existence never
    /// leaks.
    pub fn get(&self, memory_id: &str, requesting_entity: Option<&str>) -> Result<MemoryRecord> {
        let record = self
            .store
            .get(memory_id)?
            .ok_or_else(|| EngramError::NotFound(memory_id.to_string()))?;
        if let Some(entity) = requesting_entity {
            if !allow(&record, entity) {
                return Err(EngramError::NotFound(memory_id.to_string()));
            }
        }
        Ok(record)
    }

    /// Append an annotation. Only a witness may annotate; the caller has
    /// already proven knowledge of the id, so denial is `Forbidden`.
    pub fn annotate(&self, memory_id: &str, annotation: Annotation) -> Result<()> {
        let record = self
            .store
            .get(memory_id)?
            .ok_or_else(|| EngramError::NotFound(memory_id.to_string()))?;
        if !allow(&record, &annotation.annotator_id) {
            return Err(EngramError::Forbidden(format!(
                "{} is not a witness of {memory_id}",
                annotation.annotator_id
            )));
        }
        self.store.annotate(memory_id, &annotation)
    }

    /// List annotations, witness-checked like `get`
    pub fn annotations(
        &self,
        memory_id: &str,
        requesting_entity: Option<&str>,
    ) -> Result<Vec<Annotation>> {
        self.get(memory_id, requesting_entity)?;
        self.store.annotations(memory_id)
    }

    /// Situations an entity participates in, most recent activity first
    pub fn situations_for(&self, entity_id: &str) -> Result<Vec<Situation>> {
        if entity_id.trim().is_empty() {
            return Err(EngramError::InvalidRequest(
                "entity_id must be non-empty".into(),
            ));
        }
        self.store.situations_for(entity_id)
    }

    /// Most recently created memories, optionally witness-scoped
    pub fn list_recent(&self, limit: usize, entity_id: Option<&str>) -> Result<Vec<MemoryRecord>> {
        self.store.list_recent(limit.clamp(1, 200), entity_id)
    }

    /// Engine statistics
    pub fn stats(&self) -> Result<EngineStats> {
        self.store.stats()
    }
}

/// Translate request filters into the store-level predicate
fn build_filter(
    req: &RetrieveRequest,
    requesting_entity: Option<&str>,
    entity_filters: Option<&EntityFilters>,
) -> Result<RetrievalFilter> {
    let mut filter = RetrievalFilter {
        witness: requesting_entity.map(normalize_entity_id),
        ..Default::default()
    };
    if let Some(tags) = &req.tags {
        filter.include_tags = tags.include.clone();
        filter.exclude_tags = tags.exclude.clone();
    }
    if let Some(f) = &req.filters {
        filter.memory_types = f.memory_types.clone();
        filter.agent_ids = f.agent_ids.clone();
        filter.domains = f.domains.clone();
        filter.situation_types = f.situation_types.clone();
        filter.confidence_floor = f.confidence_threshold;
        if let Some(range) = &f.timestamp_range {
            filter.after = range.start.as_deref().map(parse_rfc3339_z).transpose()?;
            filter.before = range.end.as_deref().map(parse_rfc3339_z).transpose()?;
        }
    }
    if let Some(ef) = entity_filters {
        filter.co_participants = ef
            .co_participants
            .iter()
            .map(|e| normalize_entity_id(e))
            .collect();
        filter.exclude_private_to = ef
            .exclude_private_to
            .iter()
            .map(|e| normalize_entity_id(e))
            .collect();
    }
    Ok(filter)
}

// ============================================================================
// TESTS
// ============================================================================
