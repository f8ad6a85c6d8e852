//! SQLite Record Store
//!
//! Durable storage for memory records plus the in-process HNSW index.
//!
//! Uses separate reader/writer connections for interior mutability. All
//! methods take `&self`, making the store `Send + Sync` so the protocol
//! layers can share an `Arc<MemoryStore>`.
//!
//! Every `put` writes the record row, its witness-access rows and its
//! situation registration in one transaction: a record is never visible
//! with an unset witness set.

use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use lru::LruCache;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{EngramError, Result};
use crate::memory::{
    normalize_entity_id, Annotation, Causality, DecayFunction, MemoryContent, MemoryMetadata,
    MemoryRecord, MemoryType, PrivacyLevel, Retention, Situation, SituationStatus,
};
use crate::search::{RetrievalFilter, VectorIndex, VectorIndexStats};
use crate::time::{parse_stored, to_rfc3339_z};

/// Hot-read cache capacity
const READ_CACHE_CAPACITY: usize = 256;

/// Neighbours examined per record when hunting consolidation candidates
const CONSOLIDATION_NEIGHBOURS: usize = 8;

// ============================================================================
// RESULT TYPES
// ============================================================================

/// A record with its query similarity, as returned by filtered search
#[derive(Debug, Clone)]
pub struct ScoredMemory {
    pub record: MemoryRecord,
    pub similarity: f32,
}

/// Store-level statistics for the admin and stats surfaces
#[derive(Debug, Clone, serde::Serialize)]
pub struct StoreStats {
    pub total_memories: i64,
    pub total_situations: i64,
    pub total_annotations: i64,
    pub by_memory_type: BTreeMap<String, i64>,
    pub index: VectorIndexStats,
}

/// Per-entity curation counters
#[derive(Debug, Clone, serde::Serialize)]
pub struct CurationStats {
    pub entity_id: String,
    pub observations_seen: i64,
    pub observations_stored: i64,
    pub observations_rejected: i64,
    pub by_storage_type: BTreeMap<String, i64>,
}

// ============================================================================
// STORE
// ============================================================================

/// SQLite-backed record store with integrated HNSW index
pub struct MemoryStore {
    writer: Mutex<Connection>,
    reader: Mutex<Connection>,
    index: Mutex<VectorIndex>,
    read_cache: Mutex<LruCache<String, MemoryRecord>>,
    dimensions: usize,
}

impl MemoryStore {
    /// Apply connection pragmas
    fn configure_connection(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA cache_size = -64000;
             PRAGMA temp_store = MEMORY;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )?;
        Ok(())
    }

    /// Open (or create) a store at `db_path`, defaulting to the platform
    /// data directory. Rebuilds the vector index from stored embeddings.
    pub fn open(db_path: Option<PathBuf>, dimensions: usize) -> Result<Self> {
        let path = match db_path {
            Some(p) => p,
            None => {
                let proj_dirs = ProjectDirs::from("ai", "entrained", "engram").ok_or_else(|| {
                    EngramError::Storage("could not determine data directory".into())
                })?;
                let data_dir = proj_dirs.data_dir();
                std::fs::create_dir_all(data_dir)
                    .map_err(|e| EngramError::Storage(format!("create data dir: {e}")))?;
                data_dir.join("engram.db")
            }
        };

        let writer_conn = Connection::open(&path)?;
        Self::configure_connection(&writer_conn)?;
        super::migrations::apply_migrations(&writer_conn)?;

        let reader_conn = Connection::open(&path)?;
        Self::configure_connection(&reader_conn)?;

        let index = VectorIndex::new(dimensions)?;

        let store = Self {
            writer: Mutex::new(writer_conn),
            reader: Mutex::new(reader_conn),
            index: Mutex::new(index),
            read_cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(READ_CACHE_CAPACITY).expect("capacity is non-zero"),
            )),
            dimensions,
        };
        store.rebuild_index()?;
        Ok(store)
    }

    /// Configured embedding dimension
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn writer(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.writer
            .lock()
            .map_err(|_| EngramError::Storage("writer lock poisoned".into()))
    }

    fn reader(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.reader
            .lock()
            .map_err(|_| EngramError::Storage("reader lock poisoned".into()))
    }

    fn index(&self) -> Result<std::sync::MutexGuard<'_, VectorIndex>> {
        self.index
            .lock()
            .map_err(|_| EngramError::Storage("index lock poisoned".into()))
    }

    fn cache(&self) -> Result<std::sync::MutexGuard<'_, LruCache<String, MemoryRecord>>> {
        self.read_cache
            .lock()
            .map_err(|_| EngramError::Storage("cache lock poisoned".into()))
    }

    // ========================================================================
    // PUT / GET / DELETE
    // ========================================================================

    /// Persist a new record. Fails with `AlreadyExists` on a duplicate id;
    /// the existing record is left untouched.
    pub fn put(&self, record: &MemoryRecord) -> Result<()> {
        record.validate(self.dimensions)?;

        let witnessed_norm: Vec<String> = record
            .witnessed_by
            .iter()
            .map(|w| normalize_entity_id(w))
            .collect();

        {
            let mut writer = self.writer()?;
            let tx = writer.transaction()?;

            let exists: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM memories WHERE id = ?1)",
                params![record.memory_id],
                |row| row.get(0),
            )?;
            if exists {
                return Err(EngramError::AlreadyExists(record.memory_id.clone()));
            }

            tx.execute(
                "INSERT INTO memories (
                    id, content_text, content_summary, speakers, media,
                    timestamp, memory_type, agent_id, domain, confidence,
                    importance, topic_tags, interaction_quality, duration_minutes, tags,
                    witnessed_by, witnessed_norm, situation_id, situation_type, privacy_level,
                    causality, ttl_seconds, decay_function, created_at, access_count,
                    last_accessed_at, embedding, dimensions
                ) VALUES (
                    ?1, ?2, ?3, ?4, ?5,
                    ?6, ?7, ?8, ?9, ?10,
                    ?11, ?12, ?13, ?14, ?15,
                    ?16, ?17, ?18, ?19, ?20,
                    ?21, ?22, ?23, ?24, ?25,
                    ?26, ?27, ?28
                )",
                params![
                    record.memory_id,
                    record.content.text,
                    record.content.summary,
                    record
                        .content
                        .speakers
                        .as_ref()
                        .map(serde_json::to_string)
                        .transpose()?,
                    serde_json::to_string(&record.content.media)?,
                    to_rfc3339_z(record.metadata.timestamp),
                    record.metadata.memory_type.as_str(),
                    record.metadata.agent_id,
                    record.metadata.domain,
                    record.metadata.confidence,
                    record.metadata.importance,
                    serde_json::to_string(&record.metadata.topic_tags)?,
                    record.metadata.interaction_quality,
                    record.metadata.situation_duration_minutes,
                    serde_json::to_string(&record.tags)?,
                    serde_json::to_string(&record.witnessed_by)?,
                    witnessed_norm.join(","),
                    record.situation_id,
                    record.situation_type,
                    record.privacy_level.as_str(),
                    record
                        .causality
                        .as_ref()
                        .map(serde_json::to_string)
                        .transpose()?,
                    record
                        .retention
                        .as_ref()
                        .and_then(|r| r.ttl_seconds)
                        .map(|t| t as i64),
                    record
                        .retention
                        .as_ref()
                        .map(|r| r.decay_function.as_str())
                        .unwrap_or("none"),
                    to_rfc3339_z(record.created_at),
                    record.access_count,
                    record.last_accessed_at.map(to_rfc3339_z),
                    embedding_blob(&record.vector),
                    record.vector.len() as i64,
                ],
            )?;

            for norm in &witnessed_norm {
                tx.execute(
                    "INSERT OR IGNORE INTO entity_access (entity_norm, memory_id) VALUES (?1, ?2)",
                    params![norm, record.memory_id],
                )?;
            }

            Self::register_situation(&tx, record)?;

            if let Some(causality) = &record.causality {
                for (parent, influence) in causality
                    .parent_memories
                    .iter()
                    .zip(causality.influence_strength.iter())
                {
                    tx.execute(
                        "INSERT OR IGNORE INTO causality_edges (child_id, parent_id, influence)
                         VALUES (?1, ?2, ?3)",
                        params![record.memory_id, parent, influence],
                    )?;
                }
            }

            tx.commit()?;
        }

        // Index the embedding. On failure, roll the row back rather than
        // leave an unsearchable record behind.
        if let Err(e) = self.index()?.insert(&record.memory_id, &record.vector) {
            let _ = self.delete(&record.memory_id);
            return Err(e);
        }
        Ok(())
    }

    fn register_situation(tx: &rusqlite::Transaction<'_>, record: &MemoryRecord) -> Result<()> {
        let now = to_rfc3339_z(record.created_at);
        let existing: Option<String> = tx
            .query_row(
                "SELECT participants FROM situations WHERE situation_id = ?1",
                params![record.situation_id],
                |row| row.get(0),
            )
            .optional()?;

        match existing {
            None => {
                tx.execute(
                    "INSERT INTO situations (situation_id, situation_type, participants, created_at, last_activity, status)
                     VALUES (?1, ?2, ?3, ?4, ?4, 'active')",
                    params![
                        record.situation_id,
                        record.situation_type,
                        serde_json::to_string(&record.witnessed_by)?,
                        now,
                    ],
                )?;
            }
            Some(participants_json) => {
                let mut participants: Vec<String> = serde_json::from_str(&participants_json)?;
                let known: Vec<String> =
                    participants.iter().map(|p| normalize_entity_id(p)).collect();
                for witness in &record.witnessed_by {
                    if !known.contains(&normalize_entity_id(witness)) {
                        participants.push(witness.clone());
                    }
                }
                tx.execute(
                    "UPDATE situations SET participants = ?2, last_activity = ?3 WHERE situation_id = ?1",
                    params![
                        record.situation_id,
                        serde_json::to_string(&participants)?,
                        now,
                    ],
                )?;
            }
        }
        Ok(())
    }

    /// Fetch a record by id
    pub fn get(&self, memory_id: &str) -> Result<Option<MemoryRecord>> {
        if let Some(hit) = self.cache()?.get(memory_id) {
            return Ok(Some(hit.clone()));
        }
        let record = {
            let reader = self.reader()?;
            let mut stmt = reader.prepare_cached(&format!(
                "SELECT {RECORD_COLUMNS} FROM memories m WHERE m.id = ?1"
            ))?;
            stmt.query_row(params![memory_id], row_to_record).optional()?
        };
        if let Some(r) = &record {
            self.cache()?.put(memory_id.to_string(), r.clone());
        }
        Ok(record)
    }

    /// Whether a record exists (no access check, no cache traffic)
    pub fn contains(&self, memory_id: &str) -> Result<bool> {
        let reader = self.reader()?;
        let exists: bool = reader.query_row(
            "SELECT EXISTS(SELECT 1 FROM memories WHERE id = ?1)",
            params![memory_id],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    /// Delete a record, its secondary rows, and its outgoing causality
    /// edges. Incoming edges are left dangling (weak references). The
    /// parent situation is garbage-collected when this was its last
    /// memory. Returns whether the record existed.
    pub fn delete(&self, memory_id: &str) -> Result<bool> {
        let existed = {
            let mut writer = self.writer()?;
            let tx = writer.transaction()?;

            let situation_id: Option<String> = tx
                .query_row(
                    "SELECT situation_id FROM memories WHERE id = ?1",
                    params![memory_id],
                    |row| row.get(0),
                )
                .optional()?;

            let Some(situation_id) = situation_id else {
                return Ok(false);
            };

            tx.execute("DELETE FROM memories WHERE id = ?1", params![memory_id])?;
            tx.execute(
                "DELETE FROM causality_edges WHERE child_id = ?1",
                params![memory_id],
            )?;

            let remaining: i64 = tx.query_row(
                "SELECT COUNT(*) FROM memories WHERE situation_id = ?1",
                params![situation_id],
                |row| row.get(0),
            )?;
            if remaining == 0 {
                tx.execute(
                    "DELETE FROM situations WHERE situation_id = ?1",
                    params![situation_id],
                )?;
            }

            tx.commit()?;
            true
        };

        self.index()?.remove(memory_id)?;
        self.cache()?.pop(memory_id);
        Ok(existed)
    }

    /// Bump access bookkeeping after a successful retrieval
    pub fn record_access(&self, memory_id: &str) -> Result<()> {
        let writer = self.writer()?;
        writer.execute(
            "UPDATE memories SET access_count = access_count + 1, last_accessed_at = ?2 WHERE id = ?1",
            params![memory_id, to_rfc3339_z(Utc::now())],
        )?;
        drop(writer);
        self.cache()?.pop(memory_id);
        Ok(())
    }

    // ========================================================================
    // SEARCH
    // ========================================================================

    /// KNN with record-level filtering.
    ///
    /// Searches a candidate pool of at least `pool` vectors, hydrates the
    /// hits, applies the similarity floor and the filter, and expands the
    /// pool when filtering starves the result below `want`. Results are
    /// sorted by decreasing similarity; the caller truncates.
    pub fn search_filtered(
        &self,
        query: &[f32],
        want: usize,
        pool: usize,
        floor: f32,
        filter: &RetrievalFilter,
    ) -> Result<Vec<ScoredMemory>> {
        self.ensure_index()?;

        let total = self.index()?.len();
        if total == 0 || want == 0 {
            return Ok(vec![]);
        }

        let mut pool = pool.clamp(1, total.max(1));
        loop {
            let hits = self.index()?.query(query, pool)?;
            let mut matched = Vec::with_capacity(hits.len());
            for (id, similarity) in &hits {
                if *similarity < floor {
                    continue;
                }
                let Some(record) = self.get(id)? else {
                    // Index ahead of the store; skip the phantom entry.
                    continue;
                };
                if filter.matches(&record) {
                    matched.push(ScoredMemory {
                        record,
                        similarity: *similarity,
                    });
                }
            }

            let exhausted = hits.len() >= total || pool >= total;
            if matched.len() >= want || exhausted {
                matched.sort_by(|a, b| {
                    b.similarity
                        .partial_cmp(&a.similarity)
                        .unwrap_or(std::cmp::Ordering::Equal)
                });
                return Ok(matched);
            }
            pool = (pool * 4).min(total);
        }
    }

    /// Spec-shaped KNN: `(memory_id, similarity)` pairs, best first
    pub fn knn(
        &self,
        query: &[f32],
        k: usize,
        similarity_floor: f32,
        filter: &RetrievalFilter,
    ) -> Result<Vec<(String, f32)>> {
        let pool = std::cmp::max(4 * k, 50);
        let matched = self.search_filtered(query, k, pool, similarity_floor, filter)?;
        Ok(matched
            .into_iter()
            .take(k)
            .map(|m| (m.record.memory_id, m.similarity))
            .collect())
    }

    /// The index is rebuilt once if it is empty while the store is not
    /// (lost on restart or dropped by an admin flush gone wrong).
    fn ensure_index(&self) -> Result<()> {
        let index_len = self.index()?.len();
        if index_len > 0 {
            return Ok(());
        }
        let rows: i64 = {
            let reader = self.reader()?;
            reader.query_row("SELECT COUNT(*) FROM memories", [], |row| row.get(0))?
        };
        if rows > 0 {
            tracing::warn!(rows, "vector index empty with populated store; rebuilding");
            self.rebuild_index()?;
        }
        Ok(())
    }

    /// Rebuild the HNSW index from stored embeddings; returns entry count
    pub fn rebuild_index(&self) -> Result<usize> {
        let rows: Vec<(String, Vec<u8>)> = {
            let reader = self.reader()?;
            let mut stmt = reader.prepare("SELECT id, embedding FROM memories")?;
            let mapped = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
            mapped.collect::<rusqlite::Result<Vec<_>>>()?
        };

        let mut index = self.index()?;
        index.clear()?;
        for (id, blob) in &rows {
            let vector = blob_to_embedding(blob);
            if vector.len() != self.dimensions {
                tracing::warn!(memory_id = %id, "skipping embedding with stale dimensions");
                continue;
            }
            index.insert(id, &vector)?;
        }
        Ok(index.len())
    }

    // ========================================================================
    // ENTITY / SITUATION QUERIES
    // ========================================================================

    /// Witness-scoped listing of memory ids, most recent first
    pub fn scan_by_entity(&self, entity_id: &str) -> Result<Vec<String>> {
        let norm = normalize_entity_id(entity_id);
        let reader = self.reader()?;
        let mut stmt = reader.prepare_cached(
            "SELECT m.id FROM memories m
             JOIN entity_access ea ON ea.memory_id = m.id
             WHERE ea.entity_norm = ?1
             ORDER BY m.created_at DESC",
        )?;
        let ids = stmt
            .query_map(params![norm], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(ids)
    }

    /// Most recent records, optionally scoped to a witness
    pub fn list_recent(&self, limit: usize, entity_id: Option<&str>) -> Result<Vec<MemoryRecord>> {
        let reader = self.reader()?;
        let records = match entity_id {
            Some(entity) => {
                let norm = normalize_entity_id(entity);
                let mut stmt = reader.prepare_cached(&format!(
                    "SELECT {RECORD_COLUMNS} FROM memories m
                     JOIN entity_access ea ON ea.memory_id = m.id
                     WHERE ea.entity_norm = ?1
                     ORDER BY m.created_at DESC LIMIT ?2"
                ))?;
                let mapped = stmt.query_map(params![norm, limit as i64], row_to_record)?;
                mapped.collect::<rusqlite::Result<Vec<_>>>()?
            }
            None => {
                let mut stmt = reader.prepare_cached(&format!(
                    "SELECT {RECORD_COLUMNS} FROM memories m
                     ORDER BY m.created_at DESC LIMIT ?1"
                ))?;
                let mapped = stmt.query_map(params![limit as i64], row_to_record)?;
                mapped.collect::<rusqlite::Result<Vec<_>>>()?
            }
        };
        Ok(records)
    }

    /// Hydrate one situation with its member memory ids
    pub fn situation(&self, situation_id: &str) -> Result<Option<Situation>> {
        let reader = self.reader()?;
        let head = reader
            .query_row(
                "SELECT situation_id, situation_type, participants, created_at, last_activity, status
                 FROM situations WHERE situation_id = ?1",
                params![situation_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, String>(5)?,
                    ))
                },
            )
            .optional()?;

        let Some((id, situation_type, participants_json, created_at, last_activity, status)) = head
        else {
            return Ok(None);
        };

        let mut stmt = reader.prepare_cached(
            "SELECT id FROM memories WHERE situation_id = ?1 ORDER BY created_at",
        )?;
        let memory_ids = stmt
            .query_map(params![id], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;

        Ok(Some(Situation {
            situation_id: id,
            situation_type,
            participants: serde_json::from_str(&participants_json)?,
            memory_ids,
            created_at: parse_stored(&created_at)?,
            last_activity: parse_stored(&last_activity)?,
            status: SituationStatus::parse_name(&status),
        }))
    }

    /// Situations an entity participates in, ordered by last activity
    /// descending
    pub fn situations_for(&self, entity_id: &str) -> Result<Vec<Situation>> {
        let norm = normalize_entity_id(entity_id);
        let ids: Vec<String> = {
            let reader = self.reader()?;
            let mut stmt = reader.prepare_cached(
                "SELECT DISTINCT m.situation_id FROM memories m
                 JOIN entity_access ea ON ea.memory_id = m.id
                 WHERE ea.entity_norm = ?1",
            )?;
            let mapped = stmt.query_map(params![norm], |row| row.get(0))?;
            mapped.collect::<rusqlite::Result<Vec<_>>>()?
        };

        let mut situations = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(s) = self.situation(&id)? {
                situations.push(s);
            }
        }
        situations.sort_by(|a, b| b.last_activity.cmp(&a.last_activity));
        Ok(situations)
    }

    // ========================================================================
    // ANNOTATIONS
    // ========================================================================

    /// Append an annotation; fails with `NotFound` if the parent is absent
    pub fn annotate(&self, memory_id: &str, annotation: &Annotation) -> Result<()> {
        annotation.validate()?;
        if !self.contains(memory_id)? {
            return Err(EngramError::NotFound(memory_id.to_string()));
        }
        let writer = self.writer()?;
        writer.execute(
            "INSERT INTO annotations (
                memory_id, annotator_id, timestamp, annotation_type, content,
                vector, evidence_links, tags, confidence
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                memory_id,
                annotation.annotator_id,
                to_rfc3339_z(annotation.timestamp),
                annotation.annotation_type,
                annotation.content,
                annotation.vector.as_ref().map(|v| embedding_blob(v)),
                serde_json::to_string(&annotation.evidence_links)?,
                serde_json::to_string(&annotation.tags)?,
                annotation.confidence,
            ],
        )?;
        Ok(())
    }

    /// List annotations for a memory, oldest first
    pub fn annotations(&self, memory_id: &str) -> Result<Vec<Annotation>> {
        let reader = self.reader()?;
        let mut stmt = reader.prepare_cached(
            "SELECT annotator_id, timestamp, annotation_type, content, vector,
                    evidence_links, tags, confidence
             FROM annotations WHERE memory_id = ?1 ORDER BY seq",
        )?;
        let mapped = stmt.query_map(params![memory_id], |row| {
            Ok(RawAnnotation {
                annotator_id: row.get(0)?,
                timestamp: row.get(1)?,
                annotation_type: row.get(2)?,
                content: row.get(3)?,
                vector: row.get(4)?,
                evidence_links: row.get(5)?,
                tags: row.get(6)?,
                confidence: row.get(7)?,
            })
        })?;
        let raws = mapped.collect::<rusqlite::Result<Vec<_>>>()?;
        raws.into_iter().map(RawAnnotation::into_annotation).collect()
    }

    /// Number of annotations on a memory
    pub fn annotation_count(&self, memory_id: &str) -> Result<i64> {
        let reader = self.reader()?;
        let count: i64 = reader.query_row(
            "SELECT COUNT(*) FROM annotations WHERE memory_id = ?1",
            params![memory_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Keep only causality parents that still resolve
    pub fn filter_dangling_parents(&self, causality: &Causality) -> Result<Causality> {
        let mut filtered = Causality {
            parent_memories: Vec::new(),
            influence_strength: Vec::new(),
            synthesis_type: causality.synthesis_type.clone(),
            reasoning: causality.reasoning.clone(),
        };
        for (parent, influence) in causality
            .parent_memories
            .iter()
            .zip(causality.influence_strength.iter())
        {
            if self.contains(parent)? {
                filtered.parent_memories.push(parent.clone());
                filtered.influence_strength.push(*influence);
            }
        }
        Ok(filtered)
    }

    // ========================================================================
    // CLEANUP SUPPORT
    // ========================================================================

    /// Records whose `created_at + ttl_seconds` has passed
    pub fn expired_ids(&self, now: DateTime<Utc>) -> Result<Vec<String>> {
        let reader = self.reader()?;
        let mut stmt = reader.prepare_cached(
            "SELECT id FROM memories
             WHERE ttl_seconds IS NOT NULL
               AND strftime('%s', created_at) + ttl_seconds < strftime('%s', ?1)",
        )?;
        let ids = stmt
            .query_map(params![to_rfc3339_z(now)], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(ids)
    }

    /// Pairs of records with near-identical embeddings and identical
    /// witness sets: consolidation candidates. Each pair is reported once
    /// with the earlier record first.
    pub fn similar_pairs(&self, threshold: f32) -> Result<Vec<(String, String, f32)>> {
        let ids: Vec<String> = {
            let reader = self.reader()?;
            let mut stmt = reader.prepare("SELECT id FROM memories ORDER BY created_at")?;
            let mapped = stmt.query_map([], |row| row.get(0))?;
            mapped.collect::<rusqlite::Result<Vec<_>>>()?
        };

        let mut pairs = Vec::new();
        let mut seen: Vec<(String, String)> = Vec::new();
        for id in &ids {
            let Some(record) = self.get(id)? else { continue };
            let neighbours = {
                let index = self.index()?;
                index.query(&record.vector, CONSOLIDATION_NEIGHBOURS)?
            };
            for (other_id, similarity) in neighbours {
                if other_id == *id || similarity < threshold {
                    continue;
                }
                let key = if *id < other_id {
                    (id.clone(), other_id.clone())
                } else {
                    (other_id.clone(), id.clone())
                };
                if seen.contains(&key) {
                    continue;
                }
                let Some(other) = self.get(&other_id)? else { continue };
                if witness_key(&record.witnessed_by) != witness_key(&other.witnessed_by) {
                    continue;
                }
                seen.push(key);
                let (first, second) = if record.created_at <= other.created_at {
                    (id.clone(), other_id)
                } else {
                    (other_id, id.clone())
                };
                pairs.push((first, second, similarity));
            }
        }
        Ok(pairs)
    }

    /// Merge `absorb` into `keep`: concatenated content, the higher
    /// confidence, the earlier timestamp. The absorbed record is deleted.
    pub fn merge_pair(&self, keep: &str, absorb: &str) -> Result<bool> {
        let (Some(kept), Some(absorbed)) = (self.get(keep)?, self.get(absorb)?) else {
            return Ok(false);
        };

        let merged_text = format!("{}\n\n{}", kept.content.text, absorbed.content.text);
        let confidence = match (kept.metadata.confidence, absorbed.metadata.confidence) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
        let timestamp = kept.metadata.timestamp.min(absorbed.metadata.timestamp);

        {
            let writer = self.writer()?;
            writer.execute(
                "UPDATE memories SET content_text = ?2, confidence = ?3, timestamp = ?4 WHERE id = ?1",
                params![keep, merged_text, confidence, to_rfc3339_z(timestamp)],
            )?;
        }
        self.cache()?.pop(keep);
        self.delete(absorb)?;
        Ok(true)
    }

    /// Apply retention decay to importance. `lambda` is the decay rate
    /// per day of age. Returns the number of demoted records.
    pub fn decay_pass(&self, now: DateTime<Utc>, lambda: f64) -> Result<u64> {
        let rows: Vec<(String, f64, String, String)> = {
            let reader = self.reader()?;
            let mut stmt = reader.prepare_cached(
                "SELECT id, importance, decay_function, created_at FROM memories
                 WHERE decay_function != 'none' AND importance IS NOT NULL",
            )?;
            let mapped = stmt.query_map([], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
            })?;
            mapped.collect::<rusqlite::Result<Vec<_>>>()?
        };

        let mut demoted = 0;
        for (id, importance, decay, created_at) in rows {
            let created = parse_stored(&created_at)?;
            let age_days = (now - created).num_seconds().max(0) as f64 / 86_400.0;
            let decayed = match decay.parse::<DecayFunction>().unwrap_or_default() {
                DecayFunction::None => importance,
                DecayFunction::Linear => (importance - lambda * age_days).max(0.0),
                DecayFunction::Logarithmic => importance * (-lambda * age_days).exp(),
            };
            if (decayed - importance).abs() > f64::EPSILON {
                let writer = self.writer()?;
                writer.execute(
                    "UPDATE memories SET importance = ?2 WHERE id = ?1",
                    params![id, decayed],
                )?;
                drop(writer);
                self.cache()?.pop(&id);
                demoted += 1;
            }
        }
        Ok(demoted)
    }

    /// Journal a cleanup run
    pub fn journal_cleanup(&self, job: &str, deleted: u64, merged: u64, demoted: u64) -> Result<()> {
        let writer = self.writer()?;
        writer.execute(
            "INSERT INTO cleanup_history (job, ran_at, deleted, merged, demoted)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                job,
                to_rfc3339_z(Utc::now()),
                deleted as i64,
                merged as i64,
                demoted as i64
            ],
        )?;
        Ok(())
    }

    // ========================================================================
    // CURATION JOURNAL
    // ========================================================================

    /// Record one curation decision for per-entity statistics
    pub fn log_curation(
        &self,
        entity_id: &str,
        storage_type: &str,
        stored: bool,
        memory_id: Option<&str>,
        rationale: &str,
    ) -> Result<()> {
        let writer = self.writer()?;
        writer.execute(
            "INSERT INTO curation_log (entity_id, storage_type, stored, memory_id, rationale, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                entity_id,
                storage_type,
                stored as i64,
                memory_id,
                rationale,
                to_rfc3339_z(Utc::now()),
            ],
        )?;
        Ok(())
    }

    /// Per-entity curation counters
    pub fn curation_stats(&self, entity_id: &str) -> Result<CurationStats> {
        let reader = self.reader()?;
        let (seen, stored): (i64, i64) = reader.query_row(
            "SELECT COUNT(*), COALESCE(SUM(stored), 0) FROM curation_log WHERE entity_id = ?1",
            params![entity_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        let mut stmt = reader.prepare_cached(
            "SELECT storage_type, COUNT(*) FROM curation_log WHERE entity_id = ?1 GROUP BY storage_type",
        )?;
        let by_storage_type = stmt
            .query_map(params![entity_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?
            .collect::<rusqlite::Result<BTreeMap<String, i64>>>()?;
        Ok(CurationStats {
            entity_id: entity_id.to_string(),
            observations_seen: seen,
            observations_stored: stored,
            observations_rejected: seen - stored,
            by_storage_type,
        })
    }

    // ========================================================================
    // ADMIN
    // ========================================================================

    /// Drop all records while preserving the index definition.
    /// Returns the number of deleted memories.
    pub fn flush_all(&self) -> Result<u64> {
        let deleted = {
            let mut writer = self.writer()?;
            let tx = writer.transaction()?;
            let count: i64 = tx.query_row("SELECT COUNT(*) FROM memories", [], |row| row.get(0))?;
            tx.execute("DELETE FROM memories", [])?;
            tx.execute("DELETE FROM situations", [])?;
            tx.execute("DELETE FROM causality_edges", [])?;
            tx.commit()?;
            count as u64
        };
        self.index()?.clear()?;
        self.cache()?.clear();
        Ok(deleted)
    }

    /// Store-level statistics
    pub fn stats(&self) -> Result<StoreStats> {
        let reader = self.reader()?;
        let total_memories: i64 =
            reader.query_row("SELECT COUNT(*) FROM memories", [], |row| row.get(0))?;
        let total_situations: i64 =
            reader.query_row("SELECT COUNT(*) FROM situations", [], |row| row.get(0))?;
        let total_annotations: i64 =
            reader.query_row("SELECT COUNT(*) FROM annotations", [], |row| row.get(0))?;
        let mut stmt = reader
            .prepare_cached("SELECT memory_type, COUNT(*) FROM memories GROUP BY memory_type")?;
        let by_memory_type = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
            .collect::<rusqlite::Result<BTreeMap<String, i64>>>()?;
        drop(stmt);
        drop(reader);
        Ok(StoreStats {
            total_memories,
            total_situations,
            total_annotations,
            by_memory_type,
            index: self.index()?.stats(),
        })
    }
}

/// Canonical form of a witness set for equality comparison
fn witness_key(witnessed_by: &[String]) -> Vec<String> {
    let mut key: Vec<String> = witnessed_by.iter().map(|w| normalize_entity_id(w)).collect();
    key.sort();
    key.dedup();
    key
}

// ============================================================================
// ROW MAPPING
// ============================================================================

const RECORD_COLUMNS: &str = "m.id, m.content_text, m.content_summary, m.speakers, m.media, \
     m.timestamp, m.memory_type, m.agent_id, m.domain, m.confidence, \
     m.importance, m.topic_tags, m.interaction_quality, m.duration_minutes, m.tags, \
     m.witnessed_by, m.situation_id, m.situation_type, m.privacy_level, m.causality, \
     m.ttl_seconds, m.decay_function, m.created_at, m.access_count, m.last_accessed_at, \
     m.embedding";

fn column_err(idx: usize, e: impl std::error::Error + Send + Sync + 'static) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<MemoryRecord> {
    let speakers: Option<String> = row.get(3)?;
    let media: String = row.get(4)?;
    let timestamp: String = row.get(5)?;
    let memory_type: String = row.get(6)?;
    let topic_tags: String = row.get(11)?;
    let tags: String = row.get(14)?;
    let witnessed_by: String = row.get(15)?;
    let privacy_level: String = row.get(18)?;
    let causality: Option<String> = row.get(19)?;
    let ttl_seconds: Option<i64> = row.get(20)?;
    let decay_function: String = row.get(21)?;
    let created_at: String = row.get(22)?;
    let last_accessed_at: Option<String> = row.get(24)?;
    let embedding: Vec<u8> = row.get(25)?;

    let retention = if ttl_seconds.is_some() || decay_function != "none" {
        Some(Retention {
            ttl_seconds: ttl_seconds.map(|t| t as u64),
            decay_function: decay_function
                .parse::<DecayFunction>()
                .map_err(|e| column_err(21, e))?,
        })
    } else {
        None
    };

    Ok(MemoryRecord {
        memory_id: row.get(0)?,
        content: MemoryContent {
            text: row.get(1)?,
            summary: row.get(2)?,
            speakers: speakers
                .map(|s| serde_json::from_str(&s))
                .transpose()
                .map_err(|e| column_err(3, e))?,
            media: serde_json::from_str(&media).map_err(|e| column_err(4, e))?,
        },
        vector: blob_to_embedding(&embedding),
        metadata: MemoryMetadata {
            timestamp: parse_stored_sql(&timestamp, 5)?,
            memory_type: memory_type
                .parse::<MemoryType>()
                .map_err(|e| column_err(6, e))?,
            agent_id: row.get(7)?,
            domain: row.get(8)?,
            confidence: row.get(9)?,
            importance: row.get(10)?,
            topic_tags: serde_json::from_str(&topic_tags).map_err(|e| column_err(11, e))?,
            interaction_quality: row.get(12)?,
            situation_duration_minutes: row.get(13)?,
        },
        tags: serde_json::from_str(&tags).map_err(|e| column_err(14, e))?,
        witnessed_by: serde_json::from_str(&witnessed_by).map_err(|e| column_err(15, e))?,
        situation_id: row.get(16)?,
        situation_type: row.get(17)?,
        privacy_level: privacy_level
            .parse::<PrivacyLevel>()
            .map_err(|e| column_err(18, e))?,
        causality: causality
            .map(|c| serde_json::from_str(&c))
            .transpose()
            .map_err(|e| column_err(19, e))?,
        retention,
        created_at: parse_stored_sql(&created_at, 22)?,
        access_count: row.get(23)?,
        last_accessed_at: last_accessed_at
            .map(|s| parse_stored_sql(&s, 24))
            .transpose()?,
    })
}

fn parse_stored_sql(s: &str, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    parse_stored(s).map_err(|e| column_err(idx, e))
}

struct RawAnnotation {
    annotator_id: String,
    timestamp: String,
    annotation_type: String,
    content: String,
    vector: Option<Vec<u8>>,
    evidence_links: String,
    tags: String,
    confidence: Option<f32>,
}

impl RawAnnotation {
    fn into_annotation(self) -> Result<Annotation> {
        Ok(Annotation {
            annotator_id: self.annotator_id,
            timestamp: parse_stored(&self.timestamp)?,
            annotation_type: self.annotation_type,
            content: self.content,
            vector: self.vector.map(|b| blob_to_embedding(&b)),
            evidence_links: serde_json::from_str(&self.evidence_links)?,
            tags: serde_json::from_str(&self.tags)?,
            confidence: self.confidence,
        })
    }
}

/// Serialise an embedding as a little-endian float32 blob
fn embedding_blob(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Deserialise a little-endian float32 blob
fn blob_to_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================
