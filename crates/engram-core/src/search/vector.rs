//! Cosine HNSW index over memory embeddings
//!
//! Thin ownership layer around a usearch index. usearch keys vectors by
//! `u64`; memory ids are strings, so the index hands out dense numeric
//! keys and keeps a slot table mapping them back. Keys are never reused:
//! replacing or deleting a memory retires its slot, which keeps stale
//! hits detectable (a retired slot simply maps to nothing).
//!
//! The index is a cache over the record store, not a store of record —
//! it is rebuilt from the embedding column at startup and after an admin
//! flush.

use std::collections::HashMap;

use usearch::{Index, IndexOptions, MetricKind, ScalarKind};

use crate::error::{EngramError, Result};

/// Capacity is reserved in chunks; usearch segfaults on `add` past
/// capacity, so every insert goes through [`VectorIndex::ensure_room`].
const RESERVE_CHUNK: usize = 64;

/// HNSW construction/search parameters
#[derive(Debug, Clone, Copy)]
pub struct HnswParams {
    /// Graph connectivity (higher = better recall, more memory)
    pub connectivity: usize,
    /// Expansion factor while building
    pub expansion_add: usize,
    /// Expansion factor while searching
    pub expansion_search: usize,
}

impl Default for HnswParams {
    fn default() -> Self {
        Self {
            connectivity: 16,
            expansion_add: 128,
            expansion_search: 64,
        }
    }
}

/// Index statistics for the admin surface
#[derive(Debug, Clone, serde::Serialize)]
pub struct VectorIndexStats {
    pub total_vectors: usize,
    pub dimensions: usize,
    pub connectivity: usize,
    pub memory_bytes: usize,
}

/// HNSW index keyed by memory id, cosine metric
pub struct VectorIndex {
    inner: Index,
    dimensions: usize,
    params: HnswParams,
    /// memory id → numeric key
    keys: HashMap<String, u64>,
    /// numeric key → memory id; `None` marks a retired slot
    slots: Vec<Option<String>>,
}

impl VectorIndex {
    /// Empty index for the deployment dimension, default HNSW parameters
    pub fn new(dimensions: usize) -> Result<Self> {
        Self::with_params(dimensions, HnswParams::default())
    }

    /// Empty index with explicit HNSW parameters
    pub fn with_params(dimensions: usize, params: HnswParams) -> Result<Self> {
        Ok(Self {
            inner: build_inner(dimensions, params)?,
            dimensions,
            params,
            keys: HashMap::new(),
            slots: Vec::new(),
        })
    }

    /// Live vector count (retired slots excluded)
    pub fn len(&self) -> usize {
        self.inner.size()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.size() == 0
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Whether a memory id currently has a live vector
    pub fn contains(&self, memory_id: &str) -> bool {
        self.keys.contains_key(memory_id)
    }

    /// Insert a memory's embedding, replacing any previous vector for
    /// the same id. The old slot is retired and the vector re-enters
    /// under a fresh key.
    pub fn insert(&mut self, memory_id: &str, vector: &[f32]) -> Result<()> {
        self.check_dimensions(vector.len())?;
        if let Some(retired) = self.keys.remove(memory_id) {
            self.retire(retired)?;
        }

        self.ensure_room(1)?;
        let key = self.slots.len() as u64;
        self.inner
            .add(key, vector)
            .map_err(|e| EngramError::Storage(format!("index insert failed: {e}")))?;
        self.slots.push(Some(memory_id.to_string()));
        self.keys.insert(memory_id.to_string(), key);
        Ok(())
    }

    /// Drop a memory's vector; returns whether one was present
    pub fn remove(&mut self, memory_id: &str) -> Result<bool> {
        match self.keys.remove(memory_id) {
            Some(key) => {
                self.retire(key)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Drop every vector while keeping the index definition
    pub fn clear(&mut self) -> Result<()> {
        self.inner = build_inner(self.dimensions, self.params)?;
        self.keys.clear();
        self.slots.clear();
        Ok(())
    }

    /// Nearest neighbours by cosine similarity, best first.
    ///
    /// Returns `(memory_id, similarity)` pairs; hits whose slot was
    /// retired between search and lookup are dropped.
    pub fn query(&self, vector: &[f32], limit: usize) -> Result<Vec<(String, f32)>> {
        self.check_dimensions(vector.len())?;
        if limit == 0 || self.is_empty() {
            return Ok(Vec::new());
        }

        let matches = self
            .inner
            .search(vector, limit)
            .map_err(|e| EngramError::Storage(format!("index query failed: {e}")))?;

        let mut hits = Vec::with_capacity(matches.keys.len());
        for (key, distance) in matches.keys.iter().zip(matches.distances.iter()) {
            let Some(Some(memory_id)) = self.slots.get(*key as usize) else {
                continue;
            };
            hits.push((memory_id.clone(), similarity_from_distance(*distance)));
        }
        Ok(hits)
    }

    pub fn stats(&self) -> VectorIndexStats {
        VectorIndexStats {
            total_vectors: self.len(),
            dimensions: self.dimensions,
            connectivity: self.params.connectivity,
            memory_bytes: self.inner.serialized_length(),
        }
    }

    fn check_dimensions(&self, got: usize) -> Result<()> {
        if got != self.dimensions {
            return Err(EngramError::InvalidRequest(format!(
                "vector has {got} dimensions, index expects {}",
                self.dimensions
            )));
        }
        Ok(())
    }

    /// Reserve in whole chunks so inserts stay amortised and never run
    /// past usearch's hard capacity
    fn ensure_room(&self, extra: usize) -> Result<()> {
        let needed = self.inner.size() + extra;
        if needed <= self.inner.capacity() {
            return Ok(());
        }
        let rounded = needed.div_ceil(RESERVE_CHUNK) * RESERVE_CHUNK;
        self.inner
            .reserve(rounded)
            .map_err(|e| EngramError::Storage(format!("index reserve failed: {e}")))
    }

    fn retire(&mut self, key: u64) -> Result<()> {
        self.inner
            .remove(key)
            .map_err(|e| EngramError::Storage(format!("index remove failed: {e}")))?;
        if let Some(slot) = self.slots.get_mut(key as usize) {
            *slot = None;
        }
        Ok(())
    }
}

fn build_inner(dimensions: usize, params: HnswParams) -> Result<Index> {
    let options = IndexOptions {
        dimensions,
        metric: MetricKind::Cos,
        quantization: ScalarKind::F32,
        connectivity: params.connectivity,
        expansion_add: params.expansion_add,
        expansion_search: params.expansion_search,
        multi: false,
    };
    Index::new(&options).map_err(|e| EngramError::Storage(format!("index creation failed: {e}")))
}

/// usearch reports cosine distance; callers work in similarity
fn similarity_from_distance(distance: f32) -> f32 {
    1.0 - distance
}

// ============================================================================
// TESTS
// ============================================================================
