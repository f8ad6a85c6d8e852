//! # Engram Core
//!
//! Witness-scoped semantic memory engine for AI agents:
//!
//! - **Record store**: SQLite rows plus an in-process HNSW (usearch)
//!   cosine index, rebuilt from stored embeddings at startup
//! - **Witness access model**: only entities present when a memory was
//!   created may ever read or annotate it; no administrative override
//! - **Retrieval**: resonance-vector combination, tag/numeric filtering,
//!   similarity floor, optional MMR diversity and recency boost
//! - **Curation pipeline**: an AI observer decomposes conversation turns
//!   into scored observations, the admission rule routes them to
//!   storage or rejection, retention policies attach TTLs
//! - **Cleanup scheduler**: TTL expiry, near-duplicate consolidation and
//!   importance decay as recurring background jobs
//!
//! The embedder and curator are pluggable collaborators: production
//! wires them to model APIs over HTTP, tests wire deterministic fakes.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use engram_core::{MemoryEngine, MemoryStore, RetrieveMultiRequest};
//! use std::sync::Arc;
//!
//! let store = Arc::new(MemoryStore::open(None, 768)?);
//! let engine = MemoryEngine::new(store);
//!
//! let stored = engine.store_multi(request)?;
//! let results = engine.retrieve_multi(query)?;
//! ```

// ============================================================================
// MODULES
// ============================================================================

pub mod cleanup;
pub mod config;
pub mod curation;
pub mod curator;
pub mod embedder;
pub mod engine;
pub mod error;
pub mod memory;
pub mod search;
pub mod store;
pub mod time;

// ============================================================================
// PUBLIC API RE-EXPORTS
// ============================================================================

pub use cleanup::{CleanupScheduler, CleanupSummary};
pub use config::{CleanupConfig, EngramConfig};
pub use curation::{
    CurationPipeline, CurationPreferences, CurationReport, CurationRequest, ObservationDecision,
};
pub use curator::{
    fallback_reply, ConversationTurn, Curator, CuratorReply, HttpCurator, Observation,
    RetentionPolicy, StorageType,
};
pub use embedder::{Embedder, HttpEmbedder};
pub use engine::{
    allow, AccessControl, EngineStats, EntityFilters, EntityVerification, MemoryEngine,
    MetadataInput, OrderBy, RetrievalFilters, RetrievalParams, RetrieveMultiRequest,
    RetrieveMultiResponse, RetrieveRequest, RetrieveResponse, RetrievedMemory, StoreMultiRequest,
    StoreResponse, StoreSingleRequest, TagFilters, TimestampRange,
};
pub use error::{EngramError, Result};
pub use memory::{
    normalize_entity_id, normalize_witness_set, validate_vector, witness_contains, Annotation,
    Causality, DecayFunction, MediaRef, MediaType, MemoryContent, MemoryMetadata, MemoryRecord,
    MemoryType, PrivacyLevel, Retention, Situation, SituationStatus,
    SITUATION_LEGACY_SINGLE_AGENT,
};
pub use search::{
    combine_resonance, cosine_similarity, mmr_select, normalize_unit, HnswParams, MmrCandidate,
    ResonanceVector, RetrievalFilter, VectorIndex, VectorIndexStats,
};
pub use store::{CurationStats, MemoryStore, ScoredMemory, StoreStats};

// ============================================================================
// VERSION INFO
// ============================================================================

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default embedding dimension when unconfigured
pub const DEFAULT_DIMENSIONS: usize = 768;

// ============================================================================
// PRELUDE
// ============================================================================

/// Convenient imports for common usage
pub mod prelude {
    pub use crate::{
        Annotation, CurationPipeline, CurationRequest, EngramConfig, EngramError, MemoryContent,
        MemoryEngine, MemoryRecord, MemoryStore, MemoryType, PrivacyLevel, Result,
        RetrieveMultiRequest, RetrieveRequest, StoreMultiRequest, StoreSingleRequest,
    };

    pub use crate::{Curator, Embedder, HttpCurator, HttpEmbedder};
}
