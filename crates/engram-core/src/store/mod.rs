//! Storage Module
//!
//! SQLite-backed record store with an in-process HNSW index:
//! - One transaction per `put` (record + witness rows + situation)
//! - Witness-scoped secondary access table
//! - Append-only annotations
//! - Causality edges kept as weak references

mod migrations;
mod sqlite;

pub use migrations::{apply_migrations, MIGRATIONS};
pub use sqlite::{CurationStats, MemoryStore, ScoredMemory, StoreStats};
