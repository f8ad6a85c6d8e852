//! Database Migrations
//!
//! Schema migration definitions for the record store.

/// Migration definitions
pub const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    description: "Initial schema: memories, witness access, situations, annotations, causality",
    up: MIGRATION_V1_UP,
}];

/// A database migration
#[derive(Debug, Clone)]
pub struct Migration {
    /// Version number
    pub version: u32,
    /// Description
    pub description: &'static str,
    /// SQL to apply
    pub up: &'static str,
}

/// V1: Initial schema
const MIGRATION_V1_UP: &str = r#"
CREATE TABLE IF NOT EXISTS memories (
    id TEXT PRIMARY KEY,
    content_text TEXT NOT NULL,
    content_summary TEXT,
    speakers TEXT,                     -- JSON object entity_id -> utterance
    media TEXT NOT NULL DEFAULT '[]',  -- JSON array of media references

    -- Retrieval metadata
    timestamp TEXT NOT NULL,
    memory_type TEXT NOT NULL,
    agent_id TEXT,
    domain TEXT,
    confidence REAL,
    importance REAL,
    topic_tags TEXT NOT NULL DEFAULT '[]',
    interaction_quality REAL,
    duration_minutes REAL,
    tags TEXT NOT NULL DEFAULT '[]',

    -- Witness access
    witnessed_by TEXT NOT NULL,        -- JSON array, original spellings
    witnessed_norm TEXT NOT NULL,      -- comma-joined normalised ids

    -- Situation grouping
    situation_id TEXT NOT NULL,
    situation_type TEXT NOT NULL,
    privacy_level TEXT NOT NULL DEFAULT 'participants_only',

    -- Causality (denormalised copy; edges table drives queries)
    causality TEXT,

    -- Retention
    ttl_seconds INTEGER,
    decay_function TEXT NOT NULL DEFAULT 'none',

    -- Bookkeeping
    created_at TEXT NOT NULL,
    access_count INTEGER NOT NULL DEFAULT 0,
    last_accessed_at TEXT,

    -- Embedding (little-endian float32 blob)
    embedding BLOB NOT NULL,
    dimensions INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_memories_situation ON memories(situation_id);
CREATE INDEX IF NOT EXISTS idx_memories_created ON memories(created_at);
CREATE INDEX IF NOT EXISTS idx_memories_type ON memories(memory_type);
CREATE INDEX IF NOT EXISTS idx_memories_ttl ON memories(ttl_seconds);

-- Per-entity access set: one row per (witness, memory)
CREATE TABLE IF NOT EXISTS entity_access (
    entity_norm TEXT NOT NULL,
    memory_id TEXT NOT NULL REFERENCES memories(id) ON DELETE CASCADE,
    PRIMARY KEY (entity_norm, memory_id)
);
CREATE INDEX IF NOT EXISTS idx_entity_access_memory ON entity_access(memory_id);

CREATE TABLE IF NOT EXISTS situations (
    situation_id TEXT PRIMARY KEY,
    situation_type TEXT NOT NULL,
    participants TEXT NOT NULL DEFAULT '[]',  -- JSON array, original spellings
    created_at TEXT NOT NULL,
    last_activity TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'active'
);

-- Append-only annotations; never mutate the parent memory
CREATE TABLE IF NOT EXISTS annotations (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    memory_id TEXT NOT NULL REFERENCES memories(id) ON DELETE CASCADE,
    annotator_id TEXT NOT NULL,
    timestamp TEXT NOT NULL,
    annotation_type TEXT NOT NULL,
    content TEXT NOT NULL,
    vector BLOB,
    evidence_links TEXT NOT NULL DEFAULT '[]',
    tags TEXT NOT NULL DEFAULT '[]',
    confidence REAL
);
CREATE INDEX IF NOT EXISTS idx_annotations_memory ON annotations(memory_id);

-- Causality edges: child -> parent, weak references (no FK on parent so
-- incoming edges survive parent deletion)
CREATE TABLE IF NOT EXISTS causality_edges (
    child_id TEXT NOT NULL,
    parent_id TEXT NOT NULL,
    influence REAL NOT NULL DEFAULT 0.0,
    PRIMARY KEY (child_id, parent_id)
);
CREATE INDEX IF NOT EXISTS idx_causality_parent ON causality_edges(parent_id);

-- Cleanup job journal
CREATE TABLE IF NOT EXISTS cleanup_history (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    job TEXT NOT NULL,
    ran_at TEXT NOT NULL,
    deleted INTEGER NOT NULL DEFAULT 0,
    merged INTEGER NOT NULL DEFAULT 0,
    demoted INTEGER NOT NULL DEFAULT 0
);

-- Curation decision journal (per-entity stats)
CREATE TABLE IF NOT EXISTS curation_log (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    entity_id TEXT NOT NULL,
    storage_type TEXT NOT NULL,
    stored INTEGER NOT NULL,
    memory_id TEXT,
    rationale TEXT,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_curation_entity ON curation_log(entity_id);

-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL
);

INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (1, datetime('now'));
"#;

/// Get the current schema version
fn get_current_version(conn: &rusqlite::Connection) -> rusqlite::Result<u32> {
    let table_exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
        [],
        |row| row.get(0),
    )?;
    if !table_exists {
        return Ok(0);
    }
    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )
}

/// Apply all pending migrations, returning the number applied
pub fn apply_migrations(conn: &rusqlite::Connection) -> rusqlite::Result<u32> {
    let current_version = get_current_version(conn)?;
    let mut applied = 0;

    for migration in MIGRATIONS {
        if migration.version > current_version {
            tracing::info!(
                "Applying migration v{}: {}",
                migration.version,
                migration.description
            );
            conn.execute_batch(migration.up)?;
            conn.execute(
                "INSERT OR REPLACE INTO schema_version (version, applied_at) VALUES (?1, datetime('now'))",
                [migration.version],
            )?;
            applied += 1;
        }
    }

    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_apply_cleanly() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        let applied = apply_migrations(&conn).unwrap();
        assert_eq!(applied as usize, MIGRATIONS.len());

        // Idempotent on re-run
        let applied_again = apply_migrations(&conn).unwrap();
        assert_eq!(applied_again, 0);
    }
}
