//! Witness Access Predicate
//!
//! The single rule deciding whether an entity may see a memory. There is
//! no administrative override: an ops actor who needs to inspect a record
//! must read it out of band against the record key.

use crate::memory::{witness_contains, MemoryRecord, PrivacyLevel};

/// `allow(memory, entity)` — true when the entity witnessed the memory
/// (normalised-id comparison) or the memory is public.
pub fn allow(record: &MemoryRecord, requesting_entity: &str) -> bool {
    record.privacy_level == PrivacyLevel::Public
        || witness_contains(&record.witnessed_by, requesting_entity)
}
