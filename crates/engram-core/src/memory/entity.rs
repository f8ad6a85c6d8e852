//! Entity Identifier Normalisation
//!
//! Tag-style index fields are tokenised on punctuation, which would split
//! an entity id like `human-alice-123` into useless fragments. The store
//! therefore matches on a normalised copy of every entity id (hyphens
//! stripped) while the record body keeps the original string for display.
//!
//! The logical API treats ids as opaque; normalisation is idempotent and
//! only ever applied at the matching boundary.

/// Normalise an entity id for tag matching: strip internal hyphens.
///
/// `human-alice-123` and `humanalice123` refer to the same entity.
pub fn normalize_entity_id(id: &str) -> String {
    id.chars().filter(|c| *c != '-').collect()
}

/// Normalise a witness list into a deduplicated set.
///
/// Returns `(originals, normalized)` of equal length: duplicates under
/// normalisation are dropped, first spelling wins, insertion order kept.
pub fn normalize_witness_set(ids: &[String]) -> (Vec<String>, Vec<String>) {
    let mut originals = Vec::with_capacity(ids.len());
    let mut normalized = Vec::with_capacity(ids.len());
    for id in ids {
        let norm = normalize_entity_id(id);
        if norm.is_empty() || normalized.contains(&norm) {
            continue;
        }
        originals.push(id.clone());
        normalized.push(norm);
    }
    (originals, normalized)
}

/// Membership test against a witness list, comparing normalised forms.
pub fn witness_contains(witnessed_by: &[String], entity_id: &str) -> bool {
    let needle = normalize_entity_id(entity_id);
    witnessed_by
        .iter()
        .any(|w| normalize_entity_id(w) == needle)
}
