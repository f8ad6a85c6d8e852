//! Situations - derived groupings of memories
//!
//! A situation is created implicitly by the first memory that names its
//! `situation_id` and garbage-collected when its last memory is deleted.
//! Participants are the union of `witnessed_by` over member memories.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a situation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SituationStatus {
    #[default]
    Active,
    Archived,
    Private,
}

impl SituationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SituationStatus::Active => "active",
            SituationStatus::Archived => "archived",
            SituationStatus::Private => "private",
        }
    }

    /// Parse a stored status, defaulting unknown values to `active`
    pub fn parse_name(s: &str) -> Self {
        match s {
            "archived" => SituationStatus::Archived,
            "private" => SituationStatus::Private,
            _ => SituationStatus::Active,
        }
    }
}

/// A derived situation entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Situation {
    pub situation_id: String,
    pub situation_type: String,
    /// Union of member witness sets, original spellings
    pub participants: Vec<String>,
    /// Member memory ids, creation order
    pub memory_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub status: SituationStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parse_is_lenient() {
        assert_eq!(SituationStatus::parse_name("archived"), SituationStatus::Archived);
        assert_eq!(SituationStatus::parse_name("???"), SituationStatus::Active);
    }
}
