//! Annotations - append-only notes attached to a memory
//!
//! Annotations never mutate their parent record; they accumulate in
//! insertion order and are listed alongside the memory on request.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{EngramError, Result};

/// An append-only note attached to a memory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Annotation {
    /// Entity adding the note; must be a witness of the parent memory
    pub annotator_id: String,
    pub timestamp: DateTime<Utc>,
    /// Free-form annotation type, e.g. `correction`, `elaboration`
    #[serde(rename = "type")]
    pub annotation_type: String,
    pub content: String,
    /// Optional embedding of the annotation content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vector: Option<Vec<f32>>,
    /// Memory ids or URLs supporting the note
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub evidence_links: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
}

impl Annotation {
    /// Structural validation before append
    pub fn validate(&self) -> Result<()> {
        if self.annotator_id.trim().is_empty() {
            return Err(EngramError::InvalidRequest(
                "annotator_id must be non-empty".into(),
            ));
        }
        if self.content.trim().is_empty() {
            return Err(EngramError::InvalidRequest(
                "annotation content must be non-empty".into(),
            ));
        }
        if let Some(c) = self.confidence {
            if !(0.0..=1.0).contains(&c) {
                return Err(EngramError::InvalidRequest(format!(
                    "annotation confidence out of [0,1]: {c}"
                )));
            }
        }
        Ok(())
    }
}
