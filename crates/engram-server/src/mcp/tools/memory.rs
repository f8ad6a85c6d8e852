//! Unified Memory Tool
//!
//! One natural-language entry point that routes to store or retrieve by
//! keyword heuristics. Requests matching both vocabularies (or neither)
//! get a disambiguation reply instead of a guess — no side effects on an
//! ambiguous request.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};

use crate::state::AppState;

/// Keywords that signal the caller wants something remembered
const STORE_KEYWORDS: [&str; 5] = ["remember", "save", "store", "note that", "keep in mind"];

/// Keywords that signal the caller wants something recalled
const RETRIEVE_KEYWORDS: [&str; 7] = [
    "what do",
    "recall",
    "find",
    "search",
    "do you know",
    "have we",
    "did we",
];

/// Interpreted intent of a natural-language memory request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryIntent {
    Store,
    Retrieve,
    Ambiguous,
}

/// Classify a request: store keywords and no retrieve keywords routes to
/// store, mirror-symmetrically for retrieve, anything else is ambiguous.
pub fn classify_request(request: &str) -> MemoryIntent {
    let lowered = request.to_lowercase();
    let wants_store = STORE_KEYWORDS.iter().any(|k| lowered.contains(k));
    let wants_retrieve = RETRIEVE_KEYWORDS.iter().any(|k| lowered.contains(k));
    match (wants_store, wants_retrieve) {
        (true, false) => MemoryIntent::Store,
        (false, true) => MemoryIntent::Retrieve,
        _ => MemoryIntent::Ambiguous,
    }
}

/// Input schema for the unified memory tool
pub fn schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "request": {
                "type": "string",
                "description": "Natural-language memory request, e.g. 'Remember that the user likes minimal UI design' or 'What do I know about the user's preferences?'"
            },
            "agent_id": {
                "type": "string",
                "description": "Entity the memory belongs to (optional)"
            }
        },
        "required": ["request"]
    })
}

#[derive(Debug, Deserialize)]
struct MemoryArgs {
    request: String,
    agent_id: Option<String>,
}

/// Execute the unified memory tool
pub async fn execute(state: &Arc<AppState>, args: Option<Value>) -> Result<String, String> {
    let args: MemoryArgs = match args {
        Some(v) => serde_json::from_value(v).map_err(|e| format!("Invalid arguments: {e}"))?,
        None => return Err("Missing arguments".to_string()),
    };

    match classify_request(&args.request) {
        MemoryIntent::Store => {
            super::store::execute(
                state,
                Some(json!({
                    "content": args.request,
                    "agent_id": args.agent_id,
                })),
            )
            .await
        }
        MemoryIntent::Retrieve => {
            super::retrieve::execute(
                state,
                Some(json!({
                    "query": args.request,
                    "entity_id": args.agent_id,
                })),
            )
            .await
        }
        MemoryIntent::Ambiguous => Ok(format!(
            "I can't tell whether you want me to store or retrieve a memory.\n\
             Request: \"{}\"\n\
             To store, phrase it like: \"Remember that ...\" / \"Note that ...\"\n\
             To retrieve, phrase it like: \"What do I know about ...\" / \"Recall ...\"\n\
             Nothing was stored or searched.",
            args.request
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_intent() {
        assert_eq!(
            classify_request("Remember that the user likes minimal UI design"),
            MemoryIntent::Store
        );
        assert_eq!(
            classify_request("Please note that deploys happen on Fridays"),
            MemoryIntent::Store
        );
    }

    #[test]
    fn test_retrieve_intent() {
        assert_eq!(
            classify_request("What do I know about the user's UI preferences?"),
            MemoryIntent::Retrieve
        );
        assert_eq!(classify_request("recall the deploy schedule"), MemoryIntent::Retrieve);
        assert_eq!(classify_request("have we discussed caching?"), MemoryIntent::Retrieve);
    }

    #[test]
    fn test_ambiguous_when_both_or_neither() {
        // Both vocabularies present
        assert_eq!(
            classify_request("remember to search for the doc"),
            MemoryIntent::Ambiguous
        );
        // Neither present
        assert_eq!(classify_request("the sky is blue"), MemoryIntent::Ambiguous);
    }
}
