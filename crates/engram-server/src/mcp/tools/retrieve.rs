//! retrieve_memories Tool
//!
//! Embeds the query text and searches the calling entity's witnessed
//! memories.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};

use engram_core::{
    OrderBy, ResonanceVector, RetrievalParams, RetrieveMultiRequest, RetrieveRequest,
};

use crate::state::AppState;

/// Input schema for retrieve_memories
pub fn schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "query": {
                "type": "string",
                "description": "What to search for"
            },
            "top_k": {
                "type": "integer",
                "description": "Maximum results (default 5)"
            },
            "similarity_threshold": {
                "type": "number",
                "description": "Minimum cosine similarity, 0-1 (default 0.2)"
            },
            "entity_id": {
                "type": "string",
                "description": "Entity whose witnessed memories to search (defaults to the calling agent)"
            }
        },
        "required": ["query"]
    })
}

#[derive(Debug, Deserialize)]
struct RetrieveArgs {
    query: String,
    top_k: Option<usize>,
    similarity_threshold: Option<f32>,
    entity_id: Option<String>,
}

/// Execute retrieve_memories
pub async fn execute(state: &Arc<AppState>, args: Option<Value>) -> Result<String, String> {
    let args: RetrieveArgs = match args {
        Some(v) => serde_json::from_value(v).map_err(|e| format!("Invalid arguments: {e}"))?,
        None => return Err("Missing arguments".to_string()),
    };

    let entity = args
        .entity_id
        .filter(|e| !e.trim().is_empty())
        .unwrap_or_else(|| super::DEFAULT_ENTITY.to_string());

    let vector = state
        .with_deadline("embed", state.embedder.embed(&args.query))
        .await
        .map_err(|e| e.to_string())?;

    let request = RetrieveMultiRequest {
        requesting_entity: entity.clone(),
        request: RetrieveRequest {
            resonance_vectors: vec![ResonanceVector {
                vector,
                weight: 1.0,
                label: Some("query".into()),
            }],
            tags: None,
            filters: None,
            retrieval: RetrievalParams {
                top_k: args.top_k.unwrap_or(5),
                similarity_threshold: args.similarity_threshold.unwrap_or(0.2),
                diversity_lambda: None,
                boost_recent: false,
            },
            ordering: OrderBy::Similarity,
        },
        entity_filters: None,
    };

    let engine = Arc::clone(&state.engine);
    let result = state
        .run_blocking("mcp_retrieve", move || engine.retrieve_multi(request))
        .await
        .map_err(|e| e.to_string())?;

    if result.base.memories.is_empty() {
        return Ok(format!(
            "No memories found for \"{}\" (searched {}'s witnessed memories only).",
            args.query, entity
        ));
    }

    let mut text = format!(
        "Found {} memories for \"{}\" ({}ms):\n",
        result.base.memories.len(),
        args.query,
        result.base.search_time_ms
    );
    for (i, memory) in result.base.memories.iter().enumerate() {
        text.push_str(&format!(
            "{}. [similarity {:.2}] {} — {}\n",
            i + 1,
            memory.similarity_score,
            memory.content_preview,
            memory.memory_id
        ));
    }
    Ok(text)
}
