//! store_memory Tool
//!
//! Embeds the supplied content and stores it as a single-agent memory.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};

use engram_core::{MemoryContent, MetadataInput, StoreSingleRequest};

use crate::sanitize;
use crate::state::AppState;

/// Input schema for store_memory
pub fn schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "content": {
                "type": "string",
                "description": "The text to remember"
            },
            "memory_type": {
                "type": "string",
                "enum": ["fact", "preference", "event", "solution", "insight", "decision", "pattern", "conversation"],
                "description": "Kind of memory (defaults to 'fact')"
            },
            "agent_id": {
                "type": "string",
                "description": "Entity the memory belongs to (defaults to the calling agent)"
            },
            "tags": {
                "type": "array",
                "items": {"type": "string"},
                "description": "Tags for later filtering"
            }
        },
        "required": ["content"]
    })
}

#[derive(Debug, Deserialize)]
struct StoreArgs {
    content: String,
    memory_type: Option<String>,
    agent_id: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
}

/// Execute store_memory
pub async fn execute(state: &Arc<AppState>, args: Option<Value>) -> Result<String, String> {
    let args: StoreArgs = match args {
        Some(v) => serde_json::from_value(v).map_err(|e| format!("Invalid arguments: {e}"))?,
        None => return Err("Missing arguments".to_string()),
    };

    sanitize::check_text("content", &args.content, state.config.max_body_bytes)
        .map_err(|e| e.to_string())?;

    let vector = state
        .with_deadline("embed", state.embedder.embed(&args.content))
        .await
        .map_err(|e| e.to_string())?;

    let agent_id = args
        .agent_id
        .filter(|a| !a.trim().is_empty())
        .unwrap_or_else(|| super::DEFAULT_ENTITY.to_string());
    let memory_type = args.memory_type.unwrap_or_else(|| "fact".to_string());

    let request = StoreSingleRequest {
        content: MemoryContent::from_text(args.content),
        primary_vector: vector,
        metadata: MetadataInput {
            timestamp: engram_core::time::to_rfc3339_z(chrono::Utc::now()),
            memory_type: memory_type.clone(),
            agent_id: Some(agent_id.clone()),
            domain: None,
            confidence: None,
            importance: None,
            topic_tags: vec![],
            interaction_quality: None,
            situation_duration_minutes: None,
        },
        tags: args.tags,
        causality: None,
        retention: None,
        situation_type: None,
    };

    let engine = Arc::clone(&state.engine);
    let stored = state
        .run_blocking("mcp_store", move || engine.store_single(request))
        .await
        .map_err(|e| e.to_string())?;

    Ok(format!(
        "✅ Memory stored: {}\nType: {memory_type} | Agent: {agent_id}\nSituation: {}",
        stored.memory_id, stored.situation_id
    ))
}
