//! get_memory Tool

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};

use engram_core::time::to_rfc3339_z;

use crate::state::AppState;

/// Input schema for get_memory
pub fn schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "memory_id": {
                "type": "string",
                "description": "The memory id, e.g. mem-1a2b3c4d5e6f"
            },
            "entity_id": {
                "type": "string",
                "description": "Requesting entity; must be a witness (defaults to the calling agent)"
            }
        },
        "required": ["memory_id"]
    })
}

#[derive(Debug, Deserialize)]
struct GetArgs {
    memory_id: String,
    entity_id: Option<String>,
}

/// Execute get_memory
pub async fn execute(state: &Arc<AppState>, args: Option<Value>) -> Result<String, String> {
    let args: GetArgs = match args {
        Some(v) => serde_json::from_value(v).map_err(|e| format!("Invalid arguments: {e}"))?,
        None => return Err("Missing arguments".to_string()),
    };

    let entity = args
        .entity_id
        .filter(|e| !e.trim().is_empty())
        .unwrap_or_else(|| super::DEFAULT_ENTITY.to_string());

    let engine = Arc::clone(&state.engine);
    let memory_id = args.memory_id.clone();
    let record = state
        .run_blocking("mcp_get", move || engine.get(&memory_id, Some(&entity)))
        .await
        .map_err(|e| e.to_string())?;

    let annotation_count = state
        .engine
        .store()
        .annotation_count(&record.memory_id)
        .unwrap_or(0);

    Ok(format!(
        "Memory {}\n\
         Content: {}\n\
         Type: {} | Situation: {} ({})\n\
         Witnessed by: {}\n\
         Tags: {}\n\
         Created: {} | Accessed {} times | Annotations: {}",
        record.memory_id,
        record.content.text,
        record.metadata.memory_type,
        record.situation_id,
        record.situation_type,
        record.witnessed_by.join(", "),
        if record.tags.is_empty() {
            "-".to_string()
        } else {
            record.tags.join(", ")
        },
        to_rfc3339_z(record.created_at),
        record.access_count,
        annotation_count,
    ))
}
