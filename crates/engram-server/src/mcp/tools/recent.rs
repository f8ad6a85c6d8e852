//! list_recent_memories Tool

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};

use engram_core::time::to_rfc3339_z;

use crate::state::AppState;

/// Input schema for list_recent_memories
pub fn schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "limit": {
                "type": "integer",
                "description": "Maximum memories to list (default 10)"
            },
            "entity_id": {
                "type": "string",
                "description": "Only memories witnessed by this entity (defaults to the calling agent)"
            }
        }
    })
}

#[derive(Debug, Deserialize, Default)]
struct RecentArgs {
    limit: Option<usize>,
    entity_id: Option<String>,
}

/// Execute list_recent_memories
pub async fn execute(state: &Arc<AppState>, args: Option<Value>) -> Result<String, String> {
    let args: RecentArgs = match args {
        Some(v) => serde_json::from_value(v).map_err(|e| format!("Invalid arguments: {e}"))?,
        None => RecentArgs::default(),
    };

    let entity = args
        .entity_id
        .filter(|e| !e.trim().is_empty())
        .unwrap_or_else(|| super::DEFAULT_ENTITY.to_string());
    let limit = args.limit.unwrap_or(10);

    let engine = Arc::clone(&state.engine);
    let entity_for_query = entity.clone();
    let records = state
        .run_blocking("mcp_recent", move || {
            engine.list_recent(limit, Some(&entity_for_query))
        })
        .await
        .map_err(|e| e.to_string())?;

    if records.is_empty() {
        return Ok(format!("No memories witnessed by {entity} yet."));
    }

    let mut text = format!("{} most recent memories for {entity}:\n", records.len());
    for (i, record) in records.iter().enumerate() {
        text.push_str(&format!(
            "{}. [{}] {} — {} ({})\n",
            i + 1,
            record.metadata.memory_type,
            record.content.preview(),
            record.memory_id,
            to_rfc3339_z(record.created_at),
        ));
    }
    Ok(text)
}
