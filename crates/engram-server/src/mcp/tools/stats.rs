//! get_memory_stats Tool

use std::sync::Arc;

use serde_json::{json, Value};

use crate::state::AppState;

/// Input schema for get_memory_stats
pub fn schema() -> Value {
    json!({
        "type": "object",
        "properties": {}
    })
}

/// Execute get_memory_stats
pub async fn execute(state: &Arc<AppState>, _args: Option<Value>) -> Result<String, String> {
    let engine = Arc::clone(&state.engine);
    let stats = state
        .run_blocking("mcp_stats", move || engine.stats())
        .await
        .map_err(|e| e.to_string())?;

    let mut text = format!(
        "Engram memory statistics\n\
         Memories: {} | Situations: {} | Annotations: {}\n\
         Index: {} vectors × {} dimensions (~{} KiB)\n",
        stats.total_memories,
        stats.total_situations,
        stats.total_annotations,
        stats.index.total_vectors,
        stats.index.dimensions,
        stats.index.memory_bytes / 1024,
    );
    if !stats.by_memory_type.is_empty() {
        text.push_str("By type:\n");
        for (memory_type, count) in &stats.by_memory_type {
            text.push_str(&format!("  {memory_type}: {count}\n"));
        }
    }
    Ok(text)
}
