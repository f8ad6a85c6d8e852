//! MCP Server Core
//!
//! Routes JSON-RPC requests to the tool handlers. The HTTP transport is
//! stateless: every request carries everything needed, and `initialize`
//! performs version negotiation without per-session state.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::state::AppState;

use super::messages::{
    CallToolRequest, CallToolResult, InitializeRequest, InitializeResult, ListToolsResult,
    ServerCapabilities, ServerInfo, ToolDescription,
};
use super::tools;
use super::types::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, MCP_VERSION};

/// MCP server over the shared application state
pub struct McpServer {
    state: Arc<AppState>,
}

impl McpServer {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    /// Handle an incoming JSON-RPC request; `None` means notification
    /// (no response body)
    pub async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        debug!("Handling MCP request: {}", request.method);

        let outcome = match request.method.as_str() {
            "initialize" => self.handle_initialize(request.params),
            "notifications/initialized" => return None,
            "tools/list" => self.handle_tools_list(),
            "tools/call" => self.handle_tools_call(request.params).await,
            "ping" => Ok(serde_json::json!({})),
            method => {
                warn!("Unknown MCP method: {method}");
                Err(JsonRpcError::unknown_method(method))
            }
        };

        Some(JsonRpcResponse::reply(request.id, outcome))
    }

    fn handle_initialize(
        &self,
        params: Option<serde_json::Value>,
    ) -> Result<serde_json::Value, JsonRpcError> {
        let request: InitializeRequest = match params {
            Some(p) => serde_json::from_value(p)
                .map_err(|e| JsonRpcError::bad_params(e.to_string()))?,
            None => InitializeRequest::default(),
        };

        // Use the client's version when it is older than ours; clients
        // reject servers that answer with a newer protocol version.
        let negotiated = if request.protocol_version.as_str() < MCP_VERSION {
            request.protocol_version.clone()
        } else {
            MCP_VERSION.to_string()
        };

        let result = InitializeResult {
            protocol_version: negotiated,
            capabilities: ServerCapabilities {
                tools: Some(HashMap::from([(
                    "listChanged".to_string(),
                    serde_json::json!(false),
                )])),
            },
            server_info: ServerInfo {
                name: "engram".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            instructions: Some(
                "Engram is a witness-scoped memory service. Use 'memory' for natural-language \
                 requests, or the structured tools (store_memory, retrieve_memories, get_memory, \
                 list_recent_memories, get_memory_stats) for precise control. Only entities that \
                 witnessed a memory can retrieve it."
                    .to_string(),
            ),
        };
        serde_json::to_value(result).map_err(|e| JsonRpcError::internal(e.to_string()))
    }

    fn handle_tools_list(&self) -> Result<serde_json::Value, JsonRpcError> {
        let tools = vec![
            ToolDescription {
                name: "store_memory".to_string(),
                description: Some(
                    "Store a memory. Embeds the content and persists it under the calling \
                     agent's witness scope."
                        .to_string(),
                ),
                input_schema: tools::store::schema(),
            },
            ToolDescription {
                name: "retrieve_memories".to_string(),
                description: Some(
                    "Semantic search over the calling agent's witnessed memories. Returns the \
                     best matches with similarity scores."
                        .to_string(),
                ),
                input_schema: tools::retrieve::schema(),
            },
            ToolDescription {
                name: "get_memory".to_string(),
                description: Some(
                    "Fetch one memory by id. The caller must be a witness.".to_string(),
                ),
                input_schema: tools::get::schema(),
            },
            ToolDescription {
                name: "list_recent_memories".to_string(),
                description: Some(
                    "List the most recently stored memories for an entity.".to_string(),
                ),
                input_schema: tools::recent::schema(),
            },
            ToolDescription {
                name: "get_memory_stats".to_string(),
                description: Some(
                    "Engine statistics: record counts, type breakdown, index size.".to_string(),
                ),
                input_schema: tools::stats::schema(),
            },
            ToolDescription {
                name: "memory".to_string(),
                description: Some(
                    "Unified natural-language memory tool. Phrases like 'remember/save/note \
                     that ...' store; 'what do/recall/find/search ...' retrieve; anything \
                     ambiguous gets a clarification reply."
                        .to_string(),
                ),
                input_schema: tools::memory::schema(),
            },
        ];
        serde_json::to_value(ListToolsResult { tools })
            .map_err(|e| JsonRpcError::internal(e.to_string()))
    }

    async fn handle_tools_call(
        &self,
        params: Option<serde_json::Value>,
    ) -> Result<serde_json::Value, JsonRpcError> {
        let request: CallToolRequest = match params {
            Some(p) => serde_json::from_value(p)
                .map_err(|e| JsonRpcError::bad_params(e.to_string()))?,
            None => return Err(JsonRpcError::bad_params("Missing tool call parameters")),
        };

        let outcome = match request.name.as_str() {
            "store_memory" => tools::store::execute(&self.state, request.arguments).await,
            "retrieve_memories" => tools::retrieve::execute(&self.state, request.arguments).await,
            "get_memory" => tools::get::execute(&self.state, request.arguments).await,
            "list_recent_memories" => tools::recent::execute(&self.state, request.arguments).await,
            "get_memory_stats" => tools::stats::execute(&self.state, request.arguments).await,
            "memory" => tools::memory::execute(&self.state, request.arguments).await,
            other => Err(format!("Unknown tool: {other}")),
        };

        let result = match outcome {
            Ok(text) => CallToolResult::ok(text),
            Err(message) => CallToolResult::error(message),
        };
        serde_json::to_value(result).map_err(|e| JsonRpcError::internal(e.to_string()))
    }
}
