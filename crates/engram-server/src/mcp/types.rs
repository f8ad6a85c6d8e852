//! JSON-RPC 2.0 framing for the MCP endpoint
//!
//! Only what the wire format mandates lives here: the request/response
//! envelopes and the standard error codes. Method semantics belong to
//! the dispatcher.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// MCP protocol version this server speaks
pub const MCP_VERSION: &str = "2025-03-26";

/// JSON-RPC version tag on every envelope
pub const JSONRPC_VERSION: &str = "2.0";

/// Standard JSON-RPC 2.0 error codes
pub mod code {
    pub const PARSE_ERROR: i32 = -32700;
    pub const INVALID_REQUEST: i32 = -32600;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const INTERNAL_ERROR: i32 = -32603;
}

/// An incoming request. A missing `id` marks a notification, which by
/// the spec gets no response at all.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    #[serde(default)]
    pub id: Option<Value>,
}

impl JsonRpcRequest {
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

/// Error payload inside a failed response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// The body was not parseable JSON-RPC
    pub fn parse() -> Self {
        Self::new(code::PARSE_ERROR, "Parse error")
    }

    /// The method is not one this endpoint serves
    pub fn unknown_method(method: &str) -> Self {
        Self::new(code::METHOD_NOT_FOUND, format!("Unknown method: {method}"))
    }

    /// Params failed to deserialize or were missing
    pub fn bad_params(detail: impl Into<String>) -> Self {
        Self::new(code::INVALID_PARAMS, detail)
    }

    /// Serialization or other server-side failure
    pub fn internal(detail: impl Into<String>) -> Self {
        Self::new(code::INTERNAL_ERROR, detail)
    }
}

/// An outgoing response; exactly one of `result`/`error` is present
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// Wrap a handler outcome into the response envelope
    pub fn reply(id: Option<Value>, outcome: Result<Value, JsonRpcError>) -> Self {
        let (result, error) = match outcome {
            Ok(value) => (Some(value), None),
            Err(e) => (None, Some(e)),
        };
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result,
            error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_notification_has_no_id() {
        let with_id: JsonRpcRequest =
            serde_json::from_value(json!({"jsonrpc": "2.0", "id": 3, "method": "ping"})).unwrap();
        assert!(!with_id.is_notification());

        let bare: JsonRpcRequest = serde_json::from_value(
            json!({"jsonrpc": "2.0", "method": "notifications/initialized"}),
        )
        .unwrap();
        assert!(bare.is_notification());
    }

    #[test]
    fn test_reply_carries_exactly_one_arm() {
        let ok = JsonRpcResponse::reply(Some(json!(1)), Ok(json!({"tools": []})));
        let wire = serde_json::to_value(&ok).unwrap();
        assert!(wire.get("result").is_some());
        assert!(wire.get("error").is_none(), "success omits the error key entirely");

        let failed = JsonRpcResponse::reply(Some(json!(2)), Err(JsonRpcError::parse()));
        let wire = serde_json::to_value(&failed).unwrap();
        assert!(wire.get("result").is_none());
        assert_eq!(wire["error"]["code"], code::PARSE_ERROR);
    }

    #[test]
    fn test_unknown_method_names_the_method() {
        let e = JsonRpcError::unknown_method("resources/list");
        assert_eq!(e.code, code::METHOD_NOT_FOUND);
        assert!(e.message.contains("resources/list"));
    }
}
