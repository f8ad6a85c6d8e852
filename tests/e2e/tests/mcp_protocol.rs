//! MCP JSON-RPC surface: initialize, tools/list, and the unified
//! `memory` tool's natural-language dispatch.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};

use engram_e2e_tests::harness::{body_json, TestApp, API_KEY};

fn rpc(id: u64, method: &str, params: Value) -> Request<Body> {
    let body = json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": method,
        "params": params,
    });
    Request::builder()
        .method("POST")
        .uri("/mcp/")
        .header("x-api-key", API_KEY)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap()
}

fn tool_call(id: u64, name: &str, arguments: Value) -> Request<Body> {
    rpc(id, "tools/call", json!({"name": name, "arguments": arguments}))
}

/// Extract the text block from a tools/call response
fn tool_text(response: &Value) -> String {
    response["result"]["content"][0]["text"]
        .as_str()
        .expect("tool result has a text block")
        .to_string()
}

#[tokio::test]
async fn initialize_negotiates_protocol_version() {
    let app = TestApp::new();
    let response = body_json(
        app.send(rpc(
            1,
            "initialize",
            json!({"protocolVersion": "2024-11-05", "capabilities": {}, "clientInfo": {}}),
        ))
        .await,
    )
    .await;

    // Older client version wins the negotiation
    assert_eq!(response["result"]["protocolVersion"], "2024-11-05");
    assert_eq!(response["result"]["serverInfo"]["name"], "engram");
    assert!(response["result"]["capabilities"]["tools"].is_object());
}

#[tokio::test]
async fn tools_list_exposes_six_tools() {
    let app = TestApp::new();
    let response = body_json(app.send(rpc(2, "tools/list", json!({}))).await).await;

    let tools = response["result"]["tools"].as_array().unwrap();
    let names: Vec<&str> = tools.iter().map(|t| t["name"].as_str().unwrap()).collect();
    assert_eq!(
        names,
        vec![
            "store_memory",
            "retrieve_memories",
            "get_memory",
            "list_recent_memories",
            "get_memory_stats",
            "memory",
        ]
    );
    for tool in tools {
        assert!(tool["inputSchema"]["type"] == "object");
    }
}

#[tokio::test]
async fn unified_memory_tool_routes_store_then_retrieve() {
    let app = TestApp::new();

    // "Remember ..." routes to store_memory
    let stored = body_json(
        app.send(tool_call(
            3,
            "memory",
            json!({"request": "Remember that the user likes minimal UI design"}),
        ))
        .await,
    )
    .await;
    let text = tool_text(&stored);
    assert!(text.contains("✅"), "store confirmation, got: {text}");
    let memory_id = text
        .split_whitespace()
        .find(|w| w.starts_with("mem-"))
        .expect("reply names the new memory id")
        .to_string();

    // "What do I know ..." routes to retrieve_memories
    let found = body_json(
        app.send(tool_call(
            4,
            "memory",
            json!({"request": "What do I know about the user's UI preferences?"}),
        ))
        .await,
    )
    .await;
    let text = tool_text(&found);
    assert!(
        text.contains(&memory_id),
        "retrieval should list the stored memory, got: {text}"
    );
    assert!(text.contains("similarity"));
}

#[tokio::test]
async fn ambiguous_memory_request_gets_disambiguation() {
    let app = TestApp::new();
    let response = body_json(
        app.send(tool_call(5, "memory", json!({"request": "the sky is blue"})))
            .await,
    )
    .await;
    let text = tool_text(&response);
    assert!(text.contains("store or retrieve"));
    assert!(text.contains("Nothing was stored"));

    // Verify it really had no side effects
    let stats = body_json(app.send(tool_call(6, "get_memory_stats", json!({}))).await).await;
    assert!(tool_text(&stats).contains("Memories: 0"));
}

#[tokio::test]
async fn structured_tools_roundtrip() {
    let app = TestApp::new();

    let stored = body_json(
        app.send(tool_call(
            7,
            "store_memory",
            json!({"content": "Deploys happen from the main branch", "memory_type": "fact", "tags": ["deploy"]}),
        ))
        .await,
    )
    .await;
    let text = tool_text(&stored);
    let memory_id = text
        .split_whitespace()
        .find(|w| w.starts_with("mem-"))
        .unwrap()
        .to_string();

    let fetched = body_json(
        app.send(tool_call(8, "get_memory", json!({"memory_id": memory_id})))
            .await,
    )
    .await;
    assert!(tool_text(&fetched).contains("Deploys happen from the main branch"));

    let recent = body_json(
        app.send(tool_call(9, "list_recent_memories", json!({})))
            .await,
    )
    .await;
    assert!(tool_text(&recent).contains(&memory_id));

    let stats = body_json(app.send(tool_call(10, "get_memory_stats", json!({}))).await).await;
    let text = tool_text(&stats);
    assert!(text.contains("Memories: 1"));
    assert!(text.contains("fact: 1"));
}

#[tokio::test]
async fn unknown_tool_is_an_error_result() {
    let app = TestApp::new();
    let response = body_json(
        app.send(tool_call(11, "definitely_not_a_tool", json!({})))
            .await,
    )
    .await;
    assert_eq!(response["result"]["isError"], true);
}

#[tokio::test]
async fn unknown_method_and_parse_errors() {
    let app = TestApp::new();

    let response = body_json(app.send(rpc(12, "resources/list", json!({}))).await).await;
    assert_eq!(response["error"]["code"], -32601);

    let garbage = Request::builder()
        .method("POST")
        .uri("/mcp/")
        .header("x-api-key", API_KEY)
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.send(garbage).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], -32700);
}

#[tokio::test]
async fn notification_returns_accepted() {
    let app = TestApp::new();
    let notification = json!({
        "jsonrpc": "2.0",
        "method": "notifications/initialized"
    });
    let request = Request::builder()
        .method("POST")
        .uri("/mcp/")
        .header("x-api-key", API_KEY)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(&notification).unwrap()))
        .unwrap();
    let response = app.send(request).await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
}

#[tokio::test]
async fn mcp_requires_api_key() {
    let app = TestApp::new();
    let request = Request::builder()
        .method("POST")
        .uri("/mcp/")
        .header("content-type", "application/json")
        .body(Body::from(r#"{"jsonrpc":"2.0","id":1,"method":"tools/list"}"#))
        .unwrap();
    assert_eq!(app.send(request).await.status(), StatusCode::UNAUTHORIZED);
}
