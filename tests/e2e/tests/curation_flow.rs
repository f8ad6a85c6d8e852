//! Curation pipeline over HTTP: the ephemerality filter, analyse-only
//! mode, force storage, the degraded curator path and per-entity stats.

use axum::http::StatusCode;
use serde_json::json;

use engram_e2e_tests::harness::{body_json, request, TestApp};
use engram_e2e_tests::mocks::ScriptedCurator;

fn turn_body() -> serde_json::Value {
    json!({
        "user_input": "My name is Christian and I live in Liversedge. It's raining.",
        "agent_response": "Nice to meet you, Christian.",
        "entity_id": "agent-main"
    })
}

#[tokio::test]
async fn curated_store_keeps_fact_drops_weather() {
    let app = TestApp::new();

    let report = body_json(
        app.send(request("POST", "/cam/curated/store", Some(&turn_body())))
            .await,
    )
    .await;

    let decisions = report["decisions"].as_array().unwrap();
    assert_eq!(decisions.len(), 2, "both decisions are reported");

    let fact = &decisions[0];
    assert_eq!(fact["admitted"], true);
    assert!(fact["observation"]["content"]
        .as_str()
        .unwrap()
        .contains("Liversedge"));
    assert!(fact["observation"]["ephemerality_score"].as_f64().unwrap() <= 0.2);
    assert_eq!(fact["retention_policy"], "permanent");

    let weather = &decisions[1];
    assert_eq!(weather["admitted"], false);
    assert!(weather["observation"]["content"].as_str().unwrap().contains("raining"));
    assert!(weather["observation"]["ephemerality_score"].as_f64().unwrap() >= 0.9);

    assert_eq!(report["stored_memory_ids"].as_array().unwrap().len(), 1);

    // The stored fact is retrievable by its witness
    let id = report["stored_memory_ids"][0].as_str().unwrap();
    let read = app
        .send(request(
            "GET",
            &format!("/cam/multi/memory/{id}?requesting_entity=agent-main"),
            None,
        ))
        .await;
    assert_eq!(read.status(), StatusCode::OK);
}

#[tokio::test]
async fn analyze_reports_without_storing() {
    let app = TestApp::new();

    let report = body_json(
        app.send(request("POST", "/cam/curated/analyze", Some(&turn_body())))
            .await,
    )
    .await;
    assert_eq!(report["decisions"].as_array().unwrap().len(), 2);
    assert_eq!(report["stored_memory_ids"].as_array().unwrap().len(), 0);

    let stats = body_json(
        app.send(request("GET", "/cam/curated/stats/agent-main", None))
            .await,
    )
    .await;
    assert_eq!(stats["observations_stored"], 0);
}

#[tokio::test]
async fn curator_failure_degrades_to_reviewable_context() {
    let app = TestApp::with_options(ScriptedCurator::failing("model returned 503"), |_| {});

    let response = app
        .send(request("POST", "/cam/curated/store", Some(&turn_body())))
        .await;
    assert_eq!(response.status(), StatusCode::OK, "degradation, not failure");
    let report = body_json(response).await;

    assert_eq!(report["fallback_used"], true);
    assert_eq!(report["stored_memory_ids"].as_array().unwrap().len(), 1);
    let decision = &report["decisions"][0];
    assert_eq!(decision["observation"]["memory_type"], "context");
    assert_eq!(decision["observation"]["requires_review"], true);
    let confidence = decision["observation"]["confidence_score"].as_f64().unwrap();
    assert!((confidence - 0.3).abs() < 1e-6);
}

#[tokio::test]
async fn force_storage_bypasses_curation() {
    let app = TestApp::with_options(ScriptedCurator::failing("should never be called"), |_| {});

    let mut body = turn_body();
    body["force_storage"] = json!(true);
    let report = body_json(
        app.send(request("POST", "/cam/curated/store", Some(&body)))
            .await,
    )
    .await;

    assert_eq!(report["stored_memory_ids"].as_array().unwrap().len(), 1);
    assert_eq!(report["fallback_used"], false);

    let id = report["stored_memory_ids"][0].as_str().unwrap();
    let read = body_json(
        app.send(request(
            "GET",
            &format!("/cam/multi/memory/{id}?requesting_entity=agent-main"),
            None,
        ))
        .await,
    )
    .await;
    let text = read["content"]["text"].as_str().unwrap();
    assert!(text.contains("Liversedge") && text.contains("Nice to meet you"));
}

#[tokio::test]
async fn curation_stats_accumulate_per_entity() {
    let app = TestApp::new();

    app.send(request("POST", "/cam/curated/store", Some(&turn_body())))
        .await;
    app.send(request("POST", "/cam/curated/store", Some(&turn_body())))
        .await;

    let stats = body_json(
        app.send(request("GET", "/cam/curated/stats/agent-main", None))
            .await,
    )
    .await;
    assert_eq!(stats["observations_seen"], 4);
    assert_eq!(stats["observations_stored"], 2);
    assert_eq!(stats["observations_rejected"], 2);
    assert_eq!(stats["by_storage_type"]["facts"], 2);
    assert_eq!(stats["by_storage_type"]["temporary"], 2);

    let other = body_json(
        app.send(request("GET", "/cam/curated/stats/someone-else", None))
            .await,
    )
    .await;
    assert_eq!(other["observations_seen"], 0);
}

#[tokio::test]
async fn oversize_turn_is_rejected() {
    let app = TestApp::new();
    let mut body = turn_body();
    body["user_input"] = json!("a".repeat(10_001));
    let response = app
        .send(request("POST", "/cam/curated/store", Some(&body)))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
