//! Witness-access scenarios driven over the HTTP surface:
//! private consultations stay private, groups see shared memories,
//! TTL expiry removes records.

use axum::http::StatusCode;
use serde_json::{json, Value};

use engram_core::{CleanupConfig, CleanupScheduler};
use engram_e2e_tests::harness::{body_json, request, TestApp};
use engram_e2e_tests::mocks::TEST_DIMENSIONS;

fn unit_vector(seed: f32) -> Vec<f32> {
    let mut v: Vec<f32> = (0..TEST_DIMENSIONS)
        .map(|i| ((i as f32 + seed) * 0.7).sin())
        .collect();
    engram_core::normalize_unit(&mut v);
    v
}

fn store_body(witnesses: &[&str], text: &str, vector: &[f32]) -> Value {
    json!({
        "witnessed_by": witnesses,
        "situation_type": "consultation_1to1",
        "content": {"text": text},
        "primary_vector": vector,
        "metadata": {
            "timestamp": "2026-08-01T10:00:00Z",
            "memory_type": "fact"
        }
    })
}

fn retrieve_body(entity: &str, vector: &[f32], threshold: f32) -> Value {
    json!({
        "requesting_entity": entity,
        "resonance_vectors": [{"vector": vector, "weight": 1.0}],
        "retrieval": {"top_k": 10, "similarity_threshold": threshold}
    })
}

#[tokio::test]
async fn private_consultation_is_private() {
    let app = TestApp::new();
    let v = unit_vector(1.0);

    let stored = app
        .send(request(
            "POST",
            "/cam/multi/store",
            Some(&store_body(&["alice", "claude"], "Algorithm optimization", &v)),
        ))
        .await;
    assert_eq!(stored.status(), StatusCode::OK);
    let stored = body_json(stored).await;
    let memory_id = stored["memory_id"].as_str().unwrap().to_string();
    assert!(memory_id.starts_with("mem-"));

    // Bob was not in the room
    let bob = app
        .send(request(
            "POST",
            "/cam/multi/retrieve",
            Some(&retrieve_body("bob", &v, 0.0)),
        ))
        .await;
    let bob = body_json(bob).await;
    assert_eq!(bob["memories"].as_array().unwrap().len(), 0);
    assert_eq!(bob["access_granted_count"], 0);

    // Alice was
    let alice = app
        .send(request(
            "POST",
            "/cam/multi/retrieve",
            Some(&retrieve_body("alice", &v, 0.0)),
        ))
        .await;
    let alice = body_json(alice).await;
    let memories = alice["memories"].as_array().unwrap();
    assert_eq!(memories.len(), 1);
    assert_eq!(memories[0]["memory_id"], memory_id.as_str());
    let similarity = memories[0]["similarity_score"].as_f64().unwrap();
    assert!((similarity - 1.0).abs() < 1e-3, "exact vector match, got {similarity}");
    assert_eq!(
        alice["entity_verification"]["search_scope"],
        "witnessed_memories_only"
    );
}

#[tokio::test]
async fn group_memory_visible_to_all_participants() {
    let app = TestApp::new();
    let v = unit_vector(2.0);

    app.send(request(
        "POST",
        "/cam/multi/store",
        Some(&store_body(&["alice", "bob", "claude"], "standup notes", &v)),
    ))
    .await;

    for entity in ["alice", "bob", "claude"] {
        let r = body_json(
            app.send(request(
                "POST",
                "/cam/multi/retrieve",
                Some(&retrieve_body(entity, &v, 0.0)),
            ))
            .await,
        )
        .await;
        assert_eq!(
            r["memories"].as_array().unwrap().len(),
            1,
            "{entity} should see the group memory"
        );
    }

    let dave = body_json(
        app.send(request(
            "POST",
            "/cam/multi/retrieve",
            Some(&retrieve_body("dave", &v, 0.0)),
        ))
        .await,
    )
    .await;
    assert_eq!(dave["memories"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn hyphenated_entity_ids_match_normalised_form() {
    let app = TestApp::new();
    let v = unit_vector(3.0);

    app.send(request(
        "POST",
        "/cam/multi/store",
        Some(&store_body(&["human-alice-123", "claude"], "hyphens", &v)),
    ))
    .await;

    let normalised = body_json(
        app.send(request(
            "POST",
            "/cam/multi/retrieve",
            Some(&retrieve_body("humanalice123", &v, 0.0)),
        ))
        .await,
    )
    .await;
    assert_eq!(normalised["memories"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn witness_checked_point_read_does_not_leak_existence() {
    let app = TestApp::new();
    let v = unit_vector(4.0);

    let stored = body_json(
        app.send(request(
            "POST",
            "/cam/multi/store",
            Some(&store_body(&["alice"], "secret", &v)),
        ))
        .await,
    )
    .await;
    let id = stored["memory_id"].as_str().unwrap();

    let eve = app
        .send(request(
            "GET",
            &format!("/cam/multi/memory/{id}?requesting_entity=eve"),
            None,
        ))
        .await;
    assert_eq!(eve.status(), StatusCode::NOT_FOUND);

    let missing = app
        .send(request(
            "GET",
            "/cam/multi/memory/mem-ffffffffffff?requesting_entity=eve",
            None,
        ))
        .await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND, "denial and absence look identical");

    let alice = app
        .send(request(
            "GET",
            &format!("/cam/multi/memory/{id}?requesting_entity=alice"),
            None,
        ))
        .await;
    assert_eq!(alice.status(), StatusCode::OK);
}

#[tokio::test]
async fn situation_history_lists_participation() {
    let app = TestApp::new();
    app.send(request(
        "POST",
        "/cam/multi/store",
        Some(&store_body(&["alice", "claude"], "session one", &unit_vector(5.0))),
    ))
    .await;
    app.send(request(
        "POST",
        "/cam/multi/store",
        Some(&store_body(&["alice", "bob"], "session two", &unit_vector(6.0))),
    ))
    .await;

    let situations = body_json(
        app.send(request("GET", "/cam/multi/situations/alice", None))
            .await,
    )
    .await;
    assert_eq!(situations["total"], 2);

    let for_bob = body_json(
        app.send(request("GET", "/cam/multi/situations/bob", None))
            .await,
    )
    .await;
    assert_eq!(for_bob["total"], 1);
}

#[tokio::test]
async fn ttl_expiry_removes_record() {
    let app = TestApp::new();
    let v = unit_vector(7.0);

    let mut body = store_body(&["alice"], "short-lived", &v);
    body["retention"] = json!({"ttl_seconds": 1});
    let stored = body_json(app.send(request("POST", "/cam/multi/store", Some(&body))).await).await;
    let id = stored["memory_id"].as_str().unwrap().to_string();

    tokio::time::sleep(std::time::Duration::from_secs(2)).await;

    let scheduler = CleanupScheduler::new(
        std::sync::Arc::clone(app.state.engine.store()),
        CleanupConfig::default(),
    );
    let summary = scheduler.run_expiry().unwrap();
    assert_eq!(summary.deleted, 1);

    let gone = app
        .send(request("GET", &format!("/cam/memory/{id}"), None))
        .await;
    assert_eq!(gone.status(), StatusCode::NOT_FOUND);

    // And the index no longer surfaces it
    let hits = body_json(
        app.send(request(
            "POST",
            "/cam/multi/retrieve",
            Some(&retrieve_body("alice", &v, 0.0)),
        ))
        .await,
    )
    .await;
    assert_eq!(hits["memories"].as_array().unwrap().len(), 0);
}
