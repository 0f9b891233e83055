//! API surface tests over a fully stubbed pipeline.

mod common;

use axum_test::TestServer;
use common::{OrchestratorParts, test_orchestrator};
use sage::{AppState, Config};
use serde_json::json;
use std::sync::Arc;

async fn test_server() -> TestServer {
    let (orchestrator, _gateway) = test_orchestrator(OrchestratorParts {
        reflector_scores: vec![1.0],
        ..Default::default()
    })
    .await;

    // A separate store backs the conversation endpoints; the orchestrator
    // keeps its own in-memory database.
    let db = Arc::new(sage::Database::open(":memory:").await.unwrap());
    let memory = common::test_memory_store(db).await;

    let state = AppState {
        config: Arc::new(test_config()),
        memory,
        orchestrator,
    };

    let app = axum::Router::new()
        .nest("/api", sage::api::routes::create_router())
        .with_state(state);

    TestServer::new(app).unwrap()
}

fn test_config() -> Config {
    // Every field has an env fallback, so this resolves without any setup.
    Config::from_env().expect("default config")
}

#[tokio::test]
async fn test_health_endpoint() {
    let server = test_server().await;

    let response = server.get("/api/health").await;
    response.assert_status_ok();

    let body: serde_json::Value = response.json();
    assert_eq!(body["status"], "ok");
    assert!(!body["version"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn test_conversation_create_and_list_messages() {
    let server = test_server().await;

    let created = server
        .post("/api/conversations")
        .json(&json!({ "title": "Battery research" }))
        .await;
    created.assert_status_ok();
    let body: serde_json::Value = created.json();
    let id = body["id"].as_str().unwrap().to_string();
    assert_eq!(body["title"], "Battery research");

    let messages = server
        .get(&format!("/api/conversations/{}/messages", id))
        .await;
    messages.assert_status_ok();
    let list: Vec<serde_json::Value> = messages.json();
    assert!(list.is_empty());
}

#[tokio::test]
async fn test_unknown_conversation_is_404() {
    let server = test_server().await;

    let response = server.get("/api/conversations/nope/messages").await;
    response.assert_status_not_found();
}

#[tokio::test]
async fn test_research_rejects_empty_prompt() {
    let server = test_server().await;

    let response = server
        .post("/api/research")
        .json(&json!({ "prompt": "   " }))
        .await;
    response.assert_status_bad_request();
}

#[tokio::test]
async fn test_research_streams_events_ending_with_done() {
    let server = test_server().await;

    let response = server
        .post("/api/research")
        .json(&json!({ "prompt": "battery degradation", "intensity": 50 }))
        .await;
    response.assert_status_ok();

    let body = response.text();
    assert!(body.contains("event: progress"));
    assert!(body.contains("event: plan"));
    assert!(body.contains("event: source"));
    assert!(body.contains("event: token"));
    assert!(body.contains("event: reflection"));
    assert!(body.trim_end().ends_with("data: {\"type\":\"done\"}"));
}
