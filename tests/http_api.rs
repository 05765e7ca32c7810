//! Integration tests for the HTTP chat API

mod common;

use cbchat::session::SessionInitializer;
use cbchat::tools::Tool;
use cbchat::transport::http::router;
use common::*;
use serde_json::{json, Value};
use std::sync::Arc;

async fn serve(initializer: SessionInitializer) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(initializer)).await.unwrap();
    });
    format!("http://{}", addr)
}

fn working_initializer(ws: &Workspace, llm: Arc<ScriptedLlm>) -> SessionInitializer {
    let tool: Arc<dyn Tool> = Arc::new(RecordingQueryTool::default());
    SessionInitializer::new(ws.config())
        .with_provider(llm)
        .with_connector(StaticConnector::new(vec![tool]))
}

async fn create_session(client: &reqwest::Client, base: &str) -> String {
    let res = client
        .post(format!("{}/sessions", base))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 201);
    let body: Value = res.json().await.unwrap();
    body["session_id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_health_endpoint() {
    let ws = Workspace::new();
    let base = serve(working_initializer(&ws, ScriptedLlm::new(vec![]))).await;

    let body: Value = reqwest::get(format!("{}/health", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(body["sessions"], 0);
}

#[tokio::test]
async fn test_create_session_greets_user() {
    let ws = Workspace::new();
    let base = serve(working_initializer(&ws, ScriptedLlm::new(vec![]))).await;

    let res = reqwest::Client::new()
        .post(format!("{}/sessions", base))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 201);

    let body: Value = res.json().await.unwrap();
    assert!(body["session_id"].as_str().is_some());
    assert_eq!(body["tools"], json!(["run_sql_plus_plus_query"]));
    assert_eq!(body["messages"][0]["kind"], "ready");
    assert_eq!(
        body["messages"][0]["content"],
        "✅ Couchbase Agent is ready. How can I help?"
    );
}

#[tokio::test]
async fn test_setup_failure_returns_422() {
    let ws = Workspace::without_schema();
    let base = serve(working_initializer(&ws, ScriptedLlm::new(vec![]))).await;

    let res = reqwest::Client::new()
        .post(format!("{}/sessions", base))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 422);

    let body: Value = res.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("schema discovery"));
    assert_eq!(body["messages"][0]["kind"], "error");
    assert!(body["messages"][0]["content"]
        .as_str()
        .unwrap()
        .starts_with("Error: "));
}

#[tokio::test]
async fn test_message_round_trip_with_query() {
    let ws = Workspace::new();
    let llm = ScriptedLlm::new(vec![
        text("Tool needed: SELECT COUNT(*) FROM hotel"),
        tool_call(
            "run_sql_plus_plus_query",
            json!({ "query": "SELECT COUNT(*) FROM hotel" }),
        ),
        text("There are 5 hotels."),
    ]);
    let base = serve(working_initializer(&ws, llm)).await;
    let client = reqwest::Client::new();
    let id = create_session(&client, &base).await;

    let res = client
        .post(format!("{}/sessions/{}/messages", base, id))
        .json(&json!({ "message": "How many hotels?" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);

    let body: Value = res.json().await.unwrap();
    assert_eq!(body["session_id"], id.as_str());
    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["kind"], "query_identified");
    assert!(messages[0]["content"]
        .as_str()
        .unwrap()
        .contains("SELECT COUNT(*) FROM hotel"));
    assert_eq!(messages[1]["kind"], "answer");
    assert_eq!(messages[1]["content"], "✅ **Answer:** There are 5 hotels.");
}

#[tokio::test]
async fn test_turn_error_keeps_session() {
    let ws = Workspace::new();
    let base = serve(working_initializer(&ws, ScriptedLlm::new(vec![]))).await;
    let client = reqwest::Client::new();
    let id = create_session(&client, &base).await;

    let body: Value = client
        .post(format!("{}/sessions/{}/messages", base, id))
        .json(&json!({ "message": "hello" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["messages"][0]["kind"], "error");

    let res = client
        .get(format!("{}/sessions/{}", base, id))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    let info: Value = res.json().await.unwrap();
    assert_eq!(info["session_id"], id.as_str());
    assert!(info["created_at"].as_str().is_some());
}

#[tokio::test]
async fn test_blank_message_is_rejected() {
    let ws = Workspace::new();
    let base = serve(working_initializer(&ws, ScriptedLlm::new(vec![]))).await;
    let client = reqwest::Client::new();
    let id = create_session(&client, &base).await;

    let res = client
        .post(format!("{}/sessions/{}/messages", base, id))
        .json(&json!({ "message": "   " }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 400);
}

#[tokio::test]
async fn test_unknown_session_is_404() {
    let ws = Workspace::new();
    let base = serve(working_initializer(&ws, ScriptedLlm::new(vec![]))).await;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/sessions/missing/messages", base))
        .json(&json!({ "message": "hi" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 404);

    let res = client
        .delete(format!("{}/sessions/missing", base))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 404);
}

#[tokio::test]
async fn test_delete_session_ends_it() {
    let ws = Workspace::new();
    let base = serve(working_initializer(&ws, ScriptedLlm::new(vec![]))).await;
    let client = reqwest::Client::new();
    let id = create_session(&client, &base).await;

    let res = client
        .delete(format!("{}/sessions/{}", base, id))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 204);

    let res = client
        .get(format!("{}/sessions/{}", base, id))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 404);
}

#[tokio::test]
async fn test_idle_session_expires() {
    let ws = Workspace::new();
    let tool: Arc<dyn Tool> = Arc::new(RecordingQueryTool::default());
    let mut config = ws.config();
    config.server.session_idle_secs = 1;
    let initializer = SessionInitializer::new(config)
        .with_provider(ScriptedLlm::new(vec![]))
        .with_connector(StaticConnector::new(vec![tool]));
    let base = serve(initializer).await;
    let client = reqwest::Client::new();
    let id = create_session(&client, &base).await;

    tokio::time::sleep(std::time::Duration::from_millis(3500)).await;

    let res = client
        .get(format!("{}/sessions/{}", base, id))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 404);

    let health: Value = reqwest::get(format!("{}/health", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["sessions"], 0);
}
