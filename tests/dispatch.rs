//! End-to-end dispatch with scripted agents

use anyhow::Result;
use async_trait::async_trait;
use cbchat::agent::{Agent, AgentResponse};
use cbchat::dispatch::Dispatcher;
use cbchat::schema::SchemaContext;
use cbchat::session::{ChatMessage, CollectingSink};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Agent that returns a fixed reply and records its prompts
struct ScriptedAgent {
    name: &'static str,
    reply: Result<String, String>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedAgent {
    fn replying(name: &'static str, reply: &str) -> Arc<Self> {
        Arc::new(Self {
            name,
            reply: Ok(reply.to_string()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn failing(name: &'static str, error: &str) -> Arc<Self> {
        Arc::new(Self {
            name,
            reply: Err(error.to_string()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Agent for ScriptedAgent {
    fn name(&self) -> &str {
        self.name
    }

    async fn run(&self, prompt: &str) -> Result<AgentResponse> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        match &self.reply {
            Ok(text) => Ok(AgentResponse::text(text.clone())),
            Err(e) => Err(anyhow::anyhow!("{}", e)),
        }
    }
}

fn template_dir() -> (TempDir, std::path::PathBuf) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("llm_router_prompt.txt");
    std::fs::write(&path, "{schema_context}\n---\n{user_question}").unwrap();
    (dir, path)
}

fn schema() -> SchemaContext {
    SchemaContext::new(r#"{"shop":{"orders":["id","total"]}}"#)
}

#[tokio::test]
async fn test_order_count_goes_through_executor() {
    let (_dir, template) = template_dir();
    let router = ScriptedAgent::replying("llm_agent", "Tool needed: SELECT COUNT(*) FROM orders");
    let executor = ScriptedAgent::replying("tools_agent", "\n  There are 42 orders.  \n");
    let dispatcher = Dispatcher::new(template, router.clone(), executor.clone());
    let sink = CollectingSink::new();

    let outcome = dispatcher
        .handle("how many orders are there?", &schema(), &sink)
        .await
        .unwrap();

    assert_eq!(outcome.executed_query.as_deref(), Some("SELECT COUNT(*) FROM orders"));
    assert_eq!(outcome.answer, "There are 42 orders.");

    assert_eq!(
        router.prompts(),
        vec![format!("{}\n---\nhow many orders are there?", schema().as_str())]
    );
    assert_eq!(
        executor.prompts(),
        vec!["execute the following sql++ query using the mcp tools : SELECT COUNT(*) FROM orders"]
    );
    assert_eq!(
        sink.take(),
        vec![ChatMessage::query_identified("SELECT COUNT(*) FROM orders")]
    );
}

#[tokio::test]
async fn test_direct_answer_skips_executor() {
    let (_dir, template) = template_dir();
    let router = ScriptedAgent::replying("llm_agent", "The shop bucket has one collection.\n");
    let executor = ScriptedAgent::replying("tools_agent", "unused");
    let dispatcher = Dispatcher::new(template, router, executor.clone());
    let sink = CollectingSink::new();

    let outcome = dispatcher
        .handle("what collections exist?", &schema(), &sink)
        .await
        .unwrap();

    assert_eq!(outcome.answer, "The shop bucket has one collection.");
    assert_eq!(outcome.executed_query, None);
    assert!(executor.prompts().is_empty());
    assert!(sink.take().is_empty());
}

#[tokio::test]
async fn test_missing_template_invokes_no_agent() {
    let dir = TempDir::new().unwrap();
    let router = ScriptedAgent::replying("llm_agent", "Tool needed: SELECT 1");
    let executor = ScriptedAgent::replying("tools_agent", "1");
    let dispatcher = Dispatcher::new(
        dir.path().join("absent.txt"),
        router.clone(),
        executor.clone(),
    );

    let err = dispatcher
        .handle("anything", &schema(), &CollectingSink::new())
        .await
        .unwrap_err();

    assert!(err.to_string().contains("Prompt template not found"));
    assert!(router.prompts().is_empty());
    assert!(executor.prompts().is_empty());
}

#[tokio::test]
async fn test_executor_failure_is_propagated_after_announcement() {
    let (_dir, template) = template_dir();
    let router = ScriptedAgent::replying("llm_agent", "Tool needed: SELECT * FROM orders");
    let executor = ScriptedAgent::failing("tools_agent", "tool call timed out");
    let dispatcher = Dispatcher::new(template, router, executor);
    let sink = CollectingSink::new();

    let err = dispatcher
        .handle("list orders", &schema(), &sink)
        .await
        .unwrap_err();

    assert!(format!("{:#}", err).contains("tool call timed out"));
    assert_eq!(
        sink.take(),
        vec![ChatMessage::query_identified("SELECT * FROM orders")]
    );
}
