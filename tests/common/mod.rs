//! Shared fixtures for integration tests

#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use cbchat::config::Config;
use cbchat::llm::{LlmProvider, LlmResponse, Message, ToolCall, ToolDefinition};
use cbchat::session::ToolConnector;
use cbchat::tools::{Tool, ToolResult};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

pub const SCHEMA_JSON: &str = r#"{"travel-sample":{"inventory":{"hotel":["name","country","city"]}}}"#;

pub const TEMPLATE: &str = "Schema:\n{schema_context}\n\nReply `Tool needed: <query>` when data is required.\nQuestion: {user_question}";

/// Model backend that replays canned responses in order
pub struct ScriptedLlm {
    responses: Mutex<VecDeque<LlmResponse>>,
    pub seen: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedLlm {
    pub fn new(responses: Vec<LlmResponse>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            seen: Mutex::new(Vec::new()),
        })
    }

    /// Text of the last user message of every call, in order
    pub fn prompts(&self) -> Vec<String> {
        self.seen
            .lock()
            .unwrap()
            .iter()
            .filter_map(|messages| {
                messages
                    .iter()
                    .rev()
                    .find(|m| matches!(m.role, cbchat::llm::Role::User))
                    .and_then(|m| m.content.as_text().map(String::from))
            })
            .collect()
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }
}

#[async_trait]
impl LlmProvider for ScriptedLlm {
    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "test"
    }

    async fn chat(
        &self,
        messages: &[Message],
        _tools: Option<&[ToolDefinition]>,
    ) -> Result<LlmResponse> {
        self.seen.lock().unwrap().push(messages.to_vec());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| anyhow::anyhow!("model unavailable"))
    }
}

pub fn text(s: &str) -> LlmResponse {
    LlmResponse::Text {
        text: s.to_string(),
        usage: None,
    }
}

pub fn tool_call(name: &str, args: Value) -> LlmResponse {
    LlmResponse::ToolCalls {
        calls: vec![ToolCall {
            id: "call_1".to_string(),
            name: name.to_string(),
            arguments: args,
        }],
        usage: None,
    }
}

/// Query tool that records what it was asked to run
#[derive(Default)]
pub struct RecordingQueryTool {
    pub queries: Mutex<Vec<String>>,
}

#[async_trait]
impl Tool for RecordingQueryTool {
    fn name(&self) -> &str {
        "run_sql_plus_plus_query"
    }

    fn description(&self) -> &str {
        "Run a SQL++ query against the cluster"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {"query": {"type": "string"}},
            "required": ["query"]
        })
    }

    async fn execute(&self, params: Value) -> Result<ToolResult> {
        let query = params["query"].as_str().unwrap_or_default().to_string();
        self.queries.lock().unwrap().push(query);
        Ok(ToolResult::success(r#"[{"total": 5}]"#))
    }
}

/// Connector that hands out a fixed tool set and counts connects
pub struct StaticConnector {
    tools: Vec<Arc<dyn Tool>>,
    pub connects: AtomicUsize,
    pub last_url: Mutex<Option<String>>,
}

impl StaticConnector {
    pub fn new(tools: Vec<Arc<dyn Tool>>) -> Arc<Self> {
        Arc::new(Self {
            tools,
            connects: AtomicUsize::new(0),
            last_url: Mutex::new(None),
        })
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ToolConnector for StaticConnector {
    async fn connect(&self, url: &str) -> Result<Vec<Arc<dyn Tool>>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        *self.last_url.lock().unwrap() = Some(url.to_string());
        Ok(self.tools.clone())
    }
}

/// Connector whose endpoint is always unreachable
pub struct FailingConnector;

#[async_trait]
impl ToolConnector for FailingConnector {
    async fn connect(&self, url: &str) -> Result<Vec<Arc<dyn Tool>>> {
        anyhow::bail!("connection refused ({})", url)
    }
}

/// A working directory holding the schema artifact and prompt template
pub struct Workspace {
    pub dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("schema_context.json"), SCHEMA_JSON).unwrap();
        std::fs::create_dir_all(dir.path().join("prompts")).unwrap();
        std::fs::write(
            dir.path().join("prompts").join("llm_router_prompt.txt"),
            TEMPLATE,
        )
        .unwrap();
        Self { dir }
    }

    pub fn without_schema() -> Self {
        let ws = Self::new();
        std::fs::remove_file(ws.schema_path()).unwrap();
        ws
    }

    pub fn schema_path(&self) -> std::path::PathBuf {
        self.dir.path().join("schema_context.json")
    }

    pub fn template_path(&self) -> std::path::PathBuf {
        self.dir.path().join("prompts").join("llm_router_prompt.txt")
    }

    /// Config pointing at this workspace with an MCP endpoint set
    pub fn config(&self) -> Config {
        let mut config = Config::default();
        config.paths.schema_context = self.schema_path();
        config.paths.prompt_template = self.template_path();
        config.mcp.server_url = Some("http://mcp.test/sse".to_string());
        config
    }
}
