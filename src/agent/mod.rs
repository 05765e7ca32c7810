//! Agents: LLM-backed workers the dispatcher hands prompts to

mod chat;
mod context;
pub mod roles;

pub use chat::{ChatAgent, DEFAULT_MAX_ITERATIONS};
pub use context::ConversationContext;

use crate::llm::TokenUsage;
use anyhow::Result;
use async_trait::async_trait;

/// Something that turns a prompt into text
#[async_trait]
pub trait Agent: Send + Sync {
    fn name(&self) -> &str;

    /// Run one independent request
    async fn run(&self, prompt: &str) -> Result<AgentResponse>;
}

/// A tool call made during a run
#[derive(Debug, Clone)]
pub struct ToolCallLog {
    pub tool: String,
    pub args: serde_json::Value,
    pub success: bool,
    pub result_preview: String,
}

/// Response from an agent run
#[derive(Debug, Clone, Default)]
pub struct AgentResponse {
    pub text: String,
    /// Model round-trips used
    pub iterations: usize,
    pub tool_call_log: Vec<ToolCallLog>,
    pub usage: TokenUsage,
}

impl AgentResponse {
    /// Plain text response with no tool activity
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            iterations: 1,
            ..Self::default()
        }
    }
}
