//! Chat agent with tool execution

use super::context::ConversationContext;
use super::{Agent, AgentResponse, ToolCallLog};
use crate::llm::{LlmProvider, TokenUsage};
use crate::tools::ToolRegistry;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// Default cap on model round-trips per run
pub const DEFAULT_MAX_ITERATIONS: usize = 10;

const MAX_ITERATIONS_NOTICE: &str =
    "I've reached the maximum number of steps without a final answer.";

/// Agent backed by an LLM, optionally able to call tools
///
/// Each `run` is independent: the conversation starts from the system prompt
/// and the given prompt, and is discarded afterwards.
pub struct ChatAgent {
    name: String,
    role: String,
    instructions: Vec<String>,
    llm: Arc<dyn LlmProvider>,
    tools: Option<ToolRegistry>,
    max_iterations: usize,
}

impl ChatAgent {
    pub fn new(name: impl Into<String>, role: impl Into<String>, llm: Arc<dyn LlmProvider>) -> Self {
        Self {
            name: name.into(),
            role: role.into(),
            instructions: Vec::new(),
            llm,
            tools: None,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    pub fn with_instructions<I, S>(mut self, instructions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.instructions = instructions.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = Some(tools);
        self
    }

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max.max(1);
        self
    }

    pub fn tools(&self) -> Option<&ToolRegistry> {
        self.tools.as_ref()
    }

    /// System prompt built from name, role and instructions
    pub fn system_prompt(&self) -> String {
        let mut prompt = format!(
            "# Today's date is: {}\n\nYour name is {}.\nYour role is {}.",
            chrono::Local::now().format("%B %d, %Y"),
            self.name,
            self.role
        );

        if !self.instructions.is_empty() {
            prompt.push_str("\n\n## Instructions");
            for instruction in &self.instructions {
                prompt.push_str("\n- ");
                prompt.push_str(instruction);
            }
        }

        prompt
    }
}

#[async_trait]
impl Agent for ChatAgent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, prompt: &str) -> Result<AgentResponse> {
        let mut context = ConversationContext::new(self.system_prompt());
        context.add_user(prompt);

        let definitions = self
            .tools
            .as_ref()
            .map(|t| t.definitions())
            .unwrap_or_default();
        let tool_definitions = (!definitions.is_empty()).then_some(definitions.as_slice());

        let mut usage = TokenUsage::default();
        let mut tool_call_log = Vec::new();

        for iteration in 1..=self.max_iterations {
            tracing::debug!(
                agent = %self.name,
                iteration,
                "Calling {} ({}), ~{} tokens of context",
                self.llm.name(),
                self.llm.model(),
                context.estimate_total_tokens()
            );

            let response = self
                .llm
                .chat(context.messages(), tool_definitions)
                .await
                .with_context(|| format!("Agent '{}' failed to get a model response", self.name))?;

            if let Some(u) = response.usage() {
                usage.accumulate(u);
            }

            let calls = response.tool_calls();
            let registry = match (&self.tools, calls.is_empty()) {
                (Some(registry), false) => registry,
                (None, false) => {
                    tracing::warn!(
                        "Agent '{}' has no tools but the model requested {} tool call(s)",
                        self.name,
                        calls.len()
                    );
                    return Ok(AgentResponse {
                        text: response.text().unwrap_or_default().to_string(),
                        iterations: iteration,
                        tool_call_log,
                        usage,
                    });
                }
                (_, true) => {
                    return Ok(AgentResponse {
                        text: response.text().unwrap_or_default().to_string(),
                        iterations: iteration,
                        tool_call_log,
                        usage,
                    });
                }
            };

            // Tool results must follow the assistant message that requested them
            context.add_assistant_tool_calls(response.text(), calls);

            for call in calls {
                tracing::info!(agent = %self.name, tool = %call.name, "Executing tool");
                tracing::debug!("Tool arguments: {}", call.arguments);

                let result = registry
                    .execute(&call.name, call.arguments.clone())
                    .await
                    .with_context(|| format!("Tool '{}' failed", call.name))?;

                if !result.success {
                    tracing::warn!("Tool '{}' returned an error: {}", call.name, result.output);
                }

                tool_call_log.push(ToolCallLog {
                    tool: call.name.clone(),
                    args: call.arguments.clone(),
                    success: result.success,
                    result_preview: preview(&result.output, 200),
                });
                context.add_tool_result(&call.id, &result.output);
            }
        }

        tracing::warn!(
            "Agent '{}' hit the iteration limit ({})",
            self.name,
            self.max_iterations
        );
        let text = context
            .last_assistant_text()
            .unwrap_or(MAX_ITERATIONS_NOTICE)
            .to_string();

        Ok(AgentResponse {
            text,
            iterations: self.max_iterations,
            tool_call_log,
            usage,
        })
    }
}

fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LlmResponse, Message, ToolCall, ToolDefinition};
    use crate::tools::{Tool, ToolResult};
    use serde_json::{json, Value};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays canned responses and records what it was sent
    struct ScriptedLlm {
        responses: Mutex<VecDeque<LlmResponse>>,
        seen: Mutex<Vec<Vec<Message>>>,
    }

    impl ScriptedLlm {
        fn new(responses: Vec<LlmResponse>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                seen: Mutex::new(Vec::new()),
            })
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
                .ok_or_else(|| anyhow::anyhow!("script exhausted"))
        }
    }

    struct QueryTool;

    #[async_trait]
    impl Tool for QueryTool {
        fn name(&self) -> &str {
            "run_sql_plus_plus_query"
        }

        fn description(&self) -> &str {
            "Run a SQL++ query"
        }

        fn parameters(&self) -> Value {
            json!({"type": "object", "properties": {"query": {"type": "string"}}})
        }

        async fn execute(&self, params: Value) -> Result<ToolResult> {
            Ok(ToolResult::success(format!(
                "[{{\"rows_for\": {}}}]",
                params["query"]
            )))
        }
    }

    fn text(t: &str) -> LlmResponse {
        LlmResponse::Text {
            text: t.to_string(),
            usage: None,
        }
    }

    fn query_call() -> LlmResponse {
        LlmResponse::ToolCalls {
            calls: vec![ToolCall {
                id: "call_1".to_string(),
                name: "run_sql_plus_plus_query".to_string(),
                arguments: json!({"query": "SELECT COUNT(*) FROM orders"}),
            }],
            usage: None,
        }
    }

    #[tokio::test]
    async fn test_text_response_without_tools() {
        let llm = ScriptedLlm::new(vec![text("Hello there")]);
        let agent = ChatAgent::new("llm_agent", "SQL++ expert", llm.clone())
            .with_instructions(["Be precise."]);

        let response = agent.run("hi").await.unwrap();
        assert_eq!(response.text, "Hello there");
        assert_eq!(response.iterations, 1);

        let seen = llm.seen.lock().unwrap();
        let system = seen[0][0].content.as_text().unwrap();
        assert!(system.contains("Your name is llm_agent."));
        assert!(system.contains("- Be precise."));
        assert_eq!(seen[0][1].content.as_text(), Some("hi"));
    }

    #[tokio::test]
    async fn test_tool_loop_feeds_results_back() {
        let llm = ScriptedLlm::new(vec![query_call(), text("[{\"$1\": 42}]")]);
        let agent = ChatAgent::new("tools_agent", "executor", llm.clone())
            .with_tools(ToolRegistry::from_tools([Arc::new(QueryTool) as Arc<dyn Tool>]));

        let response = agent.run("execute it").await.unwrap();
        assert_eq!(response.text, "[{\"$1\": 42}]");
        assert_eq!(response.iterations, 2);
        assert_eq!(response.tool_call_log.len(), 1);
        assert!(response.tool_call_log[0].success);

        let seen = llm.seen.lock().unwrap();
        let second = &seen[1];
        assert_eq!(second.len(), 4);
        assert_eq!(second[3].tool_call_id.as_deref(), Some("call_1"));
        assert!(second[3]
            .content
            .as_text()
            .unwrap()
            .contains("SELECT COUNT(*) FROM orders"));
    }

    #[tokio::test]
    async fn test_iteration_limit_returns_notice() {
        let llm = ScriptedLlm::new(vec![query_call(), query_call()]);
        let agent = ChatAgent::new("tools_agent", "executor", llm)
            .with_tools(ToolRegistry::from_tools([Arc::new(QueryTool) as Arc<dyn Tool>]))
            .with_max_iterations(2);

        let response = agent.run("loop forever").await.unwrap();
        assert_eq!(response.text, MAX_ITERATIONS_NOTICE);
        assert_eq!(response.tool_call_log.len(), 2);
    }

    #[tokio::test]
    async fn test_provider_error_propagates() {
        let agent = ChatAgent::new("llm_agent", "router", ScriptedLlm::new(vec![]));
        let err = agent.run("anything").await.unwrap_err();
        assert!(err.to_string().contains("llm_agent"));
    }

    #[test]
    fn test_preview_respects_char_boundaries() {
        assert_eq!(preview("héllo", 2), "hé...");
        assert_eq!(preview("short", 10), "short");
    }
}
