//! Conversation context for a single agent run

use crate::llm::{Message, MessageContent, Role, ToolCall};

/// Max tokens for a single tool result (keeps one huge result set from filling context)
const MAX_TOOL_RESULT_TOKENS: usize = 8_000;

/// Messages exchanged with the model during one `run`
///
/// A context always starts with the agent's system prompt; it is dropped
/// when the run ends.
pub struct ConversationContext {
    messages: Vec<Message>,
}

impl ConversationContext {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::system(system_prompt)],
        }
    }

    /// Add a user message
    pub fn add_user(&mut self, content: impl Into<String>) {
        self.messages.push(Message::user(content));
    }

    /// Add an assistant message with tool calls (required before tool results for OpenAI)
    pub fn add_assistant_tool_calls(&mut self, text: Option<&str>, tool_calls: &[ToolCall]) {
        self.messages
            .push(Message::assistant_tool_calls(text, tool_calls));
    }

    /// Add a tool result (auto-truncates if too large)
    pub fn add_tool_result(&mut self, tool_call_id: impl Into<String>, result: &str) {
        let truncated = Self::truncate_if_needed(result, MAX_TOOL_RESULT_TOKENS);
        self.messages
            .push(Message::tool_result(tool_call_id, truncated));
    }

    /// Truncate text if it exceeds token limit
    fn truncate_if_needed(text: &str, max_tokens: usize) -> String {
        if Self::estimate_tokens(text) <= max_tokens {
            return text.to_string();
        }

        // ~4 chars per token is a rough estimate
        let max_chars = max_tokens * 4;
        let truncated: String = text.chars().take(max_chars).collect();

        format!(
            "{}\n\n... [TRUNCATED: Result exceeded {} tokens. Narrow the query with LIMIT or a WHERE clause.]",
            truncated, max_tokens
        )
    }

    /// Estimate tokens in text (~4 chars per token for English)
    pub fn estimate_tokens(text: &str) -> usize {
        text.len().div_ceil(4)
    }

    /// Estimate total tokens in context
    pub fn estimate_total_tokens(&self) -> usize {
        self.messages
            .iter()
            .map(|m| match &m.content {
                MessageContent::Text(t) => Self::estimate_tokens(t),
                MessageContent::Parts(_) => {
                    let text = m.content.as_text().unwrap_or_default();
                    let calls: usize = m
                        .content
                        .tool_uses()
                        .iter()
                        .map(|c| Self::estimate_tokens(&c.arguments.to_string()))
                        .sum();
                    Self::estimate_tokens(text) + calls
                }
            })
            .sum()
    }

    /// Text of the most recent assistant message that had any
    pub fn last_assistant_text(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .filter(|m| m.role == Role::Assistant)
            .find_map(|m| m.content.as_text().filter(|t| !t.trim().is_empty()))
    }

    /// Get all messages
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }
}
