//! Claude (Anthropic) LLM provider implementation
//!
//! SECURITY: API keys are ONLY sent to official Anthropic endpoints.

use super::error::send_checked;
use super::{
    ContentPart, LlmError, LlmProvider, LlmResponse, Message, MessageContent, Role, TokenUsage,
    ToolCall, ToolDefinition,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::env;

/// Official Anthropic API endpoint - API key is ONLY sent here
const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct ClaudeProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
    max_tokens: usize,
}

impl ClaudeProvider {
    pub fn new() -> Result<Self, LlmError> {
        let api_key = env::var("ANTHROPIC_API_KEY")
            .ok()
            .filter(|k| !k.is_empty())
            .ok_or(LlmError::MissingCredential("ANTHROPIC_API_KEY"))?;

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            model: "claude-sonnet-4-20250514".to_string(),
            max_tokens: 4096,
        })
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    fn convert_messages(messages: &[Message]) -> (Option<String>, Vec<ClaudeMessage>) {
        let mut system_prompt = None;
        let mut claude_messages = Vec::new();

        for msg in messages {
            match msg.role {
                Role::System => {
                    if let Some(text) = msg.content.as_text() {
                        system_prompt = Some(text.to_string());
                    }
                }
                Role::User => {
                    if let Some(text) = msg.content.as_text() {
                        claude_messages.push(ClaudeMessage {
                            role: "user".to_string(),
                            content: ClaudeContent::Text(text.to_string()),
                        });
                    }
                }
                Role::Assistant => match &msg.content {
                    MessageContent::Text(text) => claude_messages.push(ClaudeMessage {
                        role: "assistant".to_string(),
                        content: ClaudeContent::Text(text.clone()),
                    }),
                    MessageContent::Parts(parts) => {
                        let blocks = parts
                            .iter()
                            .map(|p| match p {
                                ContentPart::Text { text } => {
                                    ClaudeContentBlock::Text { text: text.clone() }
                                }
                                ContentPart::ToolUse { id, name, input } => {
                                    ClaudeContentBlock::ToolUse {
                                        id: id.clone(),
                                        name: name.clone(),
                                        input: input.clone(),
                                    }
                                }
                            })
                            .collect();
                        claude_messages.push(ClaudeMessage {
                            role: "assistant".to_string(),
                            content: ClaudeContent::Blocks(blocks),
                        });
                    }
                },
                Role::Tool => {
                    if let (Some(text), Some(tool_id)) = (msg.content.as_text(), &msg.tool_call_id)
                    {
                        claude_messages.push(ClaudeMessage {
                            role: "user".to_string(),
                            content: ClaudeContent::Blocks(vec![ClaudeContentBlock::ToolResult {
                                tool_use_id: tool_id.clone(),
                                content: text.to_string(),
                            }]),
                        });
                    }
                }
            }
        }

        (system_prompt, claude_messages)
    }

    fn convert_tools(tools: &[ToolDefinition]) -> Vec<ClaudeTool> {
        tools
            .iter()
            .map(|t| ClaudeTool {
                name: t.name.clone(),
                description: t.description.clone(),
                input_schema: t.parameters.clone(),
            })
            .collect()
    }

    fn parse_response(response: ClaudeResponse) -> LlmResponse {
        let usage = response.usage.map(|u| TokenUsage {
            input_tokens: u.input_tokens,
            output_tokens: u.output_tokens,
            total_tokens: u.input_tokens + u.output_tokens,
        });

        let mut text_parts = Vec::new();
        let mut calls = Vec::new();
        for block in response.content {
            match block {
                ClaudeContentBlock::Text { text } => text_parts.push(text),
                ClaudeContentBlock::ToolUse { id, name, input } => calls.push(ToolCall {
                    id,
                    name,
                    arguments: input,
                }),
                ClaudeContentBlock::ToolResult { .. } => {}
            }
        }

        let text = (!text_parts.is_empty()).then(|| text_parts.join("\n"));
        LlmResponse::from_parts(text, calls, usage)
    }
}

#[async_trait]
impl LlmProvider for ClaudeProvider {
    fn name(&self) -> &str {
        "claude"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn chat(
        &self,
        messages: &[Message],
        tools: Option<&[ToolDefinition]>,
    ) -> Result<LlmResponse> {
        let (system, claude_messages) = Self::convert_messages(messages);

        let request = ClaudeRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            system,
            messages: claude_messages,
            tools: tools.filter(|t| !t.is_empty()).map(Self::convert_tools),
        };

        let builder = self
            .client
            .post(ANTHROPIC_API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request);

        let response = send_checked(builder, "Anthropic").await?;
        let body: ClaudeResponse = response
            .json()
            .await
            .context("Failed to parse Anthropic API response")?;

        Ok(Self::parse_response(body))
    }
}

#[derive(Debug, Serialize)]
struct ClaudeRequest {
    model: String,
    max_tokens: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<ClaudeMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<ClaudeTool>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ClaudeMessage {
    role: String,
    content: ClaudeContent,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum ClaudeContent {
    Text(String),
    Blocks(Vec<ClaudeContentBlock>),
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
enum ClaudeContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "tool_use")]
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    #[serde(rename = "tool_result")]
    ToolResult {
        tool_use_id: String,
        content: String,
    },
}

#[derive(Debug, Serialize)]
struct ClaudeTool {
    name: String,
    description: String,
    input_schema: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ClaudeResponse {
    content: Vec<ClaudeContentBlock>,
    #[serde(default)]
    usage: Option<ClaudeUsage>,
}

#[derive(Debug, Deserialize)]
struct ClaudeUsage {
    input_tokens: u32,
    output_tokens: u32,
}
