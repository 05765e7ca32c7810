//! LLM provider implementations

use crate::config::LlmConfig;

mod claude;
mod error;
mod ollama;
mod openai;
mod types;

pub use claude::ClaudeProvider;
pub use error::LlmError;
pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;
pub use types::*;

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Trait for LLM providers
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Get the provider name
    fn name(&self) -> &str;

    /// Get the model the provider sends requests to
    fn model(&self) -> &str;

    /// Send a chat completion request (non-streaming)
    async fn chat(
        &self,
        messages: &[Message],
        tools: Option<&[ToolDefinition]>,
    ) -> Result<LlmResponse>;
}

/// Create an LLM provider based on name
///
/// `config.model`, when set, overrides the backend's configured model.
pub fn create_provider(name: &str, config: &LlmConfig) -> Result<Arc<dyn LlmProvider>, LlmError> {
    let model = config.model.as_deref();

    match name.trim().to_lowercase().as_str() {
        "openai" | "gpt" => {
            let mut p = OpenAiProvider::new(&config.openai)?;
            if let Some(m) = model {
                p = p.with_model(m);
            }
            Ok(Arc::new(p))
        }
        "claude" | "anthropic" => {
            let mut p = ClaudeProvider::new()?
                .with_model(&config.claude.model)
                .with_max_tokens(config.claude.max_tokens);
            if let Some(m) = model {
                p = p.with_model(m);
            }
            Ok(Arc::new(p))
        }
        "ollama" | "local" => {
            let mut p = OllamaProvider::new(&config.ollama.base_url, &config.ollama.model);
            if let Some(m) = model {
                p = p.with_model(m);
            }
            Ok(Arc::new(p))
        }
        _ => Err(LlmError::UnknownProvider(name.to_string())),
    }
}
