use crate::llm::LlmError;
use std::path::PathBuf;
use thiserror::Error;

/// Reasons a chat session could not be started
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("`{}` not found. Please run the schema discovery script first to generate it.", path.display())]
    SchemaMissing { path: PathBuf },

    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to initialize LLM backend: {0}")]
    Provider(#[from] LlmError),

    #[error("MCP_SERVER_URL environment variable not set.")]
    EndpointNotConfigured,

    #[error("Failed to connect to MCP Server: {0:#}")]
    Connection(#[source] anyhow::Error),

    #[error("Tools not initialized. Please restart the chat.")]
    NoTools,
}
