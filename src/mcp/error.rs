//! Typed errors for MCP connections

use thiserror::Error;

#[derive(Debug, Error)]
pub enum McpError {
    #[error("Invalid MCP server URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Invalid header '{0}'")]
    InvalidHeader(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("MCP server returned HTTP {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("Event stream ended before the server announced its message endpoint")]
    NoEndpoint,

    #[error("Message endpoint '{0}' does not match the origin of the event stream")]
    CrossOrigin(String),

    #[error("MCP event stream closed")]
    StreamClosed,

    #[error("MCP error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("MCP response missing result")]
    MissingResult,

    #[error("Timed out after {0}s waiting for the MCP server")]
    Timeout(u64),

    #[error("Invalid MCP payload: {0}")]
    Json(#[from] serde_json::Error),
}
