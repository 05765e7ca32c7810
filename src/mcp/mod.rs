//! MCP (Model Context Protocol) client over HTTP+SSE.
//!
//! Connects to the database MCP server and exposes its tools to the Executor.

pub mod client;
pub mod error;
pub mod sse;
pub mod transport;
pub mod types;
pub mod wrapper;

pub use client::McpClient;
pub use error::McpError;
pub use transport::SseTransport;
pub use types::{McpContent, McpToolDef, McpToolResult, ServerInfo};
pub use wrapper::{wrap_server_tools, McpToolWrapper};
