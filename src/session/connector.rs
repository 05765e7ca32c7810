use crate::config::McpConfig;
use crate::mcp::{wrap_server_tools, McpClient};
use crate::tools::Tool;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Produces the Executor's tool set from an endpoint address
#[async_trait]
pub trait ToolConnector: Send + Sync {
    async fn connect(&self, url: &str) -> Result<Vec<Arc<dyn Tool>>>;
}

/// Connects to an MCP server over HTTP+SSE
///
/// Each returned tool holds the client, so the connection lives as long as
/// the session that owns the tools.
pub struct McpConnector {
    server_name: String,
    headers: HashMap<String, String>,
    connect_timeout: Duration,
}

impl McpConnector {
    pub fn from_config(config: &McpConfig) -> Self {
        Self {
            server_name: config.server_name.clone(),
            headers: config.headers.clone(),
            connect_timeout: Duration::from_secs(config.connect_timeout_secs),
        }
    }

    /// Connect and return the client itself (used by `cbchat tools`)
    pub async fn connect_client(&self, url: &str) -> Result<McpClient> {
        tracing::info!("Connecting to MCP server '{}' at {}", self.server_name, url);
        let client =
            McpClient::connect_sse(&self.server_name, url, &self.headers, self.connect_timeout)
                .await?;
        Ok(client)
    }
}

#[async_trait]
impl ToolConnector for McpConnector {
    async fn connect(&self, url: &str) -> Result<Vec<Arc<dyn Tool>>> {
        let client = self.connect_client(url).await?;
        Ok(wrap_server_tools(Arc::new(client)))
    }
}
