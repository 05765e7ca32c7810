//! Adapts MCP tools to the `Tool` trait.

use super::client::McpClient;
use super::types::McpToolDef;
use crate::tools::{Tool, ToolResult};
use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Wraps one tool of a connected MCP server
pub struct McpToolWrapper {
    tool_def: McpToolDef,
    client: Arc<McpClient>,
}

impl McpToolWrapper {
    pub fn new(tool_def: McpToolDef, client: Arc<McpClient>) -> Self {
        Self { tool_def, client }
    }
}

#[async_trait]
impl Tool for McpToolWrapper {
    fn name(&self) -> &str {
        &self.tool_def.name
    }

    fn description(&self) -> &str {
        &self.tool_def.description
    }

    fn parameters(&self) -> Value {
        match &self.tool_def.input_schema {
            Value::Null => serde_json::json!({"type": "object", "properties": {}}),
            schema => schema.clone(),
        }
    }

    async fn execute(&self, params: Value) -> Result<ToolResult> {
        if !self.client.is_connected() {
            return Ok(ToolResult::error(format!(
                "MCP server '{}' is not connected. Start a new chat to reconnect.",
                self.client.server_name()
            )));
        }

        match self.client.call_tool(&self.tool_def.name, params).await {
            Ok(result) if result.is_error => Ok(ToolResult::error(result.to_text())),
            Ok(result) => Ok(ToolResult::success(result.to_text())),
            Err(e) => Ok(ToolResult::error(format!("MCP call failed: {}", e))),
        }
    }
}

/// Create tool wrappers for every tool the server exposes
pub fn wrap_server_tools(client: Arc<McpClient>) -> Vec<Arc<dyn Tool>> {
    client
        .tools()
        .iter()
        .cloned()
        .map(|tool_def| Arc::new(McpToolWrapper::new(tool_def, Arc::clone(&client))) as Arc<dyn Tool>)
        .collect()
}
