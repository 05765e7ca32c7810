//! MCP client for a single server reached over HTTP+SSE.

use super::error::McpError;
use super::transport::SseTransport;
use super::types::{
    InitializeResult, ListToolsResult, McpToolDef, McpToolResult, ServerInfo, PROTOCOL_VERSION,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;

/// Guard against servers that keep handing out cursors
const MAX_TOOL_PAGES: usize = 32;

/// A connected, initialized MCP server
pub struct McpClient {
    server_name: String,
    transport: SseTransport,
    server_info: ServerInfo,
    tools: Vec<McpToolDef>,
}

impl McpClient {
    /// Connect, run the initialize handshake and discover tools
    ///
    /// The whole sequence is bounded by `connect_timeout`.
    pub async fn connect_sse(
        server_name: &str,
        url: &str,
        headers: &HashMap<String, String>,
        connect_timeout: Duration,
    ) -> Result<Self, McpError> {
        match tokio::time::timeout(connect_timeout, Self::handshake(server_name, url, headers))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(McpError::Timeout(connect_timeout.as_secs())),
        }
    }

    async fn handshake(
        server_name: &str,
        url: &str,
        headers: &HashMap<String, String>,
    ) -> Result<Self, McpError> {
        let transport = SseTransport::connect(url, headers).await?;

        let init = transport
            .request(
                "initialize",
                Some(json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": {},
                    "clientInfo": {
                        "name": "cbchat",
                        "version": env!("CARGO_PKG_VERSION")
                    }
                })),
            )
            .await?;
        let init: InitializeResult = serde_json::from_value(init)?;

        if !init.protocol_version.is_empty() && init.protocol_version != PROTOCOL_VERSION {
            tracing::warn!(
                "MCP server '{}' negotiated protocol {}, expected {}",
                server_name,
                init.protocol_version,
                PROTOCOL_VERSION
            );
        }

        transport.notify("notifications/initialized", None).await?;

        let tools = if init.capabilities.tools.is_some() {
            list_tools(&transport).await?
        } else {
            tracing::warn!("MCP server '{}' does not advertise tools", server_name);
            Vec::new()
        };

        tracing::info!(
            "Connected to MCP server '{}' ({} {}) with {} tools",
            server_name,
            init.server_info.name,
            init.server_info.version,
            tools.len()
        );

        Ok(Self {
            server_name: server_name.to_string(),
            transport,
            server_info: init.server_info,
            tools,
        })
    }

    pub fn server_name(&self) -> &str {
        &self.server_name
    }

    pub fn server_info(&self) -> &ServerInfo {
        &self.server_info
    }

    /// Tools discovered during the handshake
    pub fn tools(&self) -> &[McpToolDef] {
        &self.tools
    }

    pub fn is_connected(&self) -> bool {
        !self.transport.is_closed()
    }

    /// Call a tool on the server
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<McpToolResult, McpError> {
        let arguments = match arguments {
            Value::Null => json!({}),
            other => other,
        };

        let result = self
            .transport
            .request(
                "tools/call",
                Some(json!({
                    "name": name,
                    "arguments": arguments
                })),
            )
            .await?;

        Ok(serde_json::from_value(result)?)
    }
}

async fn list_tools(transport: &SseTransport) -> Result<Vec<McpToolDef>, McpError> {
    let mut tools = Vec::new();
    let mut cursor: Option<String> = None;

    for _ in 0..MAX_TOOL_PAGES {
        let params = cursor.as_ref().map(|c| json!({ "cursor": c }));
        let page: ListToolsResult =
            serde_json::from_value(transport.request("tools/list", params).await?)?;
        tools.extend(page.tools);

        match page.next_cursor {
            Some(next) if !next.is_empty() => cursor = Some(next),
            _ => return Ok(tools),
        }
    }

    tracing::warn!("Stopped listing MCP tools after {} pages", MAX_TOOL_PAGES);
    Ok(tools)
}
