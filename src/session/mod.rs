//! Chat sessions: setup and per-message handling
//!
//! A [`ChatSession`] is the explicit per-conversation context. It is built by
//! [`SessionInitializer::start`] and owns the schema description, both agents
//! and, through the Executor's tools, the MCP connection. Dropping the
//! session releases all of it.

mod connector;
mod error;
mod message;

pub use connector::{McpConnector, ToolConnector};
pub use error::SessionError;
pub use message::{ChatMessage, CollectingSink, MessageKind, MessageSink};

use crate::agent::roles::{executor_agent, router_agent};
use crate::config::Config;
use crate::dispatch::{Dispatcher, TurnOutcome};
use crate::llm::{create_provider, LlmProvider};
use crate::schema::SchemaContext;
use crate::tools::ToolRegistry;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Builds chat sessions from configuration
///
/// The model backend and the tool connector can be swapped out, which is how
/// tests run sessions without network access.
pub struct SessionInitializer {
    config: Config,
    provider: Option<Arc<dyn LlmProvider>>,
    connector: Option<Arc<dyn ToolConnector>>,
}

impl SessionInitializer {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            provider: None,
            connector: None,
        }
    }

    /// Use this backend instead of the one named in config
    pub fn with_provider(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Use this connector instead of connecting to an MCP server
    pub fn with_connector(mut self, connector: Arc<dyn ToolConnector>) -> Self {
        self.connector = Some(connector);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run session setup
    ///
    /// Steps run in a fixed order and the first failure aborts setup; nothing
    /// is retried. No session exists unless every step succeeds.
    pub async fn start(&self) -> Result<ChatSession, SessionError> {
        let schema = SchemaContext::load(&self.config.paths.schema_context)?;

        let llm = match &self.provider {
            Some(provider) => Arc::clone(provider),
            None => create_provider(&self.config.llm.provider, &self.config.llm)?,
        };
        tracing::info!("Using {} backend with model {}", llm.name(), llm.model());
        let max_iterations = self.config.agent.max_iterations;
        let router = router_agent(Arc::clone(&llm), max_iterations);

        let url = self
            .config
            .mcp_server_url()
            .ok_or(SessionError::EndpointNotConfigured)?;

        let connector = match &self.connector {
            Some(connector) => Arc::clone(connector),
            None => Arc::new(McpConnector::from_config(&self.config.mcp)),
        };
        let tools = connector
            .connect(url)
            .await
            .map_err(SessionError::Connection)?;
        if tools.is_empty() {
            return Err(SessionError::NoTools);
        }

        let registry = ToolRegistry::from_tools(tools)
            .with_tool_timeout_secs(self.config.mcp.call_timeout_secs);
        let tool_names = registry.names().into_iter().map(String::from).collect();
        let executor = executor_agent(llm, registry, max_iterations);

        let dispatcher = Dispatcher::new(
            self.config.paths.prompt_template.clone(),
            Arc::new(router),
            Arc::new(executor),
        );

        let session = ChatSession::new(schema, dispatcher).with_tool_names(tool_names);
        tracing::info!(
            session = %session.id(),
            "Session ready with tools: {}",
            session.tool_names().join(", ")
        );
        Ok(session)
    }
}

/// One conversation
pub struct ChatSession {
    id: String,
    created_at: DateTime<Utc>,
    schema: SchemaContext,
    dispatcher: Dispatcher,
    tool_names: Vec<String>,
}

impl ChatSession {
    pub fn new(schema: SchemaContext, dispatcher: Dispatcher) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            schema,
            dispatcher,
            tool_names: Vec::new(),
        }
    }

    pub fn with_tool_names(mut self, names: Vec<String>) -> Self {
        self.tool_names = names;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn schema(&self) -> &SchemaContext {
        &self.schema
    }

    /// Names of the tools the Executor can call
    pub fn tool_names(&self) -> &[String] {
        &self.tool_names
    }

    /// Handle one user message
    ///
    /// The answer or the error goes to `sink`. Errors end only this turn and
    /// the session stays usable.
    pub async fn handle_message(&self, text: &str, sink: &dyn MessageSink) -> Option<TurnOutcome> {
        tracing::debug!(session = %self.id, "Handling message: {}", text);

        match self.dispatcher.handle(text, &self.schema, sink).await {
            Ok(outcome) => {
                sink.send(ChatMessage::answer(&outcome.answer)).await;
                Some(outcome)
            }
            Err(e) => {
                tracing::error!(session = %self.id, "Turn failed: {:#}", e);
                sink.send(ChatMessage::error(format!("{:#}", e))).await;
                None
            }
        }
    }
}
