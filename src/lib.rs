//! cbchat: natural-language chat over a database exposed through MCP tools
//!
//! This library provides:
//! - A Router agent that answers directly or asks for a query to be run
//! - An Executor agent that runs queries through the tools of an MCP server
//! - An MCP client for the HTTP+SSE transport
//! - Model backends (OpenAI-compatible, Claude, Ollama)
//! - Chat sessions with a terminal front end and an HTTP API

pub mod agent;
pub mod config;
pub mod dispatch;
pub mod llm;
pub mod mcp;
pub mod prompt;
pub mod schema;
pub mod session;
pub mod tools;
pub mod transport;

pub use config::Config;
pub use dispatch::{Dispatcher, RouterDecision, TurnOutcome};
pub use session::{ChatMessage, ChatSession, SessionError, SessionInitializer};
