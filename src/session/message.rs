//! User-visible chat messages and where they go

use super::SessionError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Ready,
    QueryIdentified,
    Answer,
    Error,
}

/// A message shown to the user, rendered as markdown
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub kind: MessageKind,
    pub content: String,
}

impl ChatMessage {
    fn new(kind: MessageKind, content: String) -> Self {
        Self { kind, content }
    }

    pub fn ready() -> Self {
        Self::new(
            MessageKind::Ready,
            "✅ Couchbase Agent is ready. How can I help?".to_string(),
        )
    }

    pub fn query_identified(query: &str) -> Self {
        Self::new(
            MessageKind::QueryIdentified,
            format!(
                "⚙️ **Tool identified.** Executing query:\n```sql\n{}\n```",
                query
            ),
        )
    }

    pub fn answer(answer: &str) -> Self {
        Self::new(MessageKind::Answer, format!("✅ **Answer:** {}", answer))
    }

    /// Failure while handling a turn
    pub fn error(err: impl fmt::Display) -> Self {
        Self::new(
            MessageKind::Error,
            format!("🚨 An error occurred during processing: {}", err),
        )
    }

    /// Failure while starting a session
    pub fn setup_error(err: &SessionError) -> Self {
        Self::new(MessageKind::Error, format!("Error: {}", err))
    }
}

impl fmt::Display for ChatMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.content)
    }
}

/// Destination for chat messages
#[async_trait]
pub trait MessageSink: Send + Sync {
    async fn send(&self, message: ChatMessage);
}

/// Sink that keeps every message in memory
#[derive(Debug, Default)]
pub struct CollectingSink {
    messages: Mutex<Vec<ChatMessage>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove and return everything collected so far
    pub fn take(&self) -> Vec<ChatMessage> {
        match self.messages.lock() {
            Ok(mut messages) => std::mem::take(&mut *messages),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }
}

#[async_trait]
impl MessageSink for CollectingSink {
    async fn send(&self, message: ChatMessage) {
        match self.messages.lock() {
            Ok(mut messages) => messages.push(message),
            Err(poisoned) => poisoned.into_inner().push(message),
        }
    }
}
