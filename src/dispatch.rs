//! Router/Executor dispatch
//!
//! The Router's reply is classified once, here, into a [`RouterDecision`].
//! Everything downstream works on the tagged value.

use crate::agent::Agent;
use crate::prompt::compose_prompt;
use crate::schema::SchemaContext;
use crate::session::{ChatMessage, MessageSink};
use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;

/// Prefix the Router uses to ask for a query to be executed
pub const TOOL_SENTINEL: &str = "Tool needed:";

/// What the Router decided for a question
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouterDecision {
    /// Final answer, already trimmed
    Answer(String),
    /// Query to hand to the Executor, already trimmed
    Query(String),
}

impl RouterDecision {
    /// Classify raw Router output
    ///
    /// The prefix test runs on the text exactly as received, so leading
    /// whitespace before the sentinel makes it an answer.
    pub fn parse(text: &str) -> Self {
        match text.strip_prefix(TOOL_SENTINEL) {
            Some(rest) => RouterDecision::Query(rest.trim().to_string()),
            None => RouterDecision::Answer(text.trim().to_string()),
        }
    }
}

/// Instruction sent to the Executor for a query
///
/// The query is passed through untouched; it is not validated here.
pub fn execution_prompt(query: &str) -> String {
    format!(
        "execute the following sql++ query using the mcp tools : {}",
        query
    )
}

/// Result of one handled question
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOutcome {
    pub answer: String,
    /// Query the Executor ran, if the Router asked for one
    pub executed_query: Option<String>,
}

/// Routes a question through the Router and, when needed, the Executor
pub struct Dispatcher {
    prompt_template: PathBuf,
    router: Arc<dyn Agent>,
    executor: Arc<dyn Agent>,
}

impl Dispatcher {
    pub fn new(
        prompt_template: impl Into<PathBuf>,
        router: Arc<dyn Agent>,
        executor: Arc<dyn Agent>,
    ) -> Self {
        Self {
            prompt_template: prompt_template.into(),
            router,
            executor,
        }
    }

    /// Handle one question
    ///
    /// Emits the "query identified" message to `sink` before the Executor
    /// runs. The final answer is returned, not emitted.
    pub async fn handle(
        &self,
        question: &str,
        schema: &SchemaContext,
        sink: &dyn MessageSink,
    ) -> Result<TurnOutcome> {
        // Template problems stop the turn before any agent is invoked
        let prompt = compose_prompt(&self.prompt_template, question, schema.as_str())?;

        let routed = self.router.run(&prompt).await?;

        match RouterDecision::parse(&routed.text) {
            RouterDecision::Answer(answer) => {
                tracing::info!("Router answered directly");
                Ok(TurnOutcome {
                    answer,
                    executed_query: None,
                })
            }
            RouterDecision::Query(query) => {
                tracing::info!("Router requested query execution");
                tracing::debug!("Query: {}", query);
                if query.is_empty() {
                    tracing::warn!("Router emitted the tool sentinel with an empty query");
                }

                sink.send(ChatMessage::query_identified(&query)).await;

                let executed = self.executor.run(&execution_prompt(&query)).await?;

                Ok(TurnOutcome {
                    answer: executed.text.trim().to_string(),
                    executed_query: Some(query),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_query() {
        assert_eq!(
            RouterDecision::parse("Tool needed: SELECT COUNT(*) FROM orders"),
            RouterDecision::Query("SELECT COUNT(*) FROM orders".to_string())
        );
    }

    #[test]
    fn test_parse_query_trims_multiline() {
        assert_eq!(
            RouterDecision::parse("Tool needed:\n  SELECT *\n  FROM orders\n\n"),
            RouterDecision::Query("SELECT *\n  FROM orders".to_string())
        );
    }

    #[test]
    fn test_parse_answer_is_trimmed() {
        assert_eq!(
            RouterDecision::parse("  There are 3 collections.\n"),
            RouterDecision::Answer("There are 3 collections.".to_string())
        );
    }

    #[test]
    fn test_leading_whitespace_defeats_sentinel() {
        assert_eq!(
            RouterDecision::parse(" Tool needed: SELECT 1"),
            RouterDecision::Answer("Tool needed: SELECT 1".to_string())
        );
    }

    #[test]
    fn test_sentinel_is_case_sensitive() {
        assert!(matches!(
            RouterDecision::parse("tool needed: SELECT 1"),
            RouterDecision::Answer(_)
        ));
    }

    #[test]
    fn test_bare_sentinel_gives_empty_query() {
        assert_eq!(
            RouterDecision::parse("Tool needed:"),
            RouterDecision::Query(String::new())
        );
    }

    #[test]
    fn test_execution_prompt() {
        assert_eq!(
            execution_prompt("SELECT 1"),
            "execute the following sql++ query using the mcp tools : SELECT 1"
        );
    }
}
