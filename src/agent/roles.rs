//! The two agents a chat session runs: the Router and the Executor.

use super::ChatAgent;
use crate::llm::LlmProvider;
use crate::tools::ToolRegistry;
use std::sync::Arc;

pub const ROUTER_NAME: &str = "llm_agent";
pub const ROUTER_ROLE: &str = "Senior SQL++ Couchbase Database Expert Engineer specializing in SQL++ Couchbase querying and optimization.";
pub const ROUTER_INSTRUCTIONS: [&str; 3] = [
    "You are an expert N1QL (Couchbase) query specialist with 10+ years of experience.",
    "ROLE: Senior N1QL/SQL++ Database Engineer specializing in JSON document querying and optimization.",
    "SESSION BEHAVIOR: For query generation, rely on the already provided schema context.",
];

pub const EXECUTOR_NAME: &str = "tools_agent";
pub const EXECUTOR_ROLE: &str = "Execution agent using couchbase mcp tools.";
pub const EXECUTOR_INSTRUCTIONS: [&str; 2] = [
    "You are an Execution agent using mcp tools to query the Couchbase.",
    "if given sql++ query, use the mcp tools to execute it. Do not change the query.",
];

/// Router: answers directly or asks for a query to be executed. Has no tools.
pub fn router_agent(llm: Arc<dyn LlmProvider>, max_iterations: usize) -> ChatAgent {
    ChatAgent::new(ROUTER_NAME, ROUTER_ROLE, llm)
        .with_instructions(ROUTER_INSTRUCTIONS)
        .with_max_iterations(max_iterations)
}

/// Executor: runs a query through the MCP tool set
pub fn executor_agent(
    llm: Arc<dyn LlmProvider>,
    tools: ToolRegistry,
    max_iterations: usize,
) -> ChatAgent {
    ChatAgent::new(EXECUTOR_NAME, EXECUTOR_ROLE, llm)
        .with_instructions(EXECUTOR_INSTRUCTIONS)
        .with_tools(tools)
        .with_max_iterations(max_iterations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::Agent;
    use crate::llm::OllamaProvider;

    fn llm() -> Arc<dyn LlmProvider> {
        Arc::new(OllamaProvider::new("http://localhost:11434", "llama3.1"))
    }

    #[test]
    fn test_router_has_no_tools() {
        let router = router_agent(llm(), 10);
        assert_eq!(router.name(), ROUTER_NAME);
        assert!(router.tools().is_none());
        assert!(router
            .system_prompt()
            .contains("rely on the already provided schema context"));
    }

    #[test]
    fn test_executor_keeps_query_unchanged_instruction() {
        let executor = executor_agent(llm(), ToolRegistry::new(), 10);
        assert_eq!(executor.name(), EXECUTOR_NAME);
        assert!(executor.tools().is_some());
        assert!(executor.system_prompt().contains("Do not change the query."));
    }
}
