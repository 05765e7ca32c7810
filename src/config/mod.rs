//! Configuration management for cbchat
//!
//! Values are resolved in layers, lowest precedence first: built-in defaults,
//! the TOML config file, a `.env` file in the working directory, process
//! environment variables, and finally CLI flags (applied by the caller via
//! [`Config::apply_overrides`]).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable selecting the model backend
pub const ENV_LLM_PROVIDER: &str = "CBCHAT_LLM_PROVIDER";
/// Older name for the backend selector, read when `CBCHAT_LLM_PROVIDER` is unset
pub const ENV_LLM_PROVIDER_LEGACY: &str = "DAPR_LLM_COMPONENT_DEFAULT";
/// Environment variable overriding the backend's model
pub const ENV_LLM_MODEL: &str = "CBCHAT_LLM_MODEL";
/// Environment variable holding the MCP server address
pub const ENV_MCP_SERVER_URL: &str = "MCP_SERVER_URL";

/// Errors raised while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub llm: LlmConfig,
    pub mcp: McpConfig,
    pub paths: PathsConfig,
    pub agent: AgentConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Backend name: openai, claude, ollama
    pub provider: String,
    /// Model override applied to whichever backend is selected
    pub model: Option<String>,
    pub openai: OpenAiConfig,
    pub claude: ClaudeConfig,
    pub ollama: OllamaConfig,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: None,
            openai: OpenAiConfig::default(),
            claude: ClaudeConfig::default(),
            ollama: OllamaConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiConfig {
    pub model: String,
    pub max_tokens: usize,
    /// Chat Completions base URL; point at any OpenAI-compatible server
    pub base_url: String,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o".to_string(),
            max_tokens: 4096,
            base_url: "https://api.openai.com/v1".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClaudeConfig {
    pub model: String,
    pub max_tokens: usize,
}

impl Default for ClaudeConfig {
    fn default() -> Self {
        Self {
            model: "claude-sonnet-4-20250514".to_string(),
            max_tokens: 4096,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaConfig {
    pub base_url: String,
    pub model: String,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "llama3.1".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct McpConfig {
    /// SSE endpoint of the MCP server; required to start a session
    pub server_url: Option<String>,
    /// Logical name for the server, used in logs and the client handshake
    pub server_name: String,
    /// Bound on the whole connect + initialize + tools/list handshake
    pub connect_timeout_secs: u64,
    /// Bound on a single tools/call
    pub call_timeout_secs: u64,
    /// Extra HTTP headers sent to the server; values may reference `${VAR}`
    pub headers: HashMap<String, String>,
}

impl Default for McpConfig {
    fn default() -> Self {
        Self {
            server_url: None,
            server_name: "couchbase_mcp".to_string(),
            connect_timeout_secs: 60,
            call_timeout_secs: 60,
            headers: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Router prompt template with `{user_question}` and `{schema_context}`
    pub prompt_template: PathBuf,
    /// Pre-generated schema description artifact
    pub schema_context: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            prompt_template: PathBuf::from("prompts").join("llm_router_prompt.txt"),
            schema_context: PathBuf::from("schema_context.json"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Upper bound on model calls per agent run (tool loop iterations)
    pub max_iterations: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self { max_iterations: 10 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// HTTP sessions with no activity for this long are ended (0 keeps them)
    pub session_idle_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            session_idle_secs: 1800,
        }
    }
}

/// Overrides supplied on the command line
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub mcp_url: Option<String>,
}

impl Config {
    /// Load configuration from the default location, `.env`, and the environment
    pub fn load() -> Result<Self, ConfigError> {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Self::load_layers(None),
        }
    }

    /// Load configuration from an explicit file path
    ///
    /// A missing file is not an error; defaults are used instead.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        Self::load_layers(Some(path))
    }

    fn load_layers(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) if path.exists() => Self::from_file(path)?,
            _ => Config::default(),
        };

        // .env never overrides variables that are already set
        if let Ok(env_path) = dotenvy::dotenv() {
            tracing::debug!("Loaded environment from {}", env_path.display());
        }

        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Get the configuration file path
    pub fn config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "cbchat")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Apply environment variables through a lookup function
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        // Blank values never clear what the file set
        let non_blank = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(provider) =
            non_blank(ENV_LLM_PROVIDER).or_else(|| non_blank(ENV_LLM_PROVIDER_LEGACY))
        {
            self.llm.provider = provider.trim().to_string();
        }
        if let Some(model) = non_blank(ENV_LLM_MODEL) {
            self.llm.model = Some(model.trim().to_string());
        }
        if let Some(url) = non_blank(ENV_MCP_SERVER_URL) {
            self.mcp.server_url = Some(url.trim().to_string());
        }
    }

    /// Apply command-line overrides (highest precedence)
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(ref provider) = overrides.provider {
            self.llm.provider = provider.clone();
        }
        if let Some(ref model) = overrides.model {
            self.llm.model = Some(model.clone());
        }
        if let Some(ref url) = overrides.mcp_url {
            self.mcp.server_url = Some(url.clone());
        }
    }

    /// The MCP endpoint, if one is configured and non-blank
    pub fn mcp_server_url(&self) -> Option<&str> {
        self.mcp
            .server_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.llm.provider, "openai");
        assert_eq!(config.mcp.connect_timeout_secs, 60);
        assert_eq!(
            config.paths.prompt_template,
            PathBuf::from("prompts/llm_router_prompt.txt")
        );
        assert_eq!(config.paths.schema_context, PathBuf::from("schema_context.json"));
        assert!(config.mcp_server_url().is_none());
        assert_eq!(config.server.session_idle_secs, 1800);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            [llm]
            provider = "ollama"

            [mcp]
            server_url = "http://localhost:8080/sse"
            "#,
        )
        .unwrap();

        assert_eq!(config.llm.provider, "ollama");
        assert_eq!(config.llm.openai.model, "gpt-4o");
        assert_eq!(config.mcp_server_url(), Some("http://localhost:8080/sse"));
        assert_eq!(config.mcp.server_name, "couchbase_mcp");
    }

    #[test]
    fn test_env_overrides_file_values() {
        let mut config = Config::default();
        config.apply_env(|key| match key {
            ENV_LLM_PROVIDER => Some("claude".to_string()),
            ENV_MCP_SERVER_URL => Some("http://mcp:9000/sse".to_string()),
            _ => None,
        });

        assert_eq!(config.llm.provider, "claude");
        assert_eq!(config.mcp_server_url(), Some("http://mcp:9000/sse"));
        assert!(config.llm.model.is_none());
    }

    #[test]
    fn test_blank_provider_env_keeps_default() {
        let mut config = Config::default();
        config.apply_env(|key| (key == ENV_LLM_PROVIDER).then(|| "  ".to_string()));
        assert_eq!(config.llm.provider, "openai");
    }

    #[test]
    fn test_blank_env_url_keeps_file_url() {
        let mut config: Config = toml::from_str(
            r#"
            [mcp]
            server_url = "http://mcp:8080/sse"
            "#,
        )
        .unwrap();

        config.apply_env(|key| (key == ENV_MCP_SERVER_URL).then(String::new));
        assert_eq!(config.mcp_server_url(), Some("http://mcp:8080/sse"));

        config.apply_env(|key| (key == ENV_MCP_SERVER_URL).then(|| " \t".to_string()));
        assert_eq!(config.mcp_server_url(), Some("http://mcp:8080/sse"));
    }

    #[test]
    fn test_legacy_provider_variable_is_a_fallback() {
        let mut config = Config::default();
        config.apply_env(|key| (key == ENV_LLM_PROVIDER_LEGACY).then(|| "ollama".to_string()));
        assert_eq!(config.llm.provider, "ollama");

        let mut config = Config::default();
        config.apply_env(|key| match key {
            ENV_LLM_PROVIDER => Some("claude".to_string()),
            ENV_LLM_PROVIDER_LEGACY => Some("ollama".to_string()),
            _ => None,
        });
        assert_eq!(config.llm.provider, "claude");
    }

    #[test]
    fn test_blank_server_url_counts_as_unset() {
        let mut config = Config::default();
        config.mcp.server_url = Some("   ".to_string());
        assert!(config.mcp_server_url().is_none());
    }

    #[test]
    fn test_cli_overrides_win() {
        let mut config = Config::default();
        config.apply_env(|key| (key == ENV_LLM_PROVIDER).then(|| "claude".to_string()));
        config.apply_overrides(&ConfigOverrides {
            provider: Some("ollama".to_string()),
            model: Some("qwen2.5".to_string()),
            mcp_url: None,
        });

        assert_eq!(config.llm.provider, "ollama");
        assert_eq!(config.llm.model.as_deref(), Some("qwen2.5"));
    }

    #[test]
    fn test_load_from_invalid_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[llm\nprovider = 1").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("config.toml"));
    }
}
