//! Typed errors for LLM operations
//!
//! Lets callers tell auth, quota, and transport failures apart without
//! string matching.

use thiserror::Error;

/// LLM operation errors with typed variants
#[derive(Debug, Error)]
pub enum LlmError {
    /// Authentication token is expired or invalid (HTTP 401)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Rate limit exceeded (HTTP 429)
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Malformed request (HTTP 400)
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Server-side error (HTTP 5xx)
    #[error("Service error: {0}")]
    ServiceError(String),

    /// Network connectivity issue (connection refused, timeout, etc.)
    #[error("Network error: {0}")]
    Network(String),

    /// Required credential is missing from the environment
    #[error("{0} environment variable not set")]
    MissingCredential(&'static str),

    /// Backend name is not one we know how to build
    #[error("Unknown LLM provider: {0}. Supported: openai, claude, ollama")]
    UnknownProvider(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl LlmError {
    /// Convert HTTP status code and error text into typed LlmError
    pub fn from_http_status(status: reqwest::StatusCode, error_text: String) -> Self {
        match status.as_u16() {
            401 => LlmError::Unauthorized(error_text),
            429 => LlmError::RateLimited(error_text),
            400 => LlmError::BadRequest(error_text),
            500..=599 => LlmError::ServiceError(error_text),
            _ => LlmError::Other(anyhow::anyhow!("HTTP {}: {}", status, error_text)),
        }
    }

    /// Convert network/connection errors into typed LlmError
    pub fn from_network_error(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            LlmError::Network(format!("Request timeout: {}", e))
        } else if e.is_connect() {
            LlmError::Network(format!("Connection failed: {}", e))
        } else if let Some(status) = e.status() {
            let error_text = e.to_string();
            Self::from_http_status(status, error_text)
        } else {
            LlmError::Other(e.into())
        }
    }
}

/// Send a prepared request and turn non-2xx responses into typed errors
pub(crate) async fn send_checked(
    request: reqwest::RequestBuilder,
    backend: &str,
) -> Result<reqwest::Response, LlmError> {
    let response = request.send().await.map_err(LlmError::from_network_error)?;

    if !response.status().is_success() {
        let status = response.status();
        let error_text = response.text().await.unwrap_or_default();
        tracing::error!("{} request failed ({}): {}", backend, status, error_text);
        return Err(LlmError::from_http_status(status, error_text));
    }

    Ok(response)
}
