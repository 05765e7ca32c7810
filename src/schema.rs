//! Schema description handed to the Router with every question

use crate::session::SessionError;
use std::path::Path;

/// Schema description text, loaded once per session and never parsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaContext(String);

impl SchemaContext {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    /// Read the schema artifact produced by the discovery step
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SessionError> {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(text) => {
                tracing::debug!("Loaded schema context from {} ({} bytes)", path.display(), text.len());
                Ok(Self(text))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(SessionError::SchemaMissing {
                path: path.to_path_buf(),
            }),
            Err(e) => Err(SessionError::Io {
                path: path.to_path_buf(),
                source: e,
            }),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}
