//! Router prompt template
//!
//! Templates use brace placeholders: `{user_question}` and `{schema_context}`
//! are substituted, `{{` and `}}` produce literal braces, and anything else in
//! braces is rejected.

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const USER_QUESTION_FIELD: &str = "user_question";
pub const SCHEMA_CONTEXT_FIELD: &str = "schema_context";

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("Prompt template not found: {}", path.display())]
    TemplateNotFound { path: PathBuf },

    #[error("Failed to read prompt template {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Unknown placeholder '{{{0}}}' in prompt template")]
    UnknownField(String),

    #[error("Malformed prompt template: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    UserQuestion,
    SchemaContext,
}

/// A parsed prompt template
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    segments: Vec<Segment>,
}

impl PromptTemplate {
    /// Read and parse a template file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PromptError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => PromptError::TemplateNotFound {
                path: path.to_path_buf(),
            },
            _ => PromptError::Read {
                path: path.to_path_buf(),
                source: e,
            },
        })?;
        Self::parse(&source)
    }

    /// Parse template text
    pub fn parse(source: &str) -> Result<Self, PromptError> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = source.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    literal.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    literal.push('}');
                }
                '}' => {
                    return Err(PromptError::Malformed(
                        "single '}' encountered in format string".to_string(),
                    ))
                }
                '{' => {
                    let mut field = String::new();
                    loop {
                        match chars.next() {
                            Some('}') => break,
                            Some('{') => {
                                return Err(PromptError::Malformed(
                                    "unexpected '{' in field name".to_string(),
                                ))
                            }
                            Some(ch) => field.push(ch),
                            None => {
                                return Err(PromptError::Malformed(
                                    "single '{' encountered in format string".to_string(),
                                ))
                            }
                        }
                    }

                    let segment = match field.as_str() {
                        USER_QUESTION_FIELD => Segment::UserQuestion,
                        SCHEMA_CONTEXT_FIELD => Segment::SchemaContext,
                        _ => return Err(PromptError::UnknownField(field)),
                    };
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(segment);
                }
                other => literal.push(other),
            }
        }

        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self { segments })
    }

    /// Substitute the question and schema; values are inserted verbatim
    pub fn render(&self, user_question: &str, schema_context: &str) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::UserQuestion => out.push_str(user_question),
                Segment::SchemaContext => out.push_str(schema_context),
            }
        }
        out
    }
}

/// Load the template at `path` and fill it in
///
/// The file is read on every call, so edits take effect on the next turn.
pub fn compose_prompt(
    path: impl AsRef<Path>,
    user_question: &str,
    schema_context: &str,
) -> Result<String, PromptError> {
    Ok(PromptTemplate::load(path)?.render(user_question, schema_context))
}
