//! Structured Output Errors

use panelsim_llm::LlmError;
use thiserror::Error;

use crate::schema::SchemaViolation;

/// Raw text kept in errors is cut to this many characters.
pub const RAW_PREVIEW_CHARS: usize = 500;

/// Why a response could not be turned into a schema-valid object.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExtractionError {
    #[error("No structured block found in response")]
    NoBlock { raw: String },

    #[error("Malformed structured block: {message}")]
    Parse { message: String, raw: String },

    #[error("Schema validation failed: {violation}")]
    Schema { violation: String, raw: String },
}

impl ExtractionError {
    pub fn no_block(raw: &str) -> Self {
        Self::NoBlock {
            raw: truncate_raw(raw),
        }
    }

    pub fn parse(message: impl Into<String>, raw: &str) -> Self {
        Self::Parse {
            message: message.into(),
            raw: truncate_raw(raw),
        }
    }

    pub fn schema(violation: &SchemaViolation, raw: &str) -> Self {
        Self::Schema {
            violation: violation.to_string(),
            raw: truncate_raw(raw),
        }
    }

    /// The offending response text (truncated).
    pub fn raw(&self) -> &str {
        match self {
            Self::NoBlock { raw } | Self::Parse { raw, .. } | Self::Schema { raw, .. } => raw,
        }
    }
}

/// Failure of a single generate-and-extract attempt.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StructuredError {
    #[error("{0}")]
    Backend(#[from] LlmError),

    #[error("{0}")]
    Extraction(#[from] ExtractionError),
}

impl StructuredError {
    /// Malformed output and transient backend errors are worth another ask.
    pub fn is_retryable(&self) -> bool {
        match self {
            StructuredError::Backend(e) => e.is_transient(),
            StructuredError::Extraction(_) => true,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, StructuredError::Backend(e) if e.is_cancelled())
    }
}

/// Cut `raw` to `RAW_PREVIEW_CHARS` characters, respecting char boundaries.
pub fn truncate_raw(raw: &str) -> String {
    if raw.chars().count() <= RAW_PREVIEW_CHARS {
        raw.to_string()
    } else {
        let mut cut: String = raw.chars().take(RAW_PREVIEW_CHARS).collect();
        cut.push_str("...");
        cut
    }
}
