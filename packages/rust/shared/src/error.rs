//! Error types for SchemaScribe.
//!
//! Library crates use [`SchemaScribeError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all SchemaScribe operations.
#[derive(Debug, thiserror::Error)]
pub enum SchemaScribeError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error talking to the upstream service or an LLM provider.
    #[error("network error: {0}")]
    Network(String),

    /// Schema integrity violation (duplicate argument key, unresolvable type
    /// reference, missing module). Aborts the current reconciliation.
    #[error("schema integrity error: {message}")]
    Schema { message: String },

    /// Catalog database error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Summarization error (prompt rendering, provider call, or output parsing).
    #[error("summarization error: {0}")]
    Summarize(String),

    /// An expected-empty result set. Callers treat this as a normal
    /// empty-result condition, not a failure.
    #[error("no data")]
    NoData,

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (unsupported catalog version, invalid input, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, SchemaScribeError>;

impl SchemaScribeError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a schema-integrity error from any displayable message.
    pub fn schema(msg: impl Into<String>) -> Self {
        Self::Schema {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// True for the recoverable empty-result condition.
    pub fn is_no_data(&self) -> bool {
        matches!(self, Self::NoData)
    }
}
