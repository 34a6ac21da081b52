//! Error types for blogsmith.
//!
//! Library crates use [`BlogsmithError`] via `thiserror`.
//! The CLI binary wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all blogsmith operations.
#[derive(Debug, thiserror::Error)]
pub enum BlogsmithError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Transient external failure (network, timeout, rate limit).
    /// Eligible for bounded retry; see [`crate::retry`].
    #[error("transient external error: {0}")]
    Transient(String),

    /// Terminal failure from an external provider (AI, search, notes).
    #[error("provider error: {0}")]
    Provider(String),

    /// Malformed or empty input to a step. Never retried.
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Model output that could not be parsed into the expected shape.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// A pipeline step failed after local retries were exhausted.
    #[error("step '{step}' failed: {message}")]
    StepFailed { step: String, message: String },

    /// No checkpoint exists for the requested id.
    #[error("checkpoint not found: {0}")]
    CheckpointNotFound(String),

    /// A checkpoint file exists but cannot be read or parsed.
    #[error("checkpoint corrupt at {path:?}: {message}")]
    CheckpointCorrupt { path: PathBuf, message: String },

    /// Database or storage layer error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, BlogsmithError>;

impl BlogsmithError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
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

    /// Wrap a step failure with the step name for resume reporting.
    pub fn step_failed(step: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::StepFailed {
            step: step.into(),
            message: msg.into(),
        }
    }

    /// Whether this error is worth retrying with backoff.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}
