// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Error types for the mirror service.
//!
//! Errors are categorized by the collaborator they come from (the spreadsheet
//! source, the SQLite store, etc.) and carry enough context to debug a failed
//! sync cycle from the logs alone.
//!
//! # Error Categories
//!
//! | Error Type | Retryable | Description |
//! |------------|-----------|-------------|
//! | `Source` | Yes | Network/auth errors reaching the spreadsheet API |
//! | `Store` | No | Local SQLite errors (needs operator attention) |
//! | `Parse` | No | Sheet payload malformed (duplicate headers, bad JSON) |
//! | `Config` | No | Configuration invalid |
//! | `InvalidState` | No | Engine lifecycle violation |
//! | `Shutdown` | No | Engine is shutting down |
//! | `Internal` | No | Unexpected internal error |
//!
//! # Retry Behavior
//!
//! Use [`MirrorError::is_retryable()`] to decide whether an operation should
//! be retried with backoff. Retryable errors indicate transient network or
//! availability issues. Non-retryable errors indicate bugs, configuration
//! problems, or malformed data at the source.

use thiserror::Error;

/// Result type alias for mirror operations.
pub type Result<T> = std::result::Result<T, MirrorError>;

/// Errors that can occur while mirroring.
///
/// Each variant includes context about where the error occurred.
/// Use [`is_retryable()`](Self::is_retryable) to check if the operation
/// should be retried.
#[derive(Error, Debug)]
pub enum MirrorError {
    /// Failure reaching or reading the external spreadsheet source.
    ///
    /// Covers transport errors, timeouts, and non-success HTTP statuses.
    /// These are typically retryable.
    #[error("Source error ({operation}): {message}")]
    Source {
        operation: String,
        message: String,
        #[source]
        source: Option<reqwest::Error>,
    },

    /// SQLite error from the mirror store.
    ///
    /// Not retryable - indicates local database issues that need attention.
    #[error("Store error: {0}")]
    Store(#[from] sqlx::Error),

    /// Sheet payload could not be interpreted as a record grid.
    ///
    /// Occurs on duplicate header names or a response body that is not the
    /// expected values shape. Not retryable - the data is malformed at the
    /// source.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Invalid or missing configuration.
    ///
    /// Not retryable - fix the configuration and restart.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Engine lifecycle violation.
    ///
    /// Occurs when an operation is attempted in the wrong state
    /// (e.g., calling `start()` on an already-running engine).
    /// Not retryable - indicates a bug in the caller.
    #[error("Invalid state: expected {expected}, got {actual}")]
    InvalidState { expected: String, actual: String },

    /// Shutdown in progress.
    ///
    /// Returned when operations are attempted during shutdown.
    #[error("Shutdown in progress")]
    Shutdown,

    /// Unexpected internal error.
    ///
    /// Catch-all for errors that shouldn't happen.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl MirrorError {
    /// Create a source error from a reqwest error.
    pub fn source(operation: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Source {
            operation: operation.into(),
            message: source.to_string(),
            source: Some(source),
        }
    }

    /// Create a source error without an underlying cause.
    pub fn source_msg(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Source {
            operation: operation.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Source { .. } => true, // Network errors are retryable
            Self::Store(_) => false,     // Local DB issues need attention
            Self::Parse(_) => false,     // Malformed at the source
            Self::Config(_) => false,
            Self::InvalidState { .. } => false,
            Self::Shutdown => false,
            Self::Internal(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_retryable_source() {
        let err = MirrorError::source_msg("values_get", "connection reset");
        assert!(err.is_retryable());
        assert!(err.to_string().contains("values_get"));
    }

    #[test]
    fn test_not_retryable_parse() {
        let err = MirrorError::Parse("duplicate header: id".to_string());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_not_retryable_config() {
        let err = MirrorError::Config("missing document id".to_string());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_not_retryable_invalid_state() {
        let err = MirrorError::InvalidState {
            expected: "Created".to_string(),
            actual: "Running".to_string(),
        };
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("Created"));
        assert!(err.to_string().contains("Running"));
    }

    #[test]
    fn test_not_retryable_shutdown() {
        assert!(!MirrorError::Shutdown.is_retryable());
    }

    #[test]
    fn test_not_retryable_internal() {
        let err = MirrorError::Internal("unexpected".to_string());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_source_error_formatting() {
        let err = MirrorError::Source {
            operation: "values_get".to_string(),
            message: "timeout".to_string(),
            source: None,
        };
        let msg = err.to_string();
        assert!(msg.contains("Source error"));
        assert!(msg.contains("values_get"));
        assert!(msg.contains("timeout"));
    }

    #[test]
    fn test_store_error_from_sqlx() {
        let err: MirrorError = sqlx::Error::RowNotFound.into();
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("Store error"));
    }
}
