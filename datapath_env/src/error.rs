//! Error types for the DataPath environment abstraction.

use thiserror::Error;

/// Errors that can occur in the environment abstraction layer.
#[derive(Debug, Error)]
pub enum EnvError {
    /// HTTP transport failed (DNS, refused connection, TLS, ...)
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Local file system access failed for a reason other than "missing"
    #[error("I/O error: {0}")]
    IoError(String),

    /// The operation was cancelled before it completed
    #[error("Cancelled: {0}")]
    Cancelled(String),

    /// Operation timed out
    #[error("Timeout after {0}ms")]
    Timeout(u64),
}

impl EnvError {
    /// Creates a network error.
    pub fn network(msg: impl Into<String>) -> Self {
        Self::NetworkError(msg.into())
    }

    /// Creates an I/O error.
    pub fn io(err: impl std::fmt::Display) -> Self {
        Self::IoError(err.to_string())
    }

    /// Creates a cancellation error.
    pub fn cancelled(what: impl std::fmt::Display) -> Self {
        Self::Cancelled(what.to_string())
    }
}
