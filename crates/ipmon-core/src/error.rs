//! Error types for the IP monitor
//!
//! Every failure mode of a reconciliation cycle has its own variant so the
//! reconciler can decide how to recover without inspecting message text.

use thiserror::Error;

/// Result type alias for IP monitor operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the IP monitor
#[derive(Error, Debug)]
pub enum Error {
    /// Missing, unreadable or invalid local configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// No qualifying interface or address was found
    #[error("No usable network interface: {0}")]
    Selection(String),

    /// Remote fetch failed or returned malformed content
    #[error("Remote read error: {0}")]
    RemoteRead(String),

    /// Remote write failed
    #[error("Remote write error: {0}")]
    RemoteWrite(String),

    /// Conditional write rejected because the remote version moved on
    #[error("Remote conflict: {0}")]
    RemoteConflict(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Local I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a selection error
    pub fn selection(msg: impl Into<String>) -> Self {
        Self::Selection(msg.into())
    }

    /// Create a remote read error
    pub fn remote_read(msg: impl Into<String>) -> Self {
        Self::RemoteRead(msg.into())
    }

    /// Create a remote write error
    pub fn remote_write(msg: impl Into<String>) -> Self {
        Self::RemoteWrite(msg.into())
    }

    /// Create a remote conflict error
    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::RemoteConflict(msg.into())
    }

    /// Whether this error is a failed write precondition
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::RemoteConflict(_))
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
