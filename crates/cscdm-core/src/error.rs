//! Error types for the zone edit dispatcher
//!
//! This module defines all error types used throughout the crate.
//!
//! Errors are `Clone` because a single zone-level failure is delivered to
//! every caller whose record was part of that zone's batch.

use thiserror::Error;

/// Result type alias for dispatcher operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the zone edit dispatcher
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Network-level failure talking to the backend
    #[error("Transport error: {0}")]
    Transport(String),

    /// Non-success HTTP status from the backend
    #[error("HTTP error ({status}): {message}")]
    Http {
        /// HTTP status code
        status: u16,
        /// Response detail
        message: String,
    },

    /// Structured error body returned by the backend
    #[error("API error {code}: {description}")]
    Api {
        /// Backend error code (e.g. `OPEN_ZONE_EDITS`)
        code: String,
        /// Human readable description
        description: String,
    },

    /// The backend reported the zone edit as FAILED
    #[error("Zone edit failed: {0}")]
    EditFailed(String),

    /// Record not found in the zone snapshot
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Record type not present in the zone snapshot
    #[error("Unsupported record type: {0}")]
    UnsupportedRecordType(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(String),

    /// A pending caller's result channel was closed without a value
    #[error("Channel closed: {0}")]
    ChannelClosed(String),

    /// No pending caller is registered for a correlation key
    #[error("No pending request for {0}")]
    MissingSlot(String),

    /// The client has been stopped and no longer accepts work
    #[error("Client stopped")]
    Stopped,

    /// One or more zones failed during a flush
    #[error("{failures} error(s) in batch zone edits: {message}")]
    Flush {
        /// Number of failed zones
        failures: usize,
        /// Concatenated per-zone messages
        message: String,
    },

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a transport error
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create an HTTP status error
    pub fn http(status: u16, msg: impl Into<String>) -> Self {
        Self::Http {
            status,
            message: msg.into(),
        }
    }

    /// Create a backend API error
    pub fn api(code: impl Into<String>, description: impl Into<String>) -> Self {
        Self::Api {
            code: code.into(),
            description: description.into(),
        }
    }

    /// Create an edit failure error
    pub fn edit_failed(msg: impl Into<String>) -> Self {
        Self::EditFailed(msg.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an unsupported record type error
    pub fn unsupported_record_type(msg: impl Into<String>) -> Self {
        Self::UnsupportedRecordType(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a channel closed error
    pub fn channel_closed(msg: impl Into<String>) -> Self {
        Self::ChannelClosed(msg.into())
    }

    /// Prefix the message with zone context, keeping the variant
    pub fn in_zone(self, context: &str) -> Self {
        match self {
            Self::Transport(m) => Self::Transport(format!("{context}: {m}")),
            Self::Http { status, message } => Self::Http {
                status,
                message: format!("{context}: {message}"),
            },
            Self::Api { code, description } => Self::Api {
                code,
                description: format!("{context}: {description}"),
            },
            Self::EditFailed(m) => Self::EditFailed(format!("{context}: {m}")),
            Self::NotFound(m) => Self::NotFound(format!("{context}: {m}")),
            Self::UnsupportedRecordType(m) => Self::UnsupportedRecordType(format!("{context}: {m}")),
            Self::Json(m) => Self::Json(format!("{context}: {m}")),
            other => Self::Other(format!("{context}: {other}")),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
