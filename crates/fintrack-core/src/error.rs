//! Error types for fintrack-core

use thiserror::Error;

/// Result type alias using fintrack-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the remote collaborators (REST, Realtime, in-memory backend)
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP transport error
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Realtime socket error
    #[error("Realtime socket error: {0}")]
    WebSocket(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Remote API rejected the request
    #[error("API error: {message} ({status})")]
    Api { status: u16, message: String },

    /// Payload rejected before or by the remote
    #[error("Invalid input: {0}")]
    Validation(String),

    /// Missing or rejected credentials, or row-level authorization failure
    #[error("Not authorized: {0}")]
    Unauthorized(String),

    /// Row not found
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Client is misconfigured
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl Error {
    /// Whether the failure is worth retrying (transport-level rather than a rejection).
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Http(_) | Self::WebSocket(_) => true,
            Self::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for Error {
    fn from(value: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::WebSocket(value.to_string())
    }
}
