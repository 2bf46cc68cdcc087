//! Error types for the generation client.

use thiserror::Error;

use crate::config::ConfigError;

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors surfaced by the backend and the session controller.
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    /// The request could not be sent (network issues, invalid URL).
    #[error("Request error: {0}")]
    Request(String),

    /// The server answered with a non-success status.
    #[error("Server returned {status}: {message}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Server-provided message, or the raw body
        message: String,
    },

    /// The start handshake did not yield a job id and stream handle.
    #[error("Handshake failed: {0}")]
    Handshake(String),

    /// The event stream failed.
    #[error("Connection error: {0}")]
    Connection(String),

    /// The session was cancelled before the operation finished.
    #[error("Generation cancelled")]
    Cancelled,

    /// A body could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::Serialization(e.to_string())
        } else {
            Self::Request(e.to_string())
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

impl From<ConfigError> for ClientError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_display() {
        let err = ClientError::Status { status: 503, message: "Service unavailable".to_string() };
        assert_eq!(err.to_string(), "Server returned 503: Service unavailable");
    }

    #[test]
    fn test_config_conversion() {
        let err: ClientError = ConfigError::Parse("bad toml".to_string()).into();
        assert!(matches!(err, ClientError::Config(msg) if msg.contains("bad toml")));
    }
}
