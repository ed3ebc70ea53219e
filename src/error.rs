//! Error types for a3s-relay

use thiserror::Error;

/// Errors that can occur while relaying
#[derive(Debug, Error)]
pub enum RelayError {
    /// Missing or invalid credential on a privileged action
    #[error("Unauthorized: {0}")]
    Authorization(String),

    /// A required external dependency is not configured
    #[error("{0}")]
    NotConfigured(String),

    /// Translation or credential-issuing service failure
    #[error("{0}")]
    Upstream(String),

    /// Malformed or unrecognized envelope
    #[error("{0}")]
    Validation(String),

    /// Durable connection store failure
    #[error("Store error: {0}")]
    Store(String),

    /// Backend connection failure (NATS, HTTP client construction)
    #[error("Connection error: {0}")]
    Connection(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Hosting shell failure (bind, serve)
    #[error("Server error: {0}")]
    Server(String),

    /// IO failure
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML config parse failure
    #[error("TOML deserialization error: {0}")]
    TomlDe(#[from] toml::de::Error),
}

/// Coarse classification callers match on instead of variant identity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Authorization,
    NotConfigured,
    Upstream,
    Validation,
    Internal,
}

impl RelayError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            RelayError::Authorization(_) => ErrorKind::Authorization,
            RelayError::NotConfigured(_) => ErrorKind::NotConfigured,
            RelayError::Upstream(_) => ErrorKind::Upstream,
            RelayError::Validation(_) => ErrorKind::Validation,
            _ => ErrorKind::Internal,
        }
    }

    /// HTTP status code for this error's kind
    pub fn http_status(&self) -> u16 {
        match self.kind() {
            ErrorKind::Authorization => 401,
            ErrorKind::Validation => 400,
            ErrorKind::NotConfigured | ErrorKind::Upstream | ErrorKind::Internal => 500,
        }
    }
}

/// Result type alias for relay operations
pub type Result<T> = std::result::Result<T, RelayError>;
