//! Error types for session operations.

use ferrule_redis::RedisError;
use thiserror::Error;

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// Session-specific errors.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The backing store failed
    #[error("Store error: {0}")]
    Store(#[from] RedisError),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Deserialization error
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl SessionError {
    /// Whether the store could not be reached.
    pub fn is_connection_error(&self) -> bool {
        matches!(self, SessionError::Store(e) if e.is_connection_error())
    }
}

impl From<ferrule_config::ConfigError> for SessionError {
    fn from(err: ferrule_config::ConfigError) -> Self {
        SessionError::Config(err.to_string())
    }
}

impl From<SessionError> for ferrule_core::Error {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Store(e) => e.into(),
            other => ferrule_core::Error::Internal(other.to_string()),
        }
    }
}
