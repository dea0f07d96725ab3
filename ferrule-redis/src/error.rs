//! Redis error types.

use thiserror::Error;

/// Result type for Redis operations.
pub type Result<T> = std::result::Result<T, RedisError>;

/// Redis errors.
#[derive(Debug, Error)]
pub enum RedisError {
    /// The server could not be reached or refused the connection.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Connect or command exceeded the socket timeout.
    #[error("Operation timed out")]
    Timeout,

    /// Pool error.
    #[error("Pool error: {0}")]
    Pool(String),

    /// Command error.
    #[error("Command error: {0}")]
    Command(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A value could not be decoded under the strict policy.
    #[error("Decode error: {0}")]
    Decode(String),

    /// Underlying Redis error.
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

impl RedisError {
    /// Check if this error means the store is unreachable.
    pub fn is_connection_error(&self) -> bool {
        match self {
            Self::Connection(_) | Self::Timeout | Self::Pool(_) => true,
            Self::Redis(e) => e.is_io_error() || e.is_connection_refusal() || e.is_timeout(),
            _ => false,
        }
    }
}

impl<E> From<bb8::RunError<E>> for RedisError
where
    E: std::error::Error + 'static,
{
    fn from(err: bb8::RunError<E>) -> Self {
        match err {
            bb8::RunError::TimedOut => Self::Timeout,
            bb8::RunError::User(e) => Self::Pool(e.to_string()),
        }
    }
}

impl From<ferrule_config::ConfigError> for RedisError {
    fn from(err: ferrule_config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<RedisError> for ferrule_core::Error {
    fn from(err: RedisError) -> Self {
        if err.is_connection_error() {
            ferrule_core::Error::ServiceUnavailable(err.to_string())
        } else {
            ferrule_core::Error::Internal(err.to_string())
        }
    }
}
