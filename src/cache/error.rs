//! Error types for the cache layer

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Result type for cache operations
pub type CacheResult<T> = Result<T, CacheError>;

/// Cache backend errors.
///
/// These never reach the pipeline's caller: the store logs them and
/// degrades to the next backend or to no caching.
#[derive(Error, Debug)]
pub enum CacheError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Could not reach the backend
    #[error("Connection error: {0}")]
    Connection(String),

    /// Timeout occurred
    #[error("Timeout: operation took longer than {0:?}")]
    Timeout(Duration),

    /// Backend rejected the operation
    #[error("Backend error: {0}")]
    Backend(String),

    /// Backend skipped (e.g. cooling down after a failed connect)
    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}

impl CacheError {
    /// Create a serialization error
    pub fn serialization<E: fmt::Display>(err: E) -> Self {
        Self::Serialization(err.to_string())
    }

    /// Create a connection error
    pub fn connection<E: fmt::Display>(msg: E) -> Self {
        Self::Connection(msg.to_string())
    }

    /// Create a backend error
    pub fn backend<E: fmt::Display>(msg: E) -> Self {
        Self::Backend(msg.to_string())
    }

    /// Create an unavailable error
    pub fn unavailable<E: fmt::Display>(msg: E) -> Self {
        Self::Unavailable(msg.to_string())
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_connection_refusal() || err.is_connection_dropped() || err.is_io_error() {
            Self::Connection(err.to_string())
        } else {
            Self::Backend(err.to_string())
        }
    }
}
