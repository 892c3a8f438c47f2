//! Common error types for Decidr.

use thiserror::Error;

/// Result type alias using Decidr's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for Decidr applications.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error (key files)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Cryptographic operation failed
    #[error("crypto error: {0}")]
    Crypto(String),

    /// Protocol error (malformed frame, unexpected message)
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl Error {
    /// Create a config error from any displayable type.
    pub fn config(msg: impl std::fmt::Display) -> Self {
        Self::Config(msg.to_string())
    }

    /// Create a crypto error from any displayable type.
    pub fn crypto(msg: impl std::fmt::Display) -> Self {
        Self::Crypto(msg.to_string())
    }

    /// Create a protocol error from any displayable type.
    pub fn protocol(msg: impl std::fmt::Display) -> Self {
        Self::Protocol(msg.to_string())
    }
}
