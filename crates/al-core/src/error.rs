//! # FeedError
//!
//! Centralized error handling for the anonlog feed engine.
//! Maps feed-level failures to actionable error types.

use thiserror::Error;

/// The primary error type for all feed operations.
#[derive(Error, Debug)]
pub enum FeedError {
    /// Resource not found in the local snapshot (e.g., Message)
    #[error("{0} not found with ID {1}")]
    NotFound(String, String),

    /// Validation failure (e.g., empty content, title too long)
    #[error("validation error: {0}")]
    ValidationError(String),

    /// Moderation or ownership check failed
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Send attempted inside the cooldown window
    #[error("too many requests: retry in {remaining_secs}s")]
    RateLimitExceeded { remaining_secs: u64 },

    /// A stored document could not be mapped to a domain model
    #[error("decode error: {0}")]
    Decode(String),

    /// Transport or permission failure reported by a port, passed through as-is
    #[error(transparent)]
    Transport(#[from] anyhow::Error),
}

impl From<serde_json::Error> for FeedError {
    fn from(err: serde_json::Error) -> Self {
        FeedError::Decode(err.to_string())
    }
}

/// A specialized Result type for feed logic.
pub type Result<T> = std::result::Result<T, FeedError>;
