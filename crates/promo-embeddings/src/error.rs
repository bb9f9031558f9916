//! Embedding error types.

use thiserror::Error;

/// Errors that can occur during embedding operations.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// Input was empty after trimming; no provider call was made
    #[error("Cannot embed empty text")]
    EmptyInput,

    /// Provider returned an empty or all-zero vector
    #[error("Degenerate embedding from model {model}: {reason}")]
    Degenerate { model: String, reason: String },

    /// Transport or HTTP-level failure
    #[error("Embedding API request failed: {0}")]
    Api(String),

    /// Provider signalled rate limiting
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// Response body could not be decoded
    #[error("Failed to parse embedding response: {0}")]
    Parse(String),

    /// Invalid client configuration
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl EmbeddingError {
    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, EmbeddingError::Api(_) | EmbeddingError::RateLimitExceeded)
    }
}
