//! Vector index error types.

use thiserror::Error;

/// Errors that can occur during vector operations.
#[derive(Debug, Error)]
pub enum VectorError {
    /// Transport failure talking to the vector database
    #[error("Vector store request failed: {0}")]
    Request(String),

    /// Non-success HTTP status
    #[error("Vector store returned HTTP {status}: {body}")]
    Api { status: u16, body: String },

    /// Response body could not be decoded
    #[error("Failed to parse vector store response: {0}")]
    Parse(String),

    /// Dimension mismatch
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Existing collection uses another similarity metric
    #[error("Distance mismatch: expected {expected}, collection uses {actual}")]
    DistanceMismatch { expected: String, actual: String },

    /// Invalid client configuration
    #[error("Invalid configuration: {0}")]
    Config(String),
}
