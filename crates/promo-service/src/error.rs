//! Error types for the application services.

use promo_embeddings::EmbeddingError;
use promo_storage::StorageError;
use promo_vector::VectorError;
use thiserror::Error;

/// Errors surfaced by the service layer.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Vector index error: {0}")]
    Vector(#[from] VectorError),

    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
