//! Embedding provider trait and types.

use async_trait::async_trait;

use crate::error::EmbeddingError;

/// A vector produced by a specific model.
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding {
    pub vector: Vec<f32>,
    /// Model tag, recorded on tastes for reindexing
    pub model: String,
}

impl Embedding {
    pub fn new(vector: Vec<f32>, model: impl Into<String>) -> Self {
        Self {
            vector,
            model: model.into(),
        }
    }

    pub fn dimension(&self) -> usize {
        self.vector.len()
    }

    /// Empty, all-zero, or containing non-finite values.
    ///
    /// An all-zero vector has no direction, so every cosine score against it
    /// is meaningless.
    pub fn degenerate_reason(&self) -> Option<&'static str> {
        if self.vector.is_empty() {
            return Some("empty vector");
        }
        if self.vector.iter().any(|v| !v.is_finite()) {
            return Some("non-finite component");
        }
        if self.vector.iter().all(|v| *v == 0.0) {
            return Some("all-zero vector");
        }
        None
    }
}

/// Source of embeddings.
///
/// Implementations must be thread-safe (Send + Sync) for concurrent use.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Model used when the caller does not name one.
    fn default_model(&self) -> &str;

    /// Generate an embedding for `text` using `model` or the default model.
    async fn generate_embedding(
        &self,
        text: &str,
        model: Option<&str>,
    ) -> Result<Embedding, EmbeddingError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_degenerate_detection() {
        assert_eq!(
            Embedding::new(vec![], "m").degenerate_reason(),
            Some("empty vector")
        );
        assert_eq!(
            Embedding::new(vec![0.0; 8], "m").degenerate_reason(),
            Some("all-zero vector")
        );
        assert_eq!(
            Embedding::new(vec![0.0, f32::NAN], "m").degenerate_reason(),
            Some("non-finite component")
        );
        assert_eq!(Embedding::new(vec![0.0, 0.1], "m").degenerate_reason(), None);
    }
}
