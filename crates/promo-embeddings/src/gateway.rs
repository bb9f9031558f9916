//! Embedding gateway: input and output validation around a provider.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::EmbeddingError;
use crate::model::{Embedding, EmbeddingProvider};

/// Shared entry point for turning text into vectors.
///
/// Cheap to clone; holds no mutable state.
#[derive(Clone)]
pub struct EmbeddingGateway {
    provider: Arc<dyn EmbeddingProvider>,
    model: Option<String>,
}

impl EmbeddingGateway {
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            provider,
            model: None,
        }
    }

    /// Pin a model instead of the provider default.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Model tag that embeddings from this gateway will carry.
    pub fn model(&self) -> &str {
        self.model
            .as_deref()
            .unwrap_or_else(|| self.provider.default_model())
    }

    /// Embed `text`.
    ///
    /// Whitespace-only input fails with [`EmbeddingError::EmptyInput`]
    /// without calling the provider. A degenerate vector from the provider
    /// fails with [`EmbeddingError::Degenerate`].
    pub async fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(EmbeddingError::EmptyInput);
        }

        let embedding = self
            .provider
            .generate_embedding(text, self.model.as_deref())
            .await?;

        if let Some(reason) = embedding.degenerate_reason() {
            warn!(model = %embedding.model, reason, "Provider returned degenerate embedding");
            return Err(EmbeddingError::Degenerate {
                model: embedding.model,
                reason: reason.to_string(),
            });
        }

        debug!(
            model = %embedding.model,
            dimension = embedding.dimension(),
            "Generated embedding"
        );
        Ok(embedding)
    }
}
