//! Promotion to taste matching.

use std::sync::Arc;
use tracing::{debug, info};

use promo_embeddings::EmbeddingGateway;
use promo_types::{Promotion, TasteVectorMatch};
use promo_vector::TasteVectorIndex;

use crate::error::ServiceError;

/// Text that represents a promotion in embedding space: the name, the tags
/// and the type, each trimmed, empty parts dropped, joined with `" | "`.
///
/// The type is always present, `"unknown"` included.
pub fn promotion_search_text(promotion: &Promotion) -> String {
    let tags = promotion.tags.join(" ");
    [promotion.name.as_str(), tags.as_str(), promotion.kind.as_str()]
        .iter()
        .map(|part| part.trim())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" | ")
}

/// Finds tastes whose vectors are close to a promotion.
pub struct UserMatcher {
    gateway: EmbeddingGateway,
    index: Arc<TasteVectorIndex>,
    threshold: f32,
}

impl UserMatcher {
    /// Create a new matcher returning tastes that score at least `threshold`.
    pub fn new(gateway: EmbeddingGateway, index: Arc<TasteVectorIndex>, threshold: f32) -> Self {
        Self {
            gateway,
            index,
            threshold,
        }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Every taste scoring at least the configured threshold.
    ///
    /// Embedding and index failures are returned as errors.
    pub async fn find_interested_users(
        &self,
        promotion: &Promotion,
    ) -> Result<Vec<TasteVectorMatch>, ServiceError> {
        let text = promotion_search_text(promotion);

        debug!(search_text = %text, "Embedding promotion");
        let embedding = self.gateway.embed(&text).await?;
        let matches = self
            .index
            .find_similar(&embedding.vector, self.threshold)
            .await?;

        info!(
            promotion = %promotion.name,
            matches = matches.len(),
            threshold = self.threshold,
            "Matched promotion against tastes"
        );
        Ok(matches)
    }
}
