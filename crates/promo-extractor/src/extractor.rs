//! Promotion extraction from raw chat messages.

use std::sync::Arc;
use tracing::{debug, info, warn};

use promo_types::Promotion;

use crate::completion::{CompletionProvider, CompletionRequest};
use crate::parser::parse_promotion;
use crate::prompt::{promotion_messages, PROMOTION_TEMPERATURE};

/// Decides whether a message advertises a promotion and extracts it.
pub struct PromotionExtractor {
    provider: Arc<dyn CompletionProvider>,
    model: String,
}

impl PromotionExtractor {
    pub fn new(provider: Arc<dyn CompletionProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }

    /// Extract a promotion from `message`.
    ///
    /// Blank messages return `None` without calling the model. Provider
    /// failures and unusable output are logged and also yield `None`.
    pub async fn extract(&self, message: &str) -> Option<Promotion> {
        let message = message.trim();
        if message.is_empty() {
            debug!("Skipping extraction of empty message");
            return None;
        }

        let request = CompletionRequest {
            model: self.model.clone(),
            temperature: PROMOTION_TEMPERATURE,
            max_tokens: None,
            messages: promotion_messages(message),
        };

        let raw = match self.provider.complete(request).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "Promotion extraction call failed");
                return None;
            }
        };

        match parse_promotion(&raw) {
            Some(promotion) => {
                info!(name = %promotion.name, kind = %promotion.kind, "Promotion detected");
                Some(promotion)
            }
            None => {
                debug!(response_len = raw.len(), "No promotion in model output");
                None
            }
        }
    }
}
