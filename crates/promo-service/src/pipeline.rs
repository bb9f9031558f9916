//! Inbound message handling: extract, match, dispatch.

use std::sync::Arc;
use tracing::{debug, info, instrument};

use promo_extractor::PromotionExtractor;
use promo_storage::GroupRepository;
use promo_types::InboundMessage;

use crate::dispatcher::{DispatchReport, NotificationDispatcher};
use crate::error::ServiceError;
use crate::matcher::UserMatcher;

/// What happened to one inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// Sender is not a registered group; the message was ignored
    UnknownGroup,
    /// The text did not describe a promotion
    NoPromotion,
    /// A promotion was found but no taste scored above the threshold
    NoMatches,
    Dispatched(DispatchReport),
}

/// Runs one inbound message through the whole pipeline. Steps are
/// sequential; concurrency comes from handling messages on separate tasks.
pub struct MessagePipeline {
    groups: Arc<dyn GroupRepository>,
    extractor: Arc<PromotionExtractor>,
    matcher: Arc<UserMatcher>,
    dispatcher: Arc<NotificationDispatcher>,
}

impl MessagePipeline {
    pub fn new(
        groups: Arc<dyn GroupRepository>,
        extractor: Arc<PromotionExtractor>,
        matcher: Arc<UserMatcher>,
        dispatcher: Arc<NotificationDispatcher>,
    ) -> Self {
        Self {
            groups,
            extractor,
            matcher,
            dispatcher,
        }
    }

    #[instrument(skip(self, inbound), fields(from = %inbound.from))]
    pub async fn handle(&self, inbound: &InboundMessage) -> Result<PipelineOutcome, ServiceError> {
        if self
            .groups
            .find_by_external_id(&inbound.from)
            .await?
            .is_none()
        {
            debug!("Message from unregistered group, ignoring");
            return Ok(PipelineOutcome::UnknownGroup);
        }

        let Some(promotion) = self.extractor.extract(&inbound.message).await else {
            debug!("No promotion in message");
            return Ok(PipelineOutcome::NoPromotion);
        };

        let matches = self.matcher.find_interested_users(&promotion).await?;
        if matches.is_empty() {
            info!(promotion = %promotion.name, "No interested users");
            return Ok(PipelineOutcome::NoMatches);
        }

        let report = self
            .dispatcher
            .notify_users(&matches, &promotion, inbound.image.as_ref())
            .await?;
        Ok(PipelineOutcome::Dispatched(report))
    }
}
