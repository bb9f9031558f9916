//! # promo-service
//!
//! Application services for promo-radar.
//!
//! The pipeline for one inbound group message:
//! 1. [`MessagePipeline`] drops messages from unregistered groups
//! 2. The extractor turns the text into an optional promotion
//! 3. [`UserMatcher`] finds tastes similar to the promotion
//! 4. [`NotificationDispatcher`] sends one formatted message per interested user
//!
//! Administration lives next to it: [`TasteService`], [`UserService`],
//! [`GroupService`] and [`HealthService`].

pub mod dispatcher;
pub mod error;
pub mod formatter;
pub mod groups;
pub mod health;
pub mod matcher;
pub mod pipeline;
pub mod sender;
pub mod tastes;
pub mod users;

pub use dispatcher::{DispatchReport, NotificationDispatcher};
pub use error::ServiceError;
pub use formatter::{format_promotion, DEFAULT_CURRENCY};
pub use groups::GroupService;
pub use health::{DependencyHealth, HealthProbe, HealthReport, HealthService, HealthStatus};
pub use matcher::{promotion_search_text, UserMatcher};
pub use pipeline::{MessagePipeline, PipelineOutcome};
pub use sender::{
    MessageSender, RecordingSender, SendError, SentMessage, WebhookMessageSender,
    WebhookSenderConfig,
};
pub use tastes::{TasteService, UserTasteMatch};
pub use users::UserService;
