//! # promo-types
//!
//! Shared domain types for the promo-radar pipeline.
//!
//! This crate defines the core data structures used throughout the system:
//! - Promotions: Structured offers extracted from chat messages
//! - Tastes: User-declared interests and their vector matches
//! - Users and groups: Notification recipients and monitored chats
//! - Inbound messages: The sole ingress event of the pipeline
//! - Settings: Layered configuration
//!
//! ## Usage
//!
//! ```rust
//! use promo_types::{normalize_label, Promotion, PromotionType};
//!
//! assert_eq!(normalize_label("  Games "), "games");
//! assert_eq!(PromotionType::parse("COUPON"), PromotionType::Coupon);
//! ```

pub mod config;
pub mod error;
pub mod message;
pub mod promotion;
pub mod taste;
pub mod user;

pub use config::{
    Distance, LlmSettings, MatchingSettings, MessagingSettings, Settings, TasteSettings,
    VectorSettings,
};
pub use error::PromoError;
pub use message::{Attachment, InboundMessage};
pub use promotion::{Promotion, PromotionType};
pub use taste::{normalize_label, Taste, TasteVectorMatch};
pub use user::{Group, User};
