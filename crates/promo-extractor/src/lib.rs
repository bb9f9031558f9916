//! # promo-extractor
//!
//! LLM-backed extraction for promo-radar.
//!
//! - [`PromotionExtractor`]: raw chat message to an optional [`Promotion`]
//! - [`TasteLabelEnhancer`]: expands a taste label into search keywords
//! - [`CompletionProvider`]: chat completion seam with an HTTP client
//!   ([`ApiCompletionClient`]) and a scripted fake ([`MockCompletion`])
//!
//! Extraction never fails: malformed model output and provider errors are
//! logged and reported as "no promotion".
//!
//! [`Promotion`]: promo_types::Promotion

pub mod completion;
pub mod enhancer;
pub mod extractor;
pub mod json;
pub mod mock;
pub mod parser;
pub mod prompt;

pub use completion::{
    ApiCompletionClient, ApiCompletionConfig, ChatMessage, CompletionError, CompletionProvider,
    CompletionRequest,
};
pub use enhancer::{LabelMetadata, TasteLabelEnhancer};
pub use extractor::PromotionExtractor;
pub use mock::MockCompletion;
pub use parser::parse_promotion;
