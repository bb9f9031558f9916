//! # promo-embeddings
//!
//! Text embedding for promo-radar.
//!
//! Taste labels and promotion search strings are turned into vectors
//! through an OpenAI-compatible `/embeddings` endpoint.
//!
//! ## Features
//! - [`EmbeddingGateway`]: rejects empty input before any network call and
//!   rejects degenerate (empty or all-zero) vectors returned by the provider
//! - [`OpenAiEmbedder`]: reqwest client with timeout and exponential backoff
//! - [`MockEmbedder`]: deterministic in-process provider for tests

pub mod error;
pub mod gateway;
pub mod mock;
pub mod model;
pub mod openai;

pub use error::EmbeddingError;
pub use gateway::EmbeddingGateway;
pub use mock::MockEmbedder;
pub use model::{Embedding, EmbeddingProvider};
pub use openai::{OpenAiEmbedder, OpenAiEmbedderConfig};
