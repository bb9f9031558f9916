//! # promo-vector
//!
//! Taste vector index for promo-radar.
//!
//! The vector database is an external approximate-nearest-neighbour store.
//! This crate adds the application semantics it lacks:
//! - Collection bootstrap with fail-fast dimension checks
//! - Taste id as point id, so rows and vectors stay in lock-step
//! - Threshold search that pages through every result
//! - Tolerance for points with incomplete payloads
//!
//! ## Stores
//! - [`QdrantStore`]: Qdrant REST API over reqwest
//! - [`InMemoryVectorStore`]: exact scoring for tests

pub mod error;
pub mod index;
pub mod memory;
pub mod qdrant;
pub mod store;

pub use error::VectorError;
pub use index::{TastePayload, TasteVectorIndex, SEARCH_PAGE_SIZE};
pub use memory::InMemoryVectorStore;
pub use qdrant::{QdrantConfig, QdrantStore};
pub use store::{CollectionInfo, Payload, ScoredPoint, SearchQuery, VectorPoint, VectorStore};
