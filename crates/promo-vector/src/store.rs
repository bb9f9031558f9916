//! Vector store trait and wire-neutral types.

use async_trait::async_trait;
use serde_json::{Map, Value};

use promo_types::Distance;

use crate::error::VectorError;

/// Free-form point payload as stored in the database.
pub type Payload = Map<String, Value>;

/// A point to upsert.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorPoint {
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: Payload,
}

/// A search hit.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredPoint {
    pub id: String,
    pub score: f32,
    pub payload: Payload,
}

/// One page of a similarity search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    pub vector: Vec<f32>,
    pub limit: usize,
    pub offset: usize,
    pub score_threshold: Option<f32>,
}

/// Layout of an existing collection. Fields are `None` when the store
/// reports a layout this crate does not understand (e.g. named vectors).
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionInfo {
    pub dimension: Option<usize>,
    pub distance: Option<Distance>,
}

/// Approximate-nearest-neighbour store holding a single collection.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Layout of the collection, or `None` if it does not exist.
    async fn collection_info(&self) -> Result<Option<CollectionInfo>, VectorError>;

    async fn create_collection(&self, dimension: usize, distance: Distance)
        -> Result<(), VectorError>;

    /// Insert or overwrite points by id.
    async fn upsert(&self, points: Vec<VectorPoint>) -> Result<(), VectorError>;

    /// Delete points by id. Unknown ids are ignored.
    async fn delete(&self, ids: Vec<String>) -> Result<(), VectorError>;

    /// One page of results ordered best-first.
    async fn search(&self, query: SearchQuery) -> Result<Vec<ScoredPoint>, VectorError>;

    async fn health_check(&self) -> Result<(), VectorError>;
}
