//! Taste vector index.
//!
//! Wraps a [`VectorStore`] with taste payloads, dimension checks and
//! threshold search that drains every page.

use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

use promo_types::{Distance, TasteVectorMatch};

use crate::error::VectorError;
use crate::store::{Payload, SearchQuery, VectorPoint, VectorStore};

/// Page size for threshold searches.
///
/// The store paginates even when a threshold is given, so searches loop
/// until a page comes back shorter than this.
pub const SEARCH_PAGE_SIZE: usize = 128;

const KEY_TASTE_ID: &str = "tasteId";
const KEY_USER_ID: &str = "userId";
const KEY_LABEL: &str = "label";
const KEY_ORIGINAL_LABEL: &str = "originalLabel";

/// Payload stored with every taste vector.
#[derive(Debug, Clone, PartialEq)]
pub struct TastePayload {
    pub taste_id: String,
    pub user_id: String,
    /// Indexed text (search label)
    pub label: String,
    pub original_label: Option<String>,
}

impl TastePayload {
    fn into_payload(self) -> Payload {
        let mut payload = Payload::new();
        payload.insert(KEY_TASTE_ID.to_string(), Value::String(self.taste_id));
        payload.insert(KEY_USER_ID.to_string(), Value::String(self.user_id));
        payload.insert(KEY_LABEL.to_string(), Value::String(self.label));
        if let Some(original) = self.original_label {
            payload.insert(KEY_ORIGINAL_LABEL.to_string(), Value::String(original));
        }
        payload
    }
}

fn payload_str(payload: &Payload, key: &str) -> Option<String> {
    payload
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Application view of the taste collection.
pub struct TasteVectorIndex {
    store: Arc<dyn VectorStore>,
    dimension: usize,
    distance: Distance,
    page_size: usize,
}

impl TasteVectorIndex {
    pub fn new(store: Arc<dyn VectorStore>, dimension: usize, distance: Distance) -> Self {
        Self {
            store,
            dimension,
            distance,
            page_size: SEARCH_PAGE_SIZE,
        }
    }

    #[cfg(test)]
    fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Make sure the collection exists with the configured layout.
    ///
    /// A missing collection is created. An existing one with a different
    /// dimension or metric is a fatal misconfiguration: vectors are never
    /// truncated or padded to fit.
    pub async fn ensure_collection(&self) -> Result<(), VectorError> {
        match self.store.collection_info().await? {
            None => {
                info!(
                    dimension = self.dimension,
                    distance = self.distance.as_str(),
                    "Creating vector collection"
                );
                self.store
                    .create_collection(self.dimension, self.distance)
                    .await
            }
            Some(existing) => {
                match existing.dimension {
                    Some(actual) if actual != self.dimension => {
                        return Err(VectorError::DimensionMismatch {
                            expected: self.dimension,
                            actual,
                        });
                    }
                    Some(_) => {}
                    None => warn!("Vector collection dimension unknown, skipping check"),
                }
                if let Some(actual) = existing.distance {
                    if actual != self.distance {
                        return Err(VectorError::DistanceMismatch {
                            expected: self.distance.as_str().to_string(),
                            actual: actual.as_str().to_string(),
                        });
                    }
                }
                debug!(dimension = self.dimension, "Vector collection ready");
                Ok(())
            }
        }
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<(), VectorError> {
        if vector.len() != self.dimension {
            return Err(VectorError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        Ok(())
    }

    /// Insert or overwrite the vector for a taste. `point_id` must be the
    /// taste id.
    pub async fn upsert(
        &self,
        point_id: &str,
        vector: Vec<f32>,
        payload: TastePayload,
    ) -> Result<(), VectorError> {
        self.check_dimension(&vector)?;
        self.store
            .upsert(vec![VectorPoint {
                id: point_id.to_string(),
                vector,
                payload: payload.into_payload(),
            }])
            .await?;
        debug!(point_id, "Upserted taste vector");
        Ok(())
    }

    /// Delete one point. Missing points are not an error.
    pub async fn delete(&self, point_id: &str) -> Result<(), VectorError> {
        self.delete_many(vec![point_id.to_string()]).await
    }

    pub async fn delete_many(&self, point_ids: Vec<String>) -> Result<(), VectorError> {
        if point_ids.is_empty() {
            return Ok(());
        }
        let count = point_ids.len();
        self.store.delete(point_ids).await?;
        debug!(count, "Deleted taste vectors");
        Ok(())
    }

    /// Every taste scoring at least `score_threshold` against `vector`.
    ///
    /// Pages are requested until one comes back shorter than the page size.
    /// Hits without a taste id or user id in their payload are skipped.
    pub async fn find_similar(
        &self,
        vector: &[f32],
        score_threshold: f32,
    ) -> Result<Vec<TasteVectorMatch>, VectorError> {
        self.check_dimension(vector)?;

        let mut matches = Vec::new();
        let mut offset = 0;
        let mut pages = 0;

        loop {
            let page = self
                .store
                .search(SearchQuery {
                    vector: vector.to_vec(),
                    limit: self.page_size,
                    offset,
                    score_threshold: Some(score_threshold),
                })
                .await?;
            pages += 1;
            let page_len = page.len();

            for hit in page {
                let (Some(taste_id), Some(user_id)) = (
                    payload_str(&hit.payload, KEY_TASTE_ID),
                    payload_str(&hit.payload, KEY_USER_ID),
                ) else {
                    warn!(point_id = %hit.id, "Skipping vector hit with incomplete payload");
                    continue;
                };

                matches.push(TasteVectorMatch {
                    taste_id,
                    user_id,
                    label: payload_str(&hit.payload, KEY_LABEL).unwrap_or_default(),
                    original_label: payload_str(&hit.payload, KEY_ORIGINAL_LABEL),
                    score: hit.score,
                });
            }

            if page_len < self.page_size {
                break;
            }
            offset += page_len;
        }

        debug!(pages, matches = matches.len(), score_threshold, "Taste search complete");
        Ok(matches)
    }

    pub async fn health_check(&self) -> Result<(), VectorError> {
        self.store.health_check().await
    }
}
