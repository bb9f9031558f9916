//! In-memory vector store for tests.

use async_trait::async_trait;
use std::cmp::Ordering as CmpOrdering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use promo_types::Distance;

use crate::error::VectorError;
use crate::store::{CollectionInfo, Payload, ScoredPoint, SearchQuery, VectorPoint, VectorStore};

#[derive(Default)]
struct State {
    collection: Option<(usize, Distance)>,
    points: HashMap<String, (Vec<f32>, Payload)>,
}

/// Exact brute-force store with Qdrant-like scoring semantics.
///
/// Cosine and dot scores rank descending and filter `score >= threshold`;
/// Euclid distances rank ascending and filter `score <= threshold`.
#[derive(Default)]
pub struct InMemoryVectorStore {
    state: Mutex<State>,
    search_calls: AtomicUsize,
    failing: AtomicBool,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store with an existing collection.
    pub fn with_collection(dimension: usize, distance: Distance) -> Self {
        let store = Self::default();
        if let Ok(mut state) = store.state.lock() {
            state.collection = Some((dimension, distance));
        }
        store
    }

    /// Number of `search` calls made so far.
    pub fn search_calls(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.state.lock().map(|s| s.points.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: &str) -> bool {
        self.state
            .lock()
            .map(|s| s.points.contains_key(id))
            .unwrap_or(false)
    }

    /// Make every subsequent call fail with a request error.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn guard(&self) -> Result<std::sync::MutexGuard<'_, State>, VectorError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(VectorError::Request("in-memory store unavailable".to_string()));
        }
        self.state
            .lock()
            .map_err(|e| VectorError::Request(e.to_string()))
    }
}

fn score(distance: Distance, a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    match distance {
        Distance::Dot => dot,
        Distance::Cosine => {
            let na = a.iter().map(|x| x * x).sum::<f32>().sqrt();
            let nb = b.iter().map(|x| x * x).sum::<f32>().sqrt();
            if na == 0.0 || nb == 0.0 {
                0.0
            } else {
                dot / (na * nb)
            }
        }
        Distance::Euclid => a
            .iter()
            .zip(b)
            .map(|(x, y)| (x - y) * (x - y))
            .sum::<f32>()
            .sqrt(),
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn collection_info(&self) -> Result<Option<CollectionInfo>, VectorError> {
        let state = self.guard()?;
        Ok(state.collection.map(|(dimension, distance)| CollectionInfo {
            dimension: Some(dimension),
            distance: Some(distance),
        }))
    }

    async fn create_collection(
        &self,
        dimension: usize,
        distance: Distance,
    ) -> Result<(), VectorError> {
        let mut state = self.guard()?;
        state.collection = Some((dimension, distance));
        Ok(())
    }

    async fn upsert(&self, points: Vec<VectorPoint>) -> Result<(), VectorError> {
        let mut state = self.guard()?;
        if let Some((dimension, _)) = state.collection {
            if let Some(bad) = points.iter().find(|p| p.vector.len() != dimension) {
                return Err(VectorError::DimensionMismatch {
                    expected: dimension,
                    actual: bad.vector.len(),
                });
            }
        }
        for point in points {
            state.points.insert(point.id, (point.vector, point.payload));
        }
        Ok(())
    }

    async fn delete(&self, ids: Vec<String>) -> Result<(), VectorError> {
        let mut state = self.guard()?;
        for id in ids {
            state.points.remove(&id);
        }
        Ok(())
    }

    async fn search(&self, query: SearchQuery) -> Result<Vec<ScoredPoint>, VectorError> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        let state = self.guard()?;
        let distance = state
            .collection
            .map(|(_, d)| d)
            .unwrap_or(Distance::Cosine);
        let ascending = distance == Distance::Euclid;

        let mut hits: Vec<ScoredPoint> = state
            .points
            .iter()
            .filter(|(_, (vector, _))| vector.len() == query.vector.len())
            .map(|(id, (vector, payload))| ScoredPoint {
                id: id.clone(),
                score: score(distance, &query.vector, vector),
                payload: payload.clone(),
            })
            .filter(|hit| match query.score_threshold {
                Some(t) if ascending => hit.score <= t,
                Some(t) => hit.score >= t,
                None => true,
            })
            .collect();

        hits.sort_by(|a, b| {
            let by_score = if ascending {
                a.score.partial_cmp(&b.score)
            } else {
                b.score.partial_cmp(&a.score)
            };
            by_score
                .unwrap_or(CmpOrdering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });

        Ok(hits
            .into_iter()
            .skip(query.offset)
            .take(query.limit)
            .collect())
    }

    async fn health_check(&self) -> Result<(), VectorError> {
        self.guard().map(|_| ())
    }
}
