//! Mock embedder for testing.

use async_trait::async_trait;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::error::EmbeddingError;
use crate::model::{Embedding, EmbeddingProvider};

/// Deterministic embedder that never touches the network.
///
/// Texts registered with [`MockEmbedder::with_vector`] return that exact
/// vector. Anything else becomes a normalized bag-of-words vector, so texts
/// sharing words score higher than unrelated texts.
pub struct MockEmbedder {
    dimension: usize,
    model: String,
    fixed: HashMap<String, Vec<f32>>,
    calls: AtomicUsize,
    failing: AtomicBool,
}

impl MockEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            model: "mock-embedding".to_string(),
            fixed: HashMap::new(),
            calls: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
        }
    }

    /// Register an exact vector for `text` (matched after trimming).
    pub fn with_vector(mut self, text: &str, vector: Vec<f32>) -> Self {
        self.fixed.insert(text.trim().to_string(), vector);
        self
    }

    /// Make every subsequent call fail with an API error.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of provider calls made so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn bag_of_words(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        if self.dimension == 0 {
            return vector;
        }
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let mut hasher = DefaultHasher::new();
            word.to_lowercase().hash(&mut hasher);
            let bucket = (hasher.finish() % self.dimension as u64) as usize;
            vector[bucket] += 1.0;
        }
        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|x| *x /= norm);
        }
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbedder {
    fn default_model(&self) -> &str {
        &self.model
    }

    async fn generate_embedding(
        &self,
        text: &str,
        model: Option<&str>,
    ) -> Result<Embedding, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(EmbeddingError::Api("mock provider unavailable".to_string()));
        }

        let vector = match self.fixed.get(text.trim()) {
            Some(v) => v.clone(),
            None => self.bag_of_words(text),
        };
        Ok(Embedding::new(vector, model.unwrap_or(&self.model)))
    }
}
