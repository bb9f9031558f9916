//! Taste lifecycle and reverse lookup.
//!
//! A taste row and its vector share one id. Adding writes the row first and
//! the vector second; removing deletes the vector first and the row second,
//! so a failed vector delete leaves everything in place for a retry.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use promo_embeddings::EmbeddingGateway;
use promo_extractor::{LabelMetadata, TasteLabelEnhancer};
use promo_storage::{TasteRepository, UserRepository};
use promo_types::{normalize_label, Taste, TasteVectorMatch, User};
use promo_vector::{TastePayload, TasteVectorIndex};

use crate::error::ServiceError;

/// A user found by taste search, with the taste that matched best.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserTasteMatch {
    pub user: User,
    pub taste_id: String,
    /// The label as the user entered it when known, otherwise the indexed text
    pub label: String,
    pub score: f32,
}

pub struct TasteService {
    users: Arc<dyn UserRepository>,
    tastes: Arc<dyn TasteRepository>,
    gateway: EmbeddingGateway,
    index: Arc<TasteVectorIndex>,
    enhancer: Option<Arc<TasteLabelEnhancer>>,
    default_threshold: f32,
    default_limit: usize,
    max_limit: usize,
}

impl TasteService {
    /// Create a new taste service without label enhancement.
    ///
    /// `default_threshold` is used by searches that do not pass one.
    pub fn new(
        users: Arc<dyn UserRepository>,
        tastes: Arc<dyn TasteRepository>,
        gateway: EmbeddingGateway,
        index: Arc<TasteVectorIndex>,
        default_threshold: f32,
    ) -> Self {
        Self {
            users,
            tastes,
            gateway,
            index,
            enhancer: None,
            default_threshold,
            default_limit: 20,
            max_limit: 100,
        }
    }

    /// Expand labels into search keywords before embedding.
    pub fn with_enhancer(mut self, enhancer: Arc<TasteLabelEnhancer>) -> Self {
        self.enhancer = Some(enhancer);
        self
    }

    /// Default and maximum result count for [`search_users_by_taste`](Self::search_users_by_taste).
    pub fn with_limits(mut self, default_limit: usize, max_limit: usize) -> Self {
        self.max_limit = max_limit.max(1);
        self.default_limit = default_limit.clamp(1, self.max_limit);
        self
    }

    /// Add a taste for `user_id`, or refresh the existing one with the same
    /// normalized label.
    ///
    /// Returns `None` for a blank label. Adding `"Games"` and then
    /// `"games "` leaves a single taste whose vector was re-indexed.
    pub async fn add_taste(&self, user_id: &str, label: &str) -> Result<Option<Taste>, ServiceError> {
        let label = label.trim();
        let normalized = normalize_label(label);
        if normalized.is_empty() {
            debug!(user_id, "Ignoring blank taste label");
            return Ok(None);
        }

        if self.users.find_by_id(user_id).await?.is_none() {
            return Err(ServiceError::NotFound(format!("user {}", user_id)));
        }

        let metadata = match &self.enhancer {
            Some(enhancer) => enhancer.enhance(label).await,
            None => LabelMetadata::passthrough(label),
        };
        let embedding = self.gateway.embed(&metadata.search_label).await?;

        let taste = match self
            .tastes
            .find_by_user_and_label(user_id, &normalized)
            .await?
        {
            Some(mut existing) => {
                existing.relabel(label, embedding.model.clone());
                existing
            }
            None => Taste::new(user_id, label, embedding.model.clone()),
        };
        self.tastes.save(&taste).await?;

        let original_label =
            (metadata.original_label != metadata.search_label).then_some(metadata.original_label);
        self.index
            .upsert(
                taste.point_id(),
                embedding.vector,
                TastePayload {
                    taste_id: taste.id.clone(),
                    user_id: taste.user_id.clone(),
                    label: metadata.search_label,
                    original_label,
                },
            )
            .await?;

        info!(user_id, taste_id = %taste.id, label = %taste.label, "Taste saved");
        Ok(Some(taste))
    }

    /// Remove one of `user_id`'s tastes. Returns `false` when the taste does
    /// not exist or belongs to someone else.
    pub async fn remove_taste(&self, user_id: &str, taste_id: &str) -> Result<bool, ServiceError> {
        let Some(taste) = self.tastes.find_by_id(taste_id).await? else {
            return Ok(false);
        };
        if taste.user_id != user_id {
            debug!(user_id, taste_id, "Taste belongs to another user");
            return Ok(false);
        }

        self.index.delete(taste.point_id()).await?;
        let removed = self.tastes.delete(&taste.id).await?;
        info!(user_id, taste_id, "Taste removed");
        Ok(removed)
    }

    pub async fn list_tastes(&self, user_id: &str) -> Result<Vec<Taste>, ServiceError> {
        Ok(self.tastes.find_by_user(user_id).await?)
    }

    /// Users whose tastes resemble `label`, best match per user, highest
    /// score first.
    ///
    /// `limit` falls back to the configured default and is clamped to
    /// `1..=max`; `threshold` falls back to the matching threshold.
    pub async fn search_users_by_taste(
        &self,
        label: &str,
        limit: Option<usize>,
        threshold: Option<f32>,
    ) -> Result<Vec<UserTasteMatch>, ServiceError> {
        let label = label.trim();
        if label.is_empty() {
            return Ok(Vec::new());
        }

        let limit = limit.unwrap_or(self.default_limit).clamp(1, self.max_limit);
        let threshold = threshold.unwrap_or(self.default_threshold);
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ServiceError::InvalidInput(format!(
                "threshold {} outside [0, 1]",
                threshold
            )));
        }

        let embedding = self.gateway.embed(label).await?;
        let matches = self.index.find_similar(&embedding.vector, threshold).await?;

        let mut best = best_match_per_user(matches);
        best.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        best.truncate(limit);

        let ids: Vec<String> = best.iter().map(|m| m.user_id.clone()).collect();
        let mut users: HashMap<String, User> = self
            .users
            .find_many_by_ids(&ids)
            .await?
            .into_iter()
            .map(|u| (u.id.clone(), u))
            .collect();

        let results: Vec<UserTasteMatch> = best
            .into_iter()
            .filter_map(|m| {
                let user = users.remove(&m.user_id)?;
                Some(UserTasteMatch {
                    user,
                    taste_id: m.taste_id,
                    label: m.original_label.unwrap_or(m.label),
                    score: m.score,
                })
            })
            .collect();

        debug!(label, threshold, limit, results = results.len(), "Taste search");
        Ok(results)
    }
}

fn best_match_per_user(matches: Vec<TasteVectorMatch>) -> Vec<TasteVectorMatch> {
    let mut best: HashMap<String, TasteVectorMatch> = HashMap::new();
    for m in matches {
        let better = best
            .get(&m.user_id)
            .map_or(true, |current| m.score > current.score);
        if better {
            best.insert(m.user_id.clone(), m);
        }
    }
    best.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use promo_embeddings::MockEmbedder;
    use promo_extractor::MockCompletion;
    use promo_storage::InMemoryStore;
    use promo_types::Distance;
    use promo_vector::InMemoryVectorStore;

    struct Fixture {
        store: Arc<InMemoryStore>,
        vectors: Arc<InMemoryVectorStore>,
        service: TasteService,
        user: User,
    }

    async fn fixture(embedder: MockEmbedder) -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        let user = User::new("Alice", "111");
        UserRepository::save(store.as_ref(), &user).await.unwrap();

        let vectors = Arc::new(InMemoryVectorStore::with_collection(4, Distance::Cosine));
        let index = Arc::new(TasteVectorIndex::new(vectors.clone(), 4, Distance::Cosine));
        let service = TasteService::new(
            store.clone(),
            store.clone(),
            EmbeddingGateway::new(Arc::new(embedder)),
            index,
            0.5,
        );
        Fixture {
            store,
            vectors,
            service,
            user,
        }
    }

    #[tokio::test]
    async fn test_same_normalized_label_keeps_one_taste() {
        let f = fixture(MockEmbedder::new(4)).await;

        let first = f
            .service
            .add_taste(&f.user.id, "Games")
            .await
            .unwrap()
            .unwrap();
        let second = f
            .service
            .add_taste(&f.user.id, "games ")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.label, "games");
        assert_eq!(f.store.taste_count(), 1);
        assert_eq!(f.vectors.len(), 1);
        assert!(f.vectors.contains(&first.id));
    }

    #[tokio::test]
    async fn test_blank_label_and_unknown_user() {
        let f = fixture(MockEmbedder::new(4)).await;
        assert!(f.service.add_taste(&f.user.id, "   ").await.unwrap().is_none());
        assert!(matches!(
            f.service.add_taste("nobody", "games").await,
            Err(ServiceError::NotFound(_))
        ));
        assert_eq!(f.store.taste_count(), 0);
    }

    #[tokio::test]
    async fn test_remove_checks_owner() {
        let f = fixture(MockEmbedder::new(4)).await;
        let taste = f
            .service
            .add_taste(&f.user.id, "coffee")
            .await
            .unwrap()
            .unwrap();

        assert!(!f.service.remove_taste("someone-else", &taste.id).await.unwrap());
        assert!(f.vectors.contains(&taste.id));

        assert!(f.service.remove_taste(&f.user.id, &taste.id).await.unwrap());
        assert!(f.vectors.is_empty());
        assert!(f.service.list_tastes(&f.user.id).await.unwrap().is_empty());
        assert!(!f.service.remove_taste(&f.user.id, &taste.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_failed_vector_delete_keeps_row() {
        let f = fixture(MockEmbedder::new(4)).await;
        let taste = f
            .service
            .add_taste(&f.user.id, "coffee")
            .await
            .unwrap()
            .unwrap();

        f.vectors.set_failing(true);
        assert!(f.service.remove_taste(&f.user.id, &taste.id).await.is_err());
        assert_eq!(f.store.taste_count(), 1);
    }

    #[tokio::test]
    async fn test_enhanced_label_is_indexed() {
        let f = fixture(MockEmbedder::new(4)).await;
        let embedder = MockEmbedder::new(4)
            .with_vector("coffee | espresso", vec![1.0, 0.0, 0.0, 0.0])
            .with_vector("espresso machine", vec![0.9, 0.1, 0.0, 0.0]);
        let completion = Arc::new(MockCompletion::always(r#"{"keywords":["coffee","espresso"]}"#));
        let service = TasteService::new(
            f.store.clone(),
            f.store.clone(),
            EmbeddingGateway::new(Arc::new(embedder)),
            Arc::new(TasteVectorIndex::new(f.vectors.clone(), 4, Distance::Cosine)),
            0.5,
        )
        .with_enhancer(Arc::new(TasteLabelEnhancer::new(completion, "m")));

        let taste = service
            .add_taste(&f.user.id, "Coffee")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(taste.label, "Coffee");

        let found = service
            .search_users_by_taste("espresso machine", None, None)
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].user.id, f.user.id);
        assert_eq!(found[0].label, "Coffee");
    }

    #[tokio::test]
    async fn test_search_best_per_user_sorted_and_limited() {
        let embedder = MockEmbedder::new(4)
            .with_vector("games", vec![1.0, 0.0, 0.0, 0.0])
            .with_vector("video games", vec![0.9, 0.3, 0.0, 0.0])
            .with_vector("board games", vec![0.6, 0.0, 0.8, 0.0])
            .with_vector("query", vec![1.0, 0.0, 0.0, 0.0]);
        let f = fixture(embedder).await;
        let bob = User::new("Bob", "222");
        UserRepository::save(f.store.as_ref(), &bob).await.unwrap();

        f.service.add_taste(&f.user.id, "video games").await.unwrap();
        f.service.add_taste(&f.user.id, "games").await.unwrap();
        f.service.add_taste(&bob.id, "board games").await.unwrap();

        let found = f
            .service
            .search_users_by_taste("query", None, Some(0.5))
            .await
            .unwrap();
        let names: Vec<&str> = found.iter().map(|m| m.user.name.as_str()).collect();
        assert_eq!(names, vec!["Alice", "Bob"]);
        assert_eq!(found[0].label, "games");
        assert!((found[0].score - 1.0).abs() < 1e-5);

        let limited = f
            .service
            .search_users_by_taste("query", Some(0), Some(0.5))
            .await
            .unwrap();
        assert_eq!(limited.len(), 1);

        assert!(f
            .service
            .search_users_by_taste("query", None, Some(1.5))
            .await
            .is_err());
        assert!(f
            .service
            .search_users_by_taste("  ", None, None)
            .await
            .unwrap()
            .is_empty());
    }
}
