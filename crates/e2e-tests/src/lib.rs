//! End-to-end test infrastructure for promo-radar.
//!
//! Provides a shared TestHarness that wires the full inbound-message
//! pipeline over RocksDB storage and in-process fakes for every network
//! dependency (embeddings, chat completion, vector store, messaging).

use std::sync::Arc;
use std::time::Duration;

use promo_embeddings::{EmbeddingGateway, MockEmbedder};
use promo_extractor::{MockCompletion, PromotionExtractor};
use promo_service::{
    GroupService, HealthService, MessagePipeline, NotificationDispatcher, RecordingSender,
    TasteService, UserMatcher, UserService,
};
use promo_storage::Storage;
use promo_types::{Distance, InboundMessage, User};
use promo_vector::{InMemoryVectorStore, TasteVectorIndex};

/// Vector width used by every harness component.
pub const DIMENSION: usize = 16;

/// Matching threshold used by the harness.
pub const THRESHOLD: f32 = 0.6;

/// Group registered by [`TestHarness::with_group`].
pub const DEALS_GROUP: &str = "deals@g.us";

/// Shared test harness for E2E tests.
pub struct TestHarness {
    /// Keeps temp dir alive for the lifetime of the harness
    pub _temp_dir: tempfile::TempDir,
    pub storage: Arc<Storage>,
    pub vectors: Arc<InMemoryVectorStore>,
    pub embedder: Arc<MockEmbedder>,
    pub completion: Arc<MockCompletion>,
    pub sender: Arc<RecordingSender>,
    pub index: Arc<TasteVectorIndex>,
    pub pipeline: MessagePipeline,
    pub tastes: TasteService,
    pub users: UserService,
    pub groups: GroupService,
    pub health: HealthService,
}

impl TestHarness {
    /// Harness with a bag-of-words embedder and a sender that always succeeds.
    pub fn new() -> Self {
        Self::with_components(MockEmbedder::new(DIMENSION), RecordingSender::new())
    }

    /// Harness over a preconfigured embedder and sender.
    pub fn with_components(embedder: MockEmbedder, sender: RecordingSender) -> Self {
        let temp_dir = tempfile::TempDir::new().expect("Failed to create temp dir");
        let storage =
            Arc::new(Storage::open(temp_dir.path()).expect("Failed to open test storage"));

        let vectors = Arc::new(InMemoryVectorStore::with_collection(
            DIMENSION,
            Distance::Cosine,
        ));
        let index = Arc::new(TasteVectorIndex::new(
            vectors.clone(),
            DIMENSION,
            Distance::Cosine,
        ));
        let embedder = Arc::new(embedder);
        let completion = Arc::new(MockCompletion::new());
        let sender = Arc::new(sender);

        let gateway = EmbeddingGateway::new(embedder.clone());
        let pipeline = MessagePipeline::new(
            storage.clone(),
            Arc::new(PromotionExtractor::new(completion.clone(), "test-model")),
            Arc::new(UserMatcher::new(gateway.clone(), index.clone(), THRESHOLD)),
            Arc::new(NotificationDispatcher::new(
                storage.clone(),
                sender.clone(),
                Duration::from_secs(1),
            )),
        );
        let tastes = TasteService::new(
            storage.clone(),
            storage.clone(),
            gateway,
            index.clone(),
            THRESHOLD,
        );
        let users = UserService::new(storage.clone(), storage.clone(), index.clone());
        let groups = GroupService::new(storage.clone());
        let health = HealthService::for_dependencies(
            storage.clone(),
            index.clone(),
            completion.clone(),
            sender.clone(),
            Duration::from_secs(1),
        );

        Self {
            _temp_dir: temp_dir,
            storage,
            vectors,
            embedder,
            completion,
            sender,
            index,
            pipeline,
            tastes,
            users,
            groups,
            health,
        }
    }

    /// Register [`DEALS_GROUP`] as a monitored group.
    pub async fn with_group(self) -> Self {
        self.groups
            .create_group(DEALS_GROUP, Some("Deals"))
            .await
            .expect("Failed to register group");
        self
    }

    /// Create a user holding the given tastes.
    pub async fn user_with_tastes(&self, name: &str, phone: &str, labels: &[&str]) -> User {
        let user = self
            .users
            .create_user(name, phone)
            .await
            .expect("Failed to create user");
        for label in labels {
            self.tastes
                .add_taste(&user.id, label)
                .await
                .expect("Failed to add taste")
                .expect("Taste label was blank");
        }
        user
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Pad `values` with zeros to [`DIMENSION`].
pub fn vector(values: &[f32]) -> Vec<f32> {
    let mut v = values.to_vec();
    v.resize(DIMENSION, 0.0);
    v
}

/// Unit vector in the x/y plane whose cosine against `vector(&[1.0])` is
/// `score`.
pub fn vector_with_score(score: f32) -> Vec<f32> {
    vector(&[score, (1.0 - score * score).sqrt()])
}

/// Inbound text message from `from`.
pub fn group_message(from: &str, text: &str) -> InboundMessage {
    InboundMessage {
        from: from.to_string(),
        message: text.to_string(),
        image: None,
    }
}

/// Model answer describing a product promotion.
pub fn product_json(name: &str, price: f64, tags: &[&str]) -> String {
    serde_json::json!({
        "name": name,
        "currentPrice": price,
        "type": "product",
        "tags": tags,
    })
    .to_string()
}
