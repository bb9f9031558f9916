//! Integration tests for the promo daemon.
//!
//! Boots the application through `build_app` with every HTTP dependency
//! (OpenAI-compatible LLM, Qdrant, messaging gateway) served by wiremock.

use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use promo_daemon::{build_app, App, CollectionCheck};
use promo_service::{DispatchReport, HealthStatus, PipelineOutcome};
use promo_types::{Distance, InboundMessage, Settings};

const DIMENSION: usize = 3;

/// Mock servers plus the settings pointing at them.
struct TestHarness {
    _temp_dir: TempDir,
    llm: MockServer,
    qdrant: MockServer,
    gateway: MockServer,
    settings: Settings,
}

impl TestHarness {
    async fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let llm = MockServer::start().await;
        let qdrant = MockServer::start().await;
        let gateway = MockServer::start().await;

        let mut settings = Settings::default();
        settings.db_path = temp_dir.path().join("db").to_string_lossy().to_string();
        settings.llm.base_url = llm.uri();
        settings.llm.max_retries = 1;
        settings.vector.url = qdrant.uri();
        settings.vector.collection = "user_tastes".to_string();
        settings.vector.dimension = DIMENSION;
        settings.vector.distance = Distance::Cosine;
        settings.matching.score_threshold = Some(0.5);
        settings.messaging.gateway_url = gateway.uri();
        settings.tastes.enhance_labels = false;

        Self {
            _temp_dir: temp_dir,
            llm,
            qdrant,
            gateway,
            settings,
        }
    }

    /// Existing collection with the configured layout.
    async fn mount_collection(&self, size: usize) {
        Mock::given(method("GET"))
            .and(path("/collections/user_tastes"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": {
                    "config": {"params": {"vectors": {"size": size, "distance": "Cosine"}}}
                }
            })))
            .mount(&self.qdrant)
            .await;
    }

    /// Every text embeds to the same unit vector.
    async fn mount_embeddings(&self) {
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"embedding": [1.0, 0.0, 0.0]}],
                "model": "text-embedding-3-small"
            })))
            .mount(&self.llm)
            .await;
    }

    async fn mount_completion(&self, content: &str) {
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": content}}]
            })))
            .mount(&self.llm)
            .await;
    }

    async fn boot(&self, check: CollectionCheck) -> anyhow::Result<App> {
        build_app(&self.settings, check).await
    }
}

/// A group message flows from the LLM through Qdrant to the gateway.
#[tokio::test]
async fn test_message_flow_over_http() {
    // 1. Dependencies
    let harness = TestHarness::new().await;
    harness.mount_collection(DIMENSION).await;
    harness.mount_embeddings().await;
    harness
        .mount_completion(r#"{"name":"Headphones X","currentPrice":80,"previousPrice":100,"type":"product","tags":["audio"]}"#)
        .await;
    Mock::given(method("PUT"))
        .and(path("/collections/user_tastes/points"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": {}})))
        .expect(1)
        .mount(&harness.qdrant)
        .await;

    // 2. Boot and register a group, a user and a taste
    let app = harness.boot(CollectionCheck::Required).await.unwrap();
    app.groups
        .create_group("deals@g.us", Some("Deals"))
        .await
        .unwrap();
    let user = app.users.create_user("Alice", "5511900000001").await.unwrap();
    let taste = app
        .tastes
        .add_taste(&user.id, "headphones")
        .await
        .unwrap()
        .unwrap();

    // 3. Qdrant returns that taste; the gateway accepts Alice's message
    Mock::given(method("POST"))
        .and(path("/collections/user_tastes/points/search"))
        .and(body_partial_json(json!({"score_threshold": 0.5, "with_payload": true})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": [{
                "id": "0b3a1f9e-0000-0000-0000-000000000000",
                "score": 0.93,
                "payload": {"tasteId": taste.id, "userId": user.id, "label": "headphones"}
            }]
        })))
        .mount(&harness.qdrant)
        .await;
    Mock::given(method("POST"))
        .and(path("/messages"))
        .and(body_partial_json(json!({"to": "5511900000001"})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&harness.gateway)
        .await;

    // 4. Process the message
    let outcome = app
        .pipeline
        .handle(&InboundMessage {
            from: "deals@g.us".to_string(),
            message: "Headphones X de 100 por 80!".to_string(),
            image: None,
        })
        .await
        .unwrap();

    assert_eq!(
        outcome,
        PipelineOutcome::Dispatched(DispatchReport {
            recipients: 1,
            delivered: 1,
            failed: 0
        })
    );
}

/// A collection built for another embedding width stops the boot.
#[tokio::test]
async fn test_boot_fails_on_dimension_mismatch() {
    let harness = TestHarness::new().await;
    harness.mount_collection(8).await;

    let err = harness
        .boot(CollectionCheck::Required)
        .await
        .err()
        .expect("boot should fail");
    assert!(format!("{:#}", err).contains("Dimension mismatch"));
}

/// A missing collection is created with the configured layout.
#[tokio::test]
async fn test_boot_creates_missing_collection() {
    let harness = TestHarness::new().await;
    Mock::given(method("GET"))
        .and(path("/collections/user_tastes"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&harness.qdrant)
        .await;
    Mock::given(method("PUT"))
        .and(path("/collections/user_tastes"))
        .and(body_partial_json(
            json!({"vectors": {"size": DIMENSION, "distance": "Cosine"}}),
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": true})))
        .expect(1)
        .mount(&harness.qdrant)
        .await;

    assert!(harness.boot(CollectionCheck::Required).await.is_ok());
}

/// Health boots without the collection check and reports each dependency.
#[tokio::test]
async fn test_health_with_gateway_down() {
    let harness = TestHarness::new().await;
    Mock::given(method("GET"))
        .and(path("/collections"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": {}})))
        .mount(&harness.qdrant)
        .await;
    Mock::given(method("GET"))
        .and(path("/models"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
        .mount(&harness.llm)
        .await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&harness.gateway)
        .await;

    let app = harness.boot(CollectionCheck::Skip).await.unwrap();
    let report = app.health.check().await;

    assert_eq!(report.status, HealthStatus::Degraded);
    let messaging = report
        .dependencies
        .iter()
        .find(|d| d.name == "messaging")
        .unwrap();
    assert_eq!(messaging.status, HealthStatus::Degraded);
}
