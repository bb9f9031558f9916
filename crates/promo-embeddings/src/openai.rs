//! Embedding provider backed by an OpenAI-compatible `/embeddings` endpoint.

use async_trait::async_trait;
use backoff::{backoff::Backoff, ExponentialBackoff};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, warn};

use crate::error::EmbeddingError;
use crate::model::{Embedding, EmbeddingProvider};

/// Configuration for [`OpenAiEmbedder`].
#[derive(Debug, Clone)]
pub struct OpenAiEmbedderConfig {
    /// API base URL (e.g., "http://localhost:1234/v1")
    pub base_url: String,

    /// Default embedding model
    pub model: String,

    /// Bearer token; local servers often accept none
    pub api_key: Option<SecretString>,

    /// Request timeout
    pub timeout: Duration,

    /// Attempts per call, including the first one
    pub max_retries: u32,
}

impl OpenAiEmbedderConfig {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
            api_key: None,
            timeout: Duration::from_secs(30),
            max_retries: 3,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(SecretString::from(api_key.into()));
        self
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
    #[serde(default)]
    model: Option<String>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// OpenAI-compatible embedding client.
pub struct OpenAiEmbedder {
    client: Client,
    config: OpenAiEmbedderConfig,
}

impl OpenAiEmbedder {
    pub fn new(config: OpenAiEmbedderConfig) -> Result<Self, EmbeddingError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| EmbeddingError::Config(e.to_string()))?;

        Ok(Self { client, config })
    }

    /// Call the API, retrying transient failures with exponential backoff.
    async fn call_api(&self, text: &str, model: &str) -> Result<Embedding, EmbeddingError> {
        let mut backoff = ExponentialBackoff {
            initial_interval: Duration::from_millis(200),
            max_elapsed_time: Some(Duration::from_secs(60)),
            ..Default::default()
        };

        let mut attempts = 0;

        loop {
            attempts += 1;
            debug!(attempt = attempts, model, "Calling embedding API");

            match self.make_request(text, model).await {
                Ok(embedding) => return Ok(embedding),
                Err(e) if !e.is_transient() => return Err(e),
                Err(e) => {
                    if attempts >= self.config.max_retries {
                        error!(error = %e, attempts, "Embedding API retries exhausted");
                        return Err(e);
                    }

                    match backoff.next_backoff() {
                        Some(duration) => {
                            warn!(
                                error = %e,
                                retry_in_ms = duration.as_millis() as u64,
                                "Embedding call failed, retrying"
                            );
                            tokio::time::sleep(duration).await;
                        }
                        None => {
                            error!(error = %e, "Backoff exhausted");
                            return Err(e);
                        }
                    }
                }
            }
        }
    }

    async fn make_request(&self, text: &str, model: &str) -> Result<Embedding, EmbeddingError> {
        let url = format!("{}/embeddings", self.config.base_url.trim_end_matches('/'));

        let mut request = self
            .client
            .post(&url)
            .json(&EmbeddingRequest { model, input: text });
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key.expose_secret());
        }

        let response = request
            .send()
            .await
            .map_err(|e| EmbeddingError::Api(e.to_string()))?;

        if response.status() == 429 {
            return Err(EmbeddingError::RateLimitExceeded);
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::Api(format!("HTTP {}: {}", status, body)));
        }

        let body: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::Parse(e.to_string()))?;

        let data = body
            .data
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::Parse("No data in response".to_string()))?;

        Ok(Embedding::new(
            data.embedding,
            body.model.unwrap_or_else(|| model.to_string()),
        ))
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedder {
    fn default_model(&self) -> &str {
        &self.config.model
    }

    async fn generate_embedding(
        &self,
        text: &str,
        model: Option<&str>,
    ) -> Result<Embedding, EmbeddingError> {
        let model = model.unwrap_or(&self.config.model);
        self.call_api(text, model).await
    }
}
