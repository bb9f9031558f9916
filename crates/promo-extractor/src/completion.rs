//! Chat completion trait and the OpenAI-compatible HTTP client.

use async_trait::async_trait;
use backoff::{backoff::Backoff, ExponentialBackoff};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, warn};

/// Error type for completion calls.
#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("API request failed: {0}")]
    ApiError(String),

    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Invalid configuration: {0}")]
    ConfigError(String),
}

impl CompletionError {
    fn is_transient(&self) -> bool {
        matches!(
            self,
            CompletionError::ApiError(_) | CompletionError::RateLimitExceeded
        )
    }
}

/// One chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// A chat completion request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionRequest {
    pub model: String,
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    pub messages: Vec<ChatMessage>,
}

/// Source of chat completions.
///
/// Only the content of the first choice is returned.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<String, CompletionError>;

    /// Cheap reachability probe.
    async fn health_check(&self) -> Result<(), CompletionError>;
}

/// Configuration for [`ApiCompletionClient`].
#[derive(Debug, Clone)]
pub struct ApiCompletionConfig {
    /// API base URL (e.g., "https://api.openai.com/v1")
    pub base_url: String,

    pub api_key: Option<SecretString>,

    /// Request timeout
    pub timeout: Duration,

    /// Attempts per call, including the first one
    pub max_retries: u32,
}

impl ApiCompletionConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: None,
            timeout: Duration::from_secs(60),
            max_retries: 3,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(SecretString::from(api_key.into()));
        self
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI-compatible chat completion client.
pub struct ApiCompletionClient {
    client: Client,
    config: ApiCompletionConfig,
}

impl ApiCompletionClient {
    pub fn new(config: ApiCompletionConfig) -> Result<Self, CompletionError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| CompletionError::ConfigError(e.to_string()))?;

        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.api_key {
            Some(key) => request.bearer_auth(key.expose_secret()),
            None => request,
        }
    }

    /// Call the API with retry logic.
    async fn call_api(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        let mut backoff = ExponentialBackoff {
            max_elapsed_time: Some(Duration::from_secs(120)),
            ..Default::default()
        };

        let mut attempts = 0;

        loop {
            attempts += 1;
            debug!(attempt = attempts, model = %request.model, "Calling completion API");

            match self.make_request(request).await {
                Ok(response) => return Ok(response),
                Err(e) if !e.is_transient() => return Err(e),
                Err(e) => {
                    if attempts >= self.config.max_retries {
                        error!(error = %e, "Max retries exceeded");
                        return Err(e);
                    }

                    match backoff.next_backoff() {
                        Some(duration) => {
                            warn!(
                                error = %e,
                                retry_in_ms = duration.as_millis() as u64,
                                "API call failed, retrying"
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

    async fn make_request(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        let response = self
            .authorize(self.client.post(self.url("chat/completions")))
            .json(request)
            .send()
            .await
            .map_err(|e| CompletionError::ApiError(e.to_string()))?;

        if response.status() == 429 {
            return Err(CompletionError::RateLimitExceeded);
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionError::ApiError(format!(
                "HTTP {}: {}",
                status, body
            )));
        }

        let response_body: ChatResponse = response
            .json()
            .await
            .map_err(|e| CompletionError::ParseError(e.to_string()))?;

        response_body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|content| !content.is_empty())
            .ok_or_else(|| CompletionError::ParseError("No content in response".to_string()))
    }
}

#[async_trait]
impl CompletionProvider for ApiCompletionClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String, CompletionError> {
        self.call_api(&request).await
    }

    async fn health_check(&self) -> Result<(), CompletionError> {
        let response = self
            .authorize(self.client.get(self.url("models")))
            .send()
            .await
            .map_err(|e| CompletionError::ApiError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(CompletionError::ApiError(format!(
                "HTTP {}",
                response.status()
            )));
        }
        Ok(())
    }
}
