//! Outbound messaging transport.
//!
//! The dispatcher only knows [`MessageSender`]. Production traffic goes to
//! an HTTP messaging gateway through [`WebhookMessageSender`]; tests use
//! [`RecordingSender`].

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use promo_types::Attachment;

#[derive(Error, Debug)]
pub enum SendError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Gateway rejected message: HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Send timed out after {0:?}")]
    Timeout(Duration),

    #[error("Configuration error: {0}")]
    Config(String),
}

#[async_trait]
pub trait MessageSender: Send + Sync {
    /// Deliver `text` to `to`, with an optional image attached.
    async fn send_message(
        &self,
        to: &str,
        text: &str,
        image: Option<&Attachment>,
    ) -> Result<(), SendError>;

    async fn health_check(&self) -> Result<(), SendError>;
}

/// Configuration for [`WebhookMessageSender`].
#[derive(Debug, Clone)]
pub struct WebhookSenderConfig {
    /// Gateway base URL (e.g., "http://localhost:3000")
    pub gateway_url: String,

    pub api_key: Option<SecretString>,

    /// Request timeout
    pub timeout: Duration,
}

impl WebhookSenderConfig {
    pub fn new(gateway_url: impl Into<String>) -> Self {
        Self {
            gateway_url: gateway_url.into(),
            api_key: None,
            timeout: Duration::from_secs(15),
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(SecretString::from(api_key.into()));
        self
    }
}

#[derive(Serialize)]
struct OutboundMessage<'a> {
    to: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<&'a Attachment>,
}

/// Sends messages by POSTing JSON to `{gateway_url}/messages`.
///
/// The gateway owns the chat session; this side only needs a 2xx back.
pub struct WebhookMessageSender {
    client: Client,
    config: WebhookSenderConfig,
}

impl WebhookMessageSender {
    pub fn new(config: WebhookSenderConfig) -> Result<Self, SendError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| SendError::Config(e.to_string()))?;

        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.gateway_url.trim_end_matches('/'), path)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.api_key {
            Some(key) => request.bearer_auth(key.expose_secret()),
            None => request,
        }
    }
}

#[async_trait]
impl MessageSender for WebhookMessageSender {
    async fn send_message(
        &self,
        to: &str,
        text: &str,
        image: Option<&Attachment>,
    ) -> Result<(), SendError> {
        let body = OutboundMessage {
            to,
            message: text,
            image,
        };

        let response = self
            .authorize(self.client.post(self.url("messages")))
            .json(&body)
            .send()
            .await
            .map_err(|e| SendError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(SendError::Rejected { status, body });
        }

        debug!(to, with_image = image.is_some(), "Message accepted by gateway");
        Ok(())
    }

    async fn health_check(&self) -> Result<(), SendError> {
        let response = self
            .authorize(self.client.get(self.url("health")))
            .send()
            .await
            .map_err(|e| SendError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(SendError::Rejected {
                status: response.status().as_u16(),
                body: String::new(),
            });
        }
        Ok(())
    }
}

/// A message captured by [`RecordingSender`].
#[derive(Debug, Clone, PartialEq)]
pub struct SentMessage {
    pub to: String,
    pub text: String,
    pub image: Option<Attachment>,
}

/// In-process sender for tests: records every delivery and can be told to
/// fail or stall for particular recipients.
#[derive(Default)]
pub struct RecordingSender {
    sent: Mutex<Vec<SentMessage>>,
    failing: Mutex<HashSet<String>>,
    delay: Option<Duration>,
}

impl RecordingSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep this long before every send.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Make sends to `recipient` fail.
    pub fn fail_for(&self, recipient: impl Into<String>) {
        if let Ok(mut failing) = self.failing.lock() {
            failing.insert(recipient.into());
        }
    }

    /// Successful sends so far, in completion order.
    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn recipients(&self) -> Vec<String> {
        self.sent().into_iter().map(|m| m.to).collect()
    }
}

#[async_trait]
impl MessageSender for RecordingSender {
    async fn send_message(
        &self,
        to: &str,
        text: &str,
        image: Option<&Attachment>,
    ) -> Result<(), SendError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let fails = self
            .failing
            .lock()
            .map(|f| f.contains(to))
            .unwrap_or(false);
        if fails {
            return Err(SendError::Transport(format!("recipient {} unreachable", to)));
        }

        self.sent
            .lock()
            .map_err(|e| SendError::Transport(e.to_string()))?
            .push(SentMessage {
                to: to.to_string(),
                text: text.to_string(),
                image: image.cloned(),
            });
        Ok(())
    }

    async fn health_check(&self) -> Result<(), SendError> {
        Ok(())
    }
}
