//! Dependency health report.
//!
//! Every probe runs concurrently and each result is recorded, whether the
//! probe succeeded, failed or timed out.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use promo_extractor::CompletionProvider;
use promo_storage::UserRepository;
use promo_vector::TasteVectorIndex;

use crate::sender::MessageSender;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Up,
    Down,
    Degraded,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DependencyHealth {
    pub name: String,
    pub status: HealthStatus,
    pub response_time_ms: u64,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub timestamp: DateTime<Utc>,
    pub uptime_secs: u64,
    pub dependencies: Vec<DependencyHealth>,
}

/// One dependency check.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    fn name(&self) -> &str;

    /// Status reported when the probe fails. Dependencies the pipeline can
    /// limp along without report `Degraded`.
    fn failure_status(&self) -> HealthStatus {
        HealthStatus::Down
    }

    async fn probe(&self) -> Result<(), String>;
}

struct StorageProbe(Arc<dyn UserRepository>);

#[async_trait]
impl HealthProbe for StorageProbe {
    fn name(&self) -> &str {
        "storage"
    }

    async fn probe(&self) -> Result<(), String> {
        self.0.ping().await.map_err(|e| e.to_string())
    }
}

struct VectorProbe(Arc<TasteVectorIndex>);

#[async_trait]
impl HealthProbe for VectorProbe {
    fn name(&self) -> &str {
        "vector_store"
    }

    async fn probe(&self) -> Result<(), String> {
        self.0.health_check().await.map_err(|e| e.to_string())
    }
}

struct LlmProbe(Arc<dyn CompletionProvider>);

#[async_trait]
impl HealthProbe for LlmProbe {
    fn name(&self) -> &str {
        "llm"
    }

    async fn probe(&self) -> Result<(), String> {
        self.0.health_check().await.map_err(|e| e.to_string())
    }
}

struct MessagingProbe(Arc<dyn MessageSender>);

#[async_trait]
impl HealthProbe for MessagingProbe {
    fn name(&self) -> &str {
        "messaging"
    }

    fn failure_status(&self) -> HealthStatus {
        HealthStatus::Degraded
    }

    async fn probe(&self) -> Result<(), String> {
        self.0.health_check().await.map_err(|e| e.to_string())
    }
}

pub struct HealthService {
    probes: Vec<Arc<dyn HealthProbe>>,
    probe_timeout: Duration,
    started: Instant,
}

impl HealthService {
    pub fn new(probe_timeout: Duration) -> Self {
        Self {
            probes: Vec::new(),
            probe_timeout,
            started: Instant::now(),
        }
    }

    /// Probes for storage, vector store, LLM and messaging gateway.
    pub fn for_dependencies(
        users: Arc<dyn UserRepository>,
        index: Arc<TasteVectorIndex>,
        llm: Arc<dyn CompletionProvider>,
        sender: Arc<dyn MessageSender>,
        probe_timeout: Duration,
    ) -> Self {
        Self::new(probe_timeout)
            .with_probe(Arc::new(StorageProbe(users)))
            .with_probe(Arc::new(VectorProbe(index)))
            .with_probe(Arc::new(LlmProbe(llm)))
            .with_probe(Arc::new(MessagingProbe(sender)))
    }

    pub fn with_probe(mut self, probe: Arc<dyn HealthProbe>) -> Self {
        self.probes.push(probe);
        self
    }

    pub async fn check(&self) -> HealthReport {
        let dependencies =
            join_all(self.probes.iter().map(|probe| self.run_probe(probe.as_ref()))).await;
        let status = overall_status(&dependencies);

        info!(status = ?status, dependencies = dependencies.len(), "Health check complete");
        HealthReport {
            status,
            timestamp: Utc::now(),
            uptime_secs: self.started.elapsed().as_secs(),
            dependencies,
        }
    }

    async fn run_probe(&self, probe: &dyn HealthProbe) -> DependencyHealth {
        let start = Instant::now();
        let result = tokio::time::timeout(self.probe_timeout, probe.probe())
            .await
            .unwrap_or_else(|_| Err(format!("timed out after {:?}", self.probe_timeout)));
        let response_time_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(()) => DependencyHealth {
                name: probe.name().to_string(),
                status: HealthStatus::Up,
                response_time_ms,
                message: "ok".to_string(),
            },
            Err(message) => {
                warn!(dependency = probe.name(), error = %message, "Health probe failed");
                DependencyHealth {
                    name: probe.name().to_string(),
                    status: probe.failure_status(),
                    response_time_ms,
                    message,
                }
            }
        }
    }
}

/// `Up` when everything is up, `Down` when anything is down, otherwise
/// `Degraded`.
fn overall_status(dependencies: &[DependencyHealth]) -> HealthStatus {
    if dependencies.iter().any(|d| d.status == HealthStatus::Down) {
        HealthStatus::Down
    } else if dependencies.iter().all(|d| d.status == HealthStatus::Up) {
        HealthStatus::Up
    } else {
        HealthStatus::Degraded
    }
}
