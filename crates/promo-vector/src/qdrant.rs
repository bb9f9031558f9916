//! Qdrant REST client.
//!
//! Qdrant point ids must be unsigned integers or UUIDs. Taste ids are
//! ULIDs, which are 128-bit like UUIDs, so they are sent in UUID text form.
//! The payload carries the original taste id for the way back.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;
use ulid::Ulid;
use uuid::Uuid;

use promo_types::Distance;

use crate::error::VectorError;
use crate::store::{CollectionInfo, Payload, ScoredPoint, SearchQuery, VectorPoint, VectorStore};

/// Connection settings for [`QdrantStore`].
#[derive(Debug, Clone)]
pub struct QdrantConfig {
    /// Base URL (e.g., "http://localhost:6333")
    pub url: String,
    pub api_key: Option<SecretString>,
    pub collection: String,
    pub timeout: Duration,
}

impl QdrantConfig {
    pub fn new(url: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            api_key: None,
            collection: collection.into(),
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(SecretString::from(api_key.into()));
        self
    }
}

#[derive(Deserialize)]
struct QdrantResponse<T> {
    result: T,
}

#[derive(Deserialize)]
struct CollectionResult {
    config: CollectionConfig,
}

#[derive(Deserialize)]
struct CollectionConfig {
    params: CollectionParams,
}

#[derive(Deserialize)]
struct CollectionParams {
    vectors: Value,
}

#[derive(Serialize)]
struct PointStruct<'a> {
    id: String,
    vector: &'a [f32],
    payload: &'a Payload,
}

#[derive(Deserialize)]
struct SearchHit {
    id: Value,
    score: f32,
    #[serde(default)]
    payload: Option<Payload>,
}

/// Vector store backed by a Qdrant collection.
pub struct QdrantStore {
    client: Client,
    config: QdrantConfig,
}

impl QdrantStore {
    pub fn new(config: QdrantConfig) -> Result<Self, VectorError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| VectorError::Config(e.to_string()))?;

        Ok(Self { client, config })
    }

    fn collection_url(&self, suffix: &str) -> String {
        format!(
            "{}/collections/{}{}",
            self.config.url.trim_end_matches('/'),
            self.config.collection,
            suffix
        )
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, VectorError> {
        let request = match &self.config.api_key {
            Some(key) => request.header("api-key", key.expose_secret()),
            None => request,
        };
        request
            .send()
            .await
            .map_err(|e| VectorError::Request(e.to_string()))
    }

    async fn check(response: Response) -> Result<Response, VectorError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(VectorError::Api { status, body })
    }
}

/// Encode a point id the way Qdrant accepts it.
///
/// ULIDs become UUID-formatted strings of the same 128 bits; anything else
/// (UUIDs, numeric ids) is passed through unchanged.
pub fn encode_point_id(id: &str) -> String {
    match Ulid::from_string(id) {
        Ok(ulid) => Uuid::from_u128(ulid.0).to_string(),
        Err(_) => id.to_string(),
    }
}

fn parse_distance(value: &str) -> Option<Distance> {
    match value {
        "Cosine" => Some(Distance::Cosine),
        "Dot" => Some(Distance::Dot),
        "Euclid" => Some(Distance::Euclid),
        _ => None,
    }
}

fn id_to_string(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn collection_info(&self) -> Result<Option<CollectionInfo>, VectorError> {
        let response = self.send(self.client.get(self.collection_url(""))).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let body: QdrantResponse<CollectionResult> = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| VectorError::Parse(e.to_string()))?;

        // Unnamed vectors look like {"size": 1024, "distance": "Cosine"};
        // named vectors are a map of those and are not interpreted here.
        let vectors = &body.result.config.params.vectors;
        Ok(Some(CollectionInfo {
            dimension: vectors
                .get("size")
                .and_then(Value::as_u64)
                .map(|s| s as usize),
            distance: vectors
                .get("distance")
                .and_then(Value::as_str)
                .and_then(parse_distance),
        }))
    }

    async fn create_collection(
        &self,
        dimension: usize,
        distance: Distance,
    ) -> Result<(), VectorError> {
        let body = json!({
            "vectors": { "size": dimension, "distance": distance.as_str() }
        });
        let response = self
            .send(self.client.put(self.collection_url("")).json(&body))
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn upsert(&self, points: Vec<VectorPoint>) -> Result<(), VectorError> {
        if points.is_empty() {
            return Ok(());
        }
        let wire: Vec<PointStruct<'_>> = points
            .iter()
            .map(|p| PointStruct {
                id: encode_point_id(&p.id),
                vector: &p.vector,
                payload: &p.payload,
            })
            .collect();

        let response = self
            .send(
                self.client
                    .put(self.collection_url("/points?wait=true"))
                    .json(&json!({ "points": wire })),
            )
            .await?;
        Self::check(response).await?;
        debug!(count = points.len(), "Upserted points");
        Ok(())
    }

    async fn delete(&self, ids: Vec<String>) -> Result<(), VectorError> {
        if ids.is_empty() {
            return Ok(());
        }
        let wire: Vec<String> = ids.iter().map(|id| encode_point_id(id)).collect();
        let response = self
            .send(
                self.client
                    .post(self.collection_url("/points/delete?wait=true"))
                    .json(&json!({ "points": wire })),
            )
            .await?;
        Self::check(response).await?;
        debug!(count = ids.len(), "Deleted points");
        Ok(())
    }

    async fn search(&self, query: SearchQuery) -> Result<Vec<ScoredPoint>, VectorError> {
        let mut body = json!({
            "vector": query.vector,
            "limit": query.limit,
            "offset": query.offset,
            "with_payload": true,
        });
        if let Some(threshold) = query.score_threshold {
            body["score_threshold"] = json!(threshold);
        }

        let response = self
            .send(
                self.client
                    .post(self.collection_url("/points/search"))
                    .json(&body),
            )
            .await?;

        let hits: QdrantResponse<Vec<SearchHit>> = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| VectorError::Parse(e.to_string()))?;

        Ok(hits
            .result
            .into_iter()
            .map(|hit| ScoredPoint {
                id: id_to_string(&hit.id),
                score: hit.score,
                payload: hit.payload.unwrap_or_default(),
            })
            .collect())
    }

    async fn health_check(&self) -> Result<(), VectorError> {
        let url = format!("{}/collections", self.config.url.trim_end_matches('/'));
        let response = self.send(self.client.get(url)).await?;
        Self::check(response).await?;
        Ok(())
    }
}
