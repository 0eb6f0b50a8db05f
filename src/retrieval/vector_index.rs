//! Vector index over document chunks
//!
//! Points carry the payload layout `{page_content, metadata: {source, title,
//! start_index}}` so collections stay readable by other tooling that expects
//! that shape.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::info;

use super::error::{IndexError, IndexResult};
use super::VectorIndexConfig;

/// A piece of a scraped page, as stored in the index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub text: String,
    pub title: String,
    pub source: String,
    pub start_index: usize,
}

impl DocumentChunk {
    fn to_payload(&self) -> Value {
        json!({
            "page_content": self.text,
            "metadata": {
                "source": self.source,
                "title": self.title,
                "start_index": self.start_index,
            }
        })
    }

    fn from_payload(payload: &Value) -> Option<Self> {
        let metadata = payload.get("metadata");
        let field = |name: &str| {
            metadata
                .and_then(|m| m.get(name))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };

        Some(Self {
            text: payload.get("page_content")?.as_str()?.to_string(),
            title: field("title"),
            source: field("source"),
            start_index: metadata
                .and_then(|m| m.get("start_index"))
                .and_then(Value::as_u64)
                .unwrap_or(0) as usize,
        })
    }
}

/// Port for a nearest-neighbour store
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Create the backing collection if it does not exist yet
    async fn ensure_collection(&self, dimensions: u64) -> IndexResult<()>;

    /// Store chunks with their vectors, returning how many were written
    async fn upsert(&self, points: Vec<(DocumentChunk, Vec<f32>)>) -> IndexResult<usize>;

    /// Up to `limit` chunks nearest to `vector`, best first
    async fn search(&self, vector: &[f32], limit: usize) -> IndexResult<Vec<DocumentChunk>>;
}

/// Qdrant REST client
pub struct QdrantIndex {
    client: reqwest::Client,
    base_url: String,
    collection: String,
    api_key: Option<SecretString>,
}

impl QdrantIndex {
    pub fn new(config: &VectorIndexConfig) -> IndexResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| IndexError::Network(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            collection: config.collection.clone(),
            api_key: config
                .api_key_env
                .as_deref()
                .and_then(|var| std::env::var(var).ok())
                .map(SecretString::from),
        })
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/collections/{}{}", self.base_url, self.collection, path);
        let builder = self.client.request(method, url);
        match &self.api_key {
            Some(key) => builder.header("api-key", key.expose_secret()),
            None => builder,
        }
    }

    async fn check(response: reqwest::Response) -> IndexResult<Value> {
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(IndexError::VectorStore {
                status: status.as_u16(),
                message,
            });
        }
        response
            .json()
            .await
            .map_err(|e| IndexError::Parse(format!("Failed to parse Qdrant response: {}", e)))
    }
}

#[async_trait]
impl VectorIndex for QdrantIndex {
    async fn ensure_collection(&self, dimensions: u64) -> IndexResult<()> {
        let response = self.request(reqwest::Method::GET, "").send().await?;
        if response.status().is_success() {
            return Ok(());
        }
        if response.status() != reqwest::StatusCode::NOT_FOUND {
            Self::check(response).await?;
            return Ok(());
        }

        info!(collection = %self.collection, dimensions, "Creating Qdrant collection");
        let response = self
            .request(reqwest::Method::PUT, "")
            .json(&json!({ "vectors": { "size": dimensions, "distance": "Cosine" } }))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn upsert(&self, points: Vec<(DocumentChunk, Vec<f32>)>) -> IndexResult<usize> {
        if points.is_empty() {
            return Ok(0);
        }

        let count = points.len();
        let body: Vec<Value> = points
            .into_iter()
            .map(|(chunk, vector)| {
                json!({
                    "id": uuid::Uuid::new_v4().to_string(),
                    "vector": vector,
                    "payload": chunk.to_payload(),
                })
            })
            .collect();

        let response = self
            .request(reqwest::Method::PUT, "/points?wait=true")
            .json(&json!({ "points": body }))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(count)
    }

    async fn search(&self, vector: &[f32], limit: usize) -> IndexResult<Vec<DocumentChunk>> {
        let response = self
            .request(reqwest::Method::POST, "/points/search")
            .json(&json!({ "vector": vector, "limit": limit, "with_payload": true }))
            .send()
            .await?;

        let body = Self::check(response).await?;
        let hits = body
            .get("result")
            .and_then(Value::as_array)
            .ok_or_else(|| IndexError::Parse("search response has no result array".to_string()))?;

        Ok(hits
            .iter()
            .filter_map(|hit| hit.get("payload"))
            .filter_map(DocumentChunk::from_payload)
            .collect())
    }
}

/// Brute-force cosine index held in memory
#[derive(Default)]
pub struct InMemoryIndex {
    points: RwLock<Vec<(DocumentChunk, Vec<f32>)>>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.points.read().await.len()
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        dot / (na * nb)
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn ensure_collection(&self, _dimensions: u64) -> IndexResult<()> {
        Ok(())
    }

    async fn upsert(&self, points: Vec<(DocumentChunk, Vec<f32>)>) -> IndexResult<usize> {
        let count = points.len();
        self.points.write().await.extend(points);
        Ok(count)
    }

    async fn search(&self, vector: &[f32], limit: usize) -> IndexResult<Vec<DocumentChunk>> {
        let points = self.points.read().await;
        let mut scored: Vec<(f32, &DocumentChunk)> = points
            .iter()
            .map(|(chunk, v)| (cosine(vector, v), chunk))
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));

        Ok(scored
            .into_iter()
            .take(limit)
            .map(|(_, chunk)| chunk.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(text: &str) -> DocumentChunk {
        DocumentChunk {
            text: text.to_string(),
            title: "UelloSend".to_string(),
            source: "https://uellosend.com".to_string(),
            start_index: 0,
        }
    }

    #[test]
    fn test_payload_layout_round_trips() {
        let original = DocumentChunk {
            start_index: 42,
            ..chunk("Bulk SMS made easy")
        };

        let payload = original.to_payload();

        assert_eq!(payload["page_content"], "Bulk SMS made easy");
        assert_eq!(payload["metadata"]["source"], "https://uellosend.com");
        assert_eq!(DocumentChunk::from_payload(&payload), Some(original));
    }

    #[test]
    fn test_payload_without_text_is_skipped() {
        assert!(DocumentChunk::from_payload(&json!({"metadata": {}})).is_none());
    }

    #[tokio::test]
    async fn test_in_memory_search_orders_by_similarity() {
        let index = InMemoryIndex::new();
        index
            .upsert(vec![
                (chunk("far"), vec![0.0, 1.0]),
                (chunk("near"), vec![1.0, 0.1]),
                (chunk("middle"), vec![1.0, 1.0]),
            ])
            .await
            .unwrap();

        let hits = index.search(&[1.0, 0.0], 2).await.unwrap();

        assert_eq!(index.len().await, 3);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].text, "near");
        assert_eq!(hits[1].text, "middle");
    }

    #[tokio::test]
    async fn test_empty_index_returns_nothing() {
        let index = InMemoryIndex::new();
        assert!(index.search(&[1.0], 5).await.unwrap().is_empty());
    }
}
