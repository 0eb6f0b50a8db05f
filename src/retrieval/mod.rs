//! Document retrieval for the query agent
//!
//! - `embedding`: text to vector providers
//! - `vector_index`: Qdrant and in-memory nearest-neighbour stores
//! - `splitter`: recursive character chunking
//! - `loader`: page fetching and HTML text extraction
//! - `ingest`: the scrape → chunk → embed → upsert pipeline

pub mod embedding;
pub mod error;
pub mod ingest;
pub mod loader;
pub mod splitter;
pub mod vector_index;

pub use embedding::{EmbeddingProvider, HashingEmbedder, OpenAiEmbedder};
pub use error::{IndexError, IndexResult};
pub use ingest::Ingestor;
pub use loader::{DocumentLoader, HttpLoader, LoadedPage, StaticLoader};
pub use splitter::{TextChunk, TextSplitter};
pub use vector_index::{DocumentChunk, InMemoryIndex, QdrantIndex, VectorIndex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::agents::domain::{ContextChunk, ContextRetriever};
use crate::agents::error::AgentResult;

/// Embedding model configuration (OpenAI-compatible `/embeddings` endpoint)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmbeddingConfig {
    /// Model identifier sent with each request
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_embedding_url")]
    pub base_url: String,
    /// Environment variable holding a bearer token, if the endpoint needs one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    /// Vector size of the model, used when creating the collection
    #[serde(default = "default_dimensions")]
    pub dimensions: u64,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: default_embedding_model(),
            base_url: default_embedding_url(),
            api_key_env: None,
            dimensions: default_dimensions(),
            timeout_secs: default_timeout(),
        }
    }
}

fn default_embedding_model() -> String {
    "sentence-transformers/all-MiniLM-L6-v2".to_string()
}

fn default_embedding_url() -> String {
    "http://127.0.0.1:8080/v1".to_string()
}

fn default_dimensions() -> u64 {
    384
}

fn default_timeout() -> u64 {
    30
}

/// Where the index lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum IndexBackend {
    /// Qdrant over REST
    #[default]
    Qdrant,
    /// Process-local, lost on restart
    Memory,
}

/// Vector index configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VectorIndexConfig {
    #[serde(default)]
    pub backend: IndexBackend,
    #[serde(default = "default_qdrant_url")]
    pub url: String,
    #[serde(default = "default_collection")]
    pub collection: String,
    /// Environment variable holding the Qdrant API key, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for VectorIndexConfig {
    fn default() -> Self {
        Self {
            backend: IndexBackend::default(),
            url: default_qdrant_url(),
            collection: default_collection(),
            api_key_env: None,
            timeout_secs: default_timeout(),
        }
    }
}

fn default_qdrant_url() -> String {
    "http://127.0.0.1:6333".to_string()
}

fn default_collection() -> String {
    "uellosend_docs".to_string()
}

/// Scraper and chunking configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IngestConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            user_agent: default_user_agent(),
            timeout_secs: default_timeout(),
        }
    }
}

fn default_chunk_size() -> usize {
    500
}

fn default_chunk_overlap() -> usize {
    50
}

fn default_user_agent() -> String {
    concat!("uellogent/", env!("CARGO_PKG_VERSION")).to_string()
}

/// Build the configured vector index
pub fn create_index(config: &VectorIndexConfig) -> IndexResult<Arc<dyn VectorIndex>> {
    match config.backend {
        IndexBackend::Qdrant => Ok(Arc::new(QdrantIndex::new(config)?)),
        IndexBackend::Memory => Ok(Arc::new(InMemoryIndex::new())),
    }
}

/// Context retriever backed by an embedder and a vector index
pub struct IndexRetriever {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
}

impl IndexRetriever {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, index: Arc<dyn VectorIndex>) -> Self {
        Self { embedder, index }
    }
}

#[async_trait]
impl ContextRetriever for IndexRetriever {
    async fn retrieve(&self, query: &str, limit: usize) -> AgentResult<Vec<ContextChunk>> {
        let vector = self.embedder.embed_query(query).await?;
        let hits = self.index.search(&vector, limit).await?;

        Ok(hits
            .into_iter()
            .map(|chunk| ContextChunk {
                text: chunk.text,
                title: chunk.title,
                url: chunk.source,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_retriever_maps_chunks_to_context() {
        let embedder = Arc::new(HashingEmbedder::new(64));
        let index = Arc::new(InMemoryIndex::new());
        let texts = ["reset your password from the login page", "top up credit with mobile money"];
        let vectors = embedder
            .embed(&texts.iter().map(|t| t.to_string()).collect::<Vec<_>>())
            .await
            .unwrap();
        let points = texts
            .iter()
            .zip(vectors)
            .map(|(text, v)| {
                (
                    DocumentChunk {
                        text: text.to_string(),
                        title: "Help".to_string(),
                        source: "https://uellosend.com/help".to_string(),
                        start_index: 0,
                    },
                    v,
                )
            })
            .collect();
        index.upsert(points).await.unwrap();

        let retriever = IndexRetriever::new(embedder, index);
        let contexts = retriever.retrieve("how do I reset my password", 1).await.unwrap();

        assert_eq!(contexts.len(), 1);
        assert_eq!(contexts[0].text, "reset your password from the login page");
        assert_eq!(contexts[0].url, "https://uellosend.com/help");
    }
}
