//! Scrape, chunk, embed and index web pages

use std::sync::Arc;

use tracing::{info, warn};

use super::embedding::EmbeddingProvider;
use super::error::IndexResult;
use super::loader::DocumentLoader;
use super::splitter::TextSplitter;
use super::vector_index::{DocumentChunk, VectorIndex};

const EMBED_BATCH: usize = 64;

/// Pipeline feeding the query agent's index
pub struct Ingestor {
    loader: Arc<dyn DocumentLoader>,
    splitter: TextSplitter,
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
}

impl Ingestor {
    pub fn new(
        loader: Arc<dyn DocumentLoader>,
        splitter: TextSplitter,
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
    ) -> Self {
        Self {
            loader,
            splitter,
            embedder,
            index,
        }
    }

    /// Fetch and chunk every URL. Pages that fail to load are skipped.
    pub async fn collect_chunks(&self, urls: &[String]) -> Vec<DocumentChunk> {
        let mut chunks = Vec::new();

        for url in urls {
            let page = match self.loader.load(url).await {
                Ok(page) => page,
                Err(e) => {
                    warn!(url = %url, "Skipping page: {}", e);
                    continue;
                }
            };

            let before = chunks.len();
            chunks.extend(self.splitter.split_with_offsets(&page.text).into_iter().map(
                |piece| DocumentChunk {
                    text: piece.text,
                    title: page.title.clone(),
                    source: page.url.clone(),
                    start_index: piece.start_index,
                },
            ));
            info!(url = %url, chunks = chunks.len() - before, "Page split");
        }

        chunks
    }

    /// Index the given pages, returning the number of chunks stored
    pub async fn ingest(&self, urls: &[String]) -> IndexResult<usize> {
        let chunks = self.collect_chunks(urls).await;
        if chunks.is_empty() {
            return Ok(0);
        }

        self.index.ensure_collection(self.embedder.dimensions()).await?;

        let mut stored = 0;
        for batch in chunks.chunks(EMBED_BATCH) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let vectors = self.embedder.embed(&texts).await?;
            let points = batch.iter().cloned().zip(vectors).collect();
            stored += self.index.upsert(points).await?;
        }

        info!(documents = stored, "Ingestion complete");
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::{HashingEmbedder, InMemoryIndex, StaticLoader};

    fn ingestor(index: Arc<InMemoryIndex>) -> Ingestor {
        let loader = StaticLoader::new()
            .with_page(
                "https://uellosend.com/faq",
                "FAQ",
                "How do I top up credit? Pay with mobile money.\n\nHow do I verify my account? Click the link in your email.",
            )
            .with_page("https://uellosend.com/empty", "Empty", "   ");

        Ingestor::new(
            Arc::new(loader),
            TextSplitter::new(60, 10),
            Arc::new(HashingEmbedder::new(32)),
            index,
        )
    }

    #[tokio::test]
    async fn test_ingest_indexes_every_chunk_with_metadata() {
        let index = Arc::new(InMemoryIndex::new());
        let urls = vec![
            "https://uellosend.com/faq".to_string(),
            "https://uellosend.com/missing".to_string(),
            "https://uellosend.com/empty".to_string(),
        ];

        let stored = ingestor(index.clone()).ingest(&urls).await.unwrap();

        assert_eq!(stored, 2);
        assert_eq!(index.len().await, 2);
        let hits = index.search(&[1.0; 32], 5).await.unwrap();
        assert!(hits.iter().all(|c| c.title == "FAQ" && c.source == "https://uellosend.com/faq"));
    }

    #[tokio::test]
    async fn test_nothing_to_index_returns_zero() {
        let index = Arc::new(InMemoryIndex::new());
        let stored = ingestor(index.clone())
            .ingest(&["https://uellosend.com/missing".to_string()])
            .await
            .unwrap();

        assert_eq!(stored, 0);
        assert_eq!(index.len().await, 0);
    }
}
