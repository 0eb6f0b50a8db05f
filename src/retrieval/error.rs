//! Error types for embedding, indexing and ingestion

use thiserror::Error;

use crate::agents::error::AgentError;

/// Errors raised by the retrieval stack
#[derive(Debug, Error)]
pub enum IndexError {
    /// Embedding endpoint failed or returned an unusable body
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Vector store rejected a request
    #[error("Vector store error: {status} - {message}")]
    VectorStore { status: u16, message: String },

    /// Page could not be fetched
    #[error("Fetch error for {url}: {message}")]
    Fetch { url: String, message: String },

    /// Transport failure talking to a backing service
    #[error("Network error: {0}")]
    Network(String),

    /// Response body could not be decoded
    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for IndexError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            IndexError::Network("request timed out".to_string())
        } else {
            IndexError::Network(err.to_string())
        }
    }
}

impl From<IndexError> for AgentError {
    fn from(err: IndexError) -> Self {
        AgentError::Retrieval(err.to_string())
    }
}

/// Result type alias for retrieval operations
pub type IndexResult<T> = Result<T, IndexError>;
