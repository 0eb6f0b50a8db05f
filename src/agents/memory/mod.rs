//! Conversation history storage for the query agent
//!
//! The query agent keeps no in-process state: each request loads the
//! ordered turns for its session, appends to them, and saves them back.
//! Entries expire after the session timeout and every load refreshes it.
//!
//! - In-memory (default, lost on restart)
//! - Redis (shared across instances)

mod in_memory;
mod redis;

pub use self::redis::RedisHistoryStore;
pub use in_memory::InMemoryHistoryStore;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::agents::config::{HistoryBackend, HistoryConfig};
use crate::agents::domain::Message;
use crate::agents::error::{HistoryError, HistoryResult};

/// Trait for history storage backends
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Load the turns for a session, refreshing its expiry.
    /// A missing session yields an empty history.
    async fn load(&self, session_id: &str) -> HistoryResult<Vec<Message>>;

    /// Replace the stored turns for a session and reset its expiry
    async fn save(&self, session_id: &str, history: &[Message]) -> HistoryResult<()>;

    /// Remove a session, returning whether a live entry existed
    async fn delete(&self, session_id: &str) -> HistoryResult<bool>;
}

/// Create a history store from configuration
pub async fn create_store(
    config: &HistoryConfig,
    ttl: Duration,
) -> HistoryResult<Arc<dyn HistoryStore>> {
    match config.backend {
        HistoryBackend::Memory => Ok(Arc::new(InMemoryHistoryStore::new(ttl))),
        HistoryBackend::Redis => {
            let url = config.redis_url.as_deref().ok_or_else(|| {
                HistoryError::Backend("history.redis_url is required for the redis backend".to_string())
            })?;
            let store = RedisHistoryStore::connect(url, &config.key_prefix, ttl).await?;
            Ok(Arc::new(store))
        }
    }
}
