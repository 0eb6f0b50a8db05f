//! In-memory history store

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use super::HistoryStore;
use crate::agents::domain::Message;
use crate::agents::error::HistoryResult;

struct Entry {
    messages: Vec<Message>,
    expires_at: Instant,
}

/// In-memory history store with per-entry expiry
pub struct InMemoryHistoryStore {
    sessions: Arc<RwLock<HashMap<String, Entry>>>,
    ttl: Duration,
}

impl InMemoryHistoryStore {
    /// Create a new in-memory store
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }
}

#[async_trait]
impl HistoryStore for InMemoryHistoryStore {
    async fn load(&self, session_id: &str) -> HistoryResult<Vec<Message>> {
        let mut sessions = self.sessions.write().await;
        let now = Instant::now();

        match sessions.get_mut(session_id) {
            Some(entry) if entry.expires_at > now => {
                entry.expires_at = now + self.ttl;
                Ok(entry.messages.clone())
            }
            Some(_) => {
                sessions.remove(session_id);
                Ok(Vec::new())
            }
            None => Ok(Vec::new()),
        }
    }

    async fn save(&self, session_id: &str, history: &[Message]) -> HistoryResult<()> {
        let mut sessions = self.sessions.write().await;
        let now = Instant::now();

        // Sessions nobody reloads would otherwise linger forever
        sessions.retain(|_, entry| entry.expires_at > now);
        sessions.insert(
            session_id.to_string(),
            Entry {
                messages: history.to_vec(),
                expires_at: now + self.ttl,
            },
        );
        Ok(())
    }

    async fn delete(&self, session_id: &str) -> HistoryResult<bool> {
        let mut sessions = self.sessions.write().await;
        let now = Instant::now();
        Ok(sessions
            .remove(session_id)
            .map_or(false, |entry| entry.expires_at > now))
    }
}
