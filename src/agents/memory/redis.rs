//! Redis-backed history store
//!
//! Each session is one JSON-encoded string under `<prefix><session_id>`,
//! written with `SETEX` and kept alive with `EXPIRE` on every load.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::time::Duration;
use tracing::{error, info};

use super::HistoryStore;
use crate::agents::domain::Message;
use crate::agents::error::HistoryResult;

/// Redis history store using a reconnecting connection manager
#[derive(Clone)]
pub struct RedisHistoryStore {
    manager: ConnectionManager,
    key_prefix: String,
    ttl_secs: u64,
}

impl RedisHistoryStore {
    /// Connect to Redis
    pub async fn connect(url: &str, key_prefix: &str, ttl: Duration) -> HistoryResult<Self> {
        info!("Connecting to Redis history cache");
        let client = redis::Client::open(url)?;
        let manager = ConnectionManager::new(client).await?;
        info!("Connected to Redis history cache");

        Ok(Self {
            manager,
            key_prefix: key_prefix.to_string(),
            ttl_secs: ttl.as_secs().max(1),
        })
    }

    fn key(&self, session_id: &str) -> String {
        format!("{}{}", self.key_prefix, session_id)
    }
}

#[async_trait]
impl HistoryStore for RedisHistoryStore {
    async fn load(&self, session_id: &str) -> HistoryResult<Vec<Message>> {
        let key = self.key(session_id);
        let mut conn = self.manager.clone();

        let data: Option<String> = conn.get(&key).await.map_err(|e| {
            error!(session_id, "Redis GET failed: {}", e);
            e
        })?;

        match data {
            Some(raw) => {
                let _: bool = conn.expire(&key, self.ttl_secs as i64).await?;
                Ok(serde_json::from_str(&raw)?)
            }
            None => Ok(Vec::new()),
        }
    }

    async fn save(&self, session_id: &str, history: &[Message]) -> HistoryResult<()> {
        let serialized = serde_json::to_string(history)?;
        let mut conn = self.manager.clone();

        conn.set_ex::<_, _, ()>(self.key(session_id), serialized, self.ttl_secs)
            .await?;
        Ok(())
    }

    async fn delete(&self, session_id: &str) -> HistoryResult<bool> {
        let mut conn = self.manager.clone();
        let removed: u64 = conn.del(self.key(session_id)).await?;
        Ok(removed > 0)
    }
}
