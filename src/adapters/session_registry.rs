//! Session Registry
//!
//! Holds the live support agents keyed by the caller's session id. Each agent
//! sits behind its own mutex so turns for one session are serialized while
//! different sessions run in parallel. A background sweep evicts sessions
//! idle for longer than the configured timeout.
//!
//! The sweep runs on a fixed interval, so an idle session can outlive the
//! timeout by up to one interval.

use futures::FutureExt;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::agents::error::AgentResult;

/// Error type for SessionRegistry
#[derive(Debug, Error)]
pub enum SessionRegistryError {
    #[error("Session not found: {0}")]
    NotFound(String),
}

/// Builds a fresh agent for a new session
pub type AgentFactory<A> = Arc<dyn Fn() -> AgentResult<A> + Send + Sync>;

struct SessionEntry<A> {
    agent: Arc<Mutex<A>>,
    last_accessed: Instant,
}

/// Lock-guarded map from session id to agent
pub struct SessionRegistry<A> {
    sessions: RwLock<HashMap<String, SessionEntry<A>>>,
    factory: AgentFactory<A>,
    timeout: Duration,
}

impl<A: Send + 'static> SessionRegistry<A> {
    /// Create a registry evicting sessions idle for longer than `timeout`
    pub fn new(timeout: Duration, factory: AgentFactory<A>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            factory,
            timeout,
        }
    }

    /// Return the session's agent, creating it on first use.
    /// Either way the session's last-accessed time is set to now.
    pub async fn get_or_create(&self, session_id: &str) -> AgentResult<Arc<Mutex<A>>> {
        let mut sessions = self.sessions.write().await;

        if let Some(entry) = sessions.get_mut(session_id) {
            entry.last_accessed = Instant::now();
            return Ok(entry.agent.clone());
        }

        let agent = Arc::new(Mutex::new((self.factory)()?));
        sessions.insert(
            session_id.to_string(),
            SessionEntry {
                agent: agent.clone(),
                last_accessed: Instant::now(),
            },
        );
        info!(session_id = %session_id, "Created new session");

        Ok(agent)
    }

    /// Stamp the session as used now. Returns false if it does not exist.
    pub async fn touch(&self, session_id: &str) -> bool {
        match self.sessions.write().await.get_mut(session_id) {
            Some(entry) => {
                entry.last_accessed = Instant::now();
                true
            }
            None => false,
        }
    }

    /// Remove a session
    pub async fn delete(&self, session_id: &str) -> Result<(), SessionRegistryError> {
        match self.sessions.write().await.remove(session_id) {
            Some(_) => {
                debug!(session_id = %session_id, "Session deleted");
                Ok(())
            }
            None => Err(SessionRegistryError::NotFound(session_id.to_string())),
        }
    }

    pub async fn contains(&self, session_id: &str) -> bool {
        self.sessions.read().await.contains_key(session_id)
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Evict every session whose idle time at `now` exceeds the timeout.
    /// Returns the number of sessions removed.
    pub async fn sweep_at(&self, now: Instant) -> usize {
        let expired: Vec<String> = {
            let sessions = self.sessions.read().await;
            sessions
                .iter()
                .filter(|(_, entry)| now.saturating_duration_since(entry.last_accessed) > self.timeout)
                .map(|(id, _)| id.clone())
                .collect()
        };

        if expired.is_empty() {
            return 0;
        }

        let mut sessions = self.sessions.write().await;
        let mut removed = 0;
        for id in expired {
            // re-check: the session may have been used since the snapshot
            let still_idle = sessions
                .get(&id)
                .map(|entry| now.saturating_duration_since(entry.last_accessed) > self.timeout)
                .unwrap_or(false);
            if still_idle {
                sessions.remove(&id);
                debug!(session_id = %id, "Session expired");
                removed += 1;
            }
        }

        removed
    }

    /// Evict idle sessions as of now
    pub async fn sweep(&self) -> usize {
        self.sweep_at(Instant::now()).await
    }

    /// Run the sweep every `every` until the returned handle is aborted.
    /// A panicking sweep is logged and the loop carries on.
    pub fn spawn_sweeper(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let registry = Arc::clone(self);

        tokio::spawn(async move {
            let mut ticker = interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // the first tick completes immediately
            ticker.tick().await;

            loop {
                ticker.tick().await;

                match AssertUnwindSafe(registry.sweep()).catch_unwind().await {
                    Ok(0) => debug!("Session sweep found nothing to evict"),
                    Ok(removed) => info!(removed, "Evicted idle sessions"),
                    Err(_) => error!("Session sweep panicked; will retry next interval"),
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::error::AgentError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const TIMEOUT: Duration = Duration::from_secs(15 * 60);

    fn counting_registry() -> (SessionRegistry<usize>, Arc<AtomicUsize>) {
        let built = Arc::new(AtomicUsize::new(0));
        let counter = built.clone();
        let factory: AgentFactory<usize> =
            Arc::new(move || Ok(counter.fetch_add(1, Ordering::SeqCst)));
        (SessionRegistry::new(TIMEOUT, factory), built)
    }

    #[tokio::test]
    async fn test_get_or_create_reuses_existing_agent() {
        let (registry, built) = counting_registry();

        let first = registry.get_or_create("abc").await.unwrap();
        let again = registry.get_or_create("abc").await.unwrap();
        let other = registry.get_or_create("xyz").await.unwrap();

        assert!(Arc::ptr_eq(&first, &again));
        assert!(!Arc::ptr_eq(&first, &other));
        assert_eq!(built.load(Ordering::SeqCst), 2);
        assert_eq!(registry.len().await, 2);
    }

    #[tokio::test]
    async fn test_factory_failure_leaves_registry_unchanged() {
        let factory: AgentFactory<usize> =
            Arc::new(|| Err(AgentError::Internal("GEMINI_API_KEY not set".to_string())));
        let registry = SessionRegistry::new(TIMEOUT, factory);

        assert!(registry.get_or_create("abc").await.is_err());
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_delete_missing_session_is_not_found() {
        let (registry, _) = counting_registry();
        registry.get_or_create("abc").await.unwrap();

        let result = registry.delete("nope").await;

        assert!(matches!(result, Err(SessionRegistryError::NotFound(id)) if id == "nope"));
        assert!(registry.contains("abc").await);
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_delete_removes_session() {
        let (registry, _) = counting_registry();
        registry.get_or_create("abc").await.unwrap();

        registry.delete("abc").await.unwrap();

        assert!(!registry.contains("abc").await);
        assert!(!registry.touch("abc").await);
    }

    #[tokio::test]
    async fn test_sweep_respects_timeout_boundary() {
        let (registry, _) = counting_registry();
        registry.get_or_create("abc").await.unwrap();
        let created = Instant::now();

        assert_eq!(registry.sweep_at(created + TIMEOUT - Duration::from_secs(1)).await, 0);
        assert!(registry.contains("abc").await);

        assert_eq!(registry.sweep_at(created + TIMEOUT + Duration::from_secs(2)).await, 1);
        assert!(!registry.contains("abc").await);
    }

    #[tokio::test]
    async fn test_sweep_keeps_recently_used_sessions() {
        let (registry, _) = counting_registry();
        registry.get_or_create("idle").await.unwrap();
        registry.get_or_create("busy").await.unwrap();

        let later = Instant::now() + TIMEOUT + Duration::from_secs(2);
        {
            let mut sessions = registry.sessions.write().await;
            if let Some(entry) = sessions.get_mut("busy") {
                entry.last_accessed = later;
            }
        }

        assert_eq!(registry.sweep_at(later).await, 1);
        assert!(registry.contains("busy").await);
        assert!(!registry.contains("idle").await);
    }

    #[tokio::test]
    async fn test_spawned_sweeper_evicts_and_can_be_cancelled() {
        let factory: AgentFactory<usize> = Arc::new(|| Ok(0));
        let registry = Arc::new(SessionRegistry::new(Duration::from_millis(1), factory));
        registry.get_or_create("abc").await.unwrap();

        let handle = registry.spawn_sweeper(Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(registry.is_empty().await);
        handle.abort();
        assert!(handle.await.unwrap_err().is_cancelled());
    }
}
