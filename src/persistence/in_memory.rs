//! Process-local audit log

use async_trait::async_trait;
use std::sync::Mutex;

use crate::agents::domain::{AgentKind, AuditRecord, MessageLog, Role};

/// Message log kept in memory, in insertion order
#[derive(Default)]
pub struct InMemoryMessageLog {
    records: Mutex<Vec<AuditRecord>>,
}

impl InMemoryMessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records for an agent, oldest first
    pub fn records(&self, agent: AgentKind) -> Vec<AuditRecord> {
        self.records
            .lock()
            .map(|records| {
                records
                    .iter()
                    .filter(|r| r.agent == agent.tag())
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl MessageLog for InMemoryMessageLog {
    async fn record(&self, agent: AgentKind, session_id: &str, role: Role, text: &str) {
        let Ok(mut records) = self.records.lock() else {
            tracing::error!(session_id, "Audit log lock poisoned, dropping record");
            return;
        };
        let message_id = records.len() as i64 + 1;
        records.push(AuditRecord {
            message_id,
            session_id: session_id.to_string(),
            role: role.to_string(),
            text: text.to_string(),
            agent: agent.tag().to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
        });
    }

    async fn fetch_all(&self, agent: AgentKind) -> anyhow::Result<Vec<AuditRecord>> {
        let mut records = self.records(agent);
        records.reverse();
        Ok(records)
    }
}
