//! SQL-backed audit log of conversation turns

use async_trait::async_trait;
use sqlx::any::AnyRow;
use sqlx::Row;

use crate::agents::domain::{AgentKind, AuditRecord, MessageLog, Role};
use crate::persistence::error::PersistenceError;
use crate::persistence::pool::ConnectionPool;

/// Audit table for an agent
pub fn table_for(agent: AgentKind) -> &'static str {
    match agent {
        AgentKind::Support => "support_agent_messages",
        AgentKind::Query => "query_agent_messages",
    }
}

/// Append-only message log over an sqlx pool
#[derive(Clone)]
pub struct SqlMessageLog {
    pool: ConnectionPool,
}

impl SqlMessageLog {
    pub fn new(pool: ConnectionPool) -> Self {
        Self { pool }
    }

    pub fn connection_pool(&self) -> &ConnectionPool {
        &self.pool
    }

    /// Insert one record
    pub async fn insert(
        &self,
        agent: AgentKind,
        session_id: &str,
        role: Role,
        text: &str,
    ) -> Result<(), PersistenceError> {
        let backend = self.pool.backend();
        let sql = format!(
            "INSERT INTO {} (session_id, role, text, agent, created_at) VALUES ({}, {}, {}, {}, {})",
            table_for(agent),
            backend.param(1),
            backend.param(2),
            backend.param(3),
            backend.param(4),
            backend.param(5)
        );

        sqlx::query(&sql)
            .bind(session_id)
            .bind(role.to_string())
            .bind(text)
            .bind(agent.tag())
            .bind(chrono::Utc::now().to_rfc3339())
            .execute(self.pool.pool())
            .await?;

        Ok(())
    }

    /// Every record for an agent, newest first
    pub async fn list(&self, agent: AgentKind) -> Result<Vec<AuditRecord>, PersistenceError> {
        let sql = format!(
            "SELECT message_id, session_id, role, text, agent, created_at FROM {} ORDER BY message_id DESC",
            table_for(agent)
        );

        let rows = sqlx::query(&sql).fetch_all(self.pool.pool()).await?;
        rows.iter().map(row_to_record).collect()
    }
}

fn row_to_record(row: &AnyRow) -> Result<AuditRecord, PersistenceError> {
    Ok(AuditRecord {
        message_id: row.try_get("message_id")?,
        session_id: row.try_get("session_id")?,
        role: row.try_get("role")?,
        text: row.try_get("text")?,
        agent: row.try_get("agent")?,
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait]
impl MessageLog for SqlMessageLog {
    async fn record(&self, agent: AgentKind, session_id: &str, role: Role, text: &str) {
        if let Err(e) = self.insert(agent, session_id, role, text).await {
            tracing::error!(
                session_id,
                agent = %agent,
                role = %role,
                "Failed to write audit record: {}",
                e
            );
        }
    }

    async fn fetch_all(&self, agent: AgentKind) -> anyhow::Result<Vec<AuditRecord>> {
        Ok(self.list(agent).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MigrationRunner;

    async fn log() -> SqlMessageLog {
        let pool = ConnectionPool::new("sqlite::memory:", 1, 5).await.unwrap();
        MigrationRunner::new(pool.clone()).migrate_up().await.unwrap();
        SqlMessageLog::new(pool)
    }

    #[tokio::test]
    async fn test_records_come_back_newest_first() {
        let log = log().await;

        log.record(AgentKind::Support, "s1", Role::User, "hello").await;
        log.record(AgentKind::Support, "s1", Role::Model, "hi there").await;
        log.record(AgentKind::Support, "s1", Role::Tool, "Tool called: x and result is: y").await;

        let records = log.fetch_all(AgentKind::Support).await.unwrap();

        assert_eq!(records.len(), 3);
        assert_eq!(records[0].role, "tool");
        assert_eq!(records[2].text, "hello");
        assert!(records[0].message_id > records[1].message_id);
        assert!(records.iter().all(|r| r.agent == "UelloSendAgent"));
        assert!(chrono::DateTime::parse_from_rfc3339(&records[0].created_at).is_ok());
    }

    #[tokio::test]
    async fn test_agents_write_to_separate_tables() {
        let log = log().await;

        log.record(AgentKind::Support, "s1", Role::User, "support question").await;
        log.record(AgentKind::Query, "q1", Role::User, "query question").await;

        let support = log.fetch_all(AgentKind::Support).await.unwrap();
        let query = log.fetch_all(AgentKind::Query).await.unwrap();

        assert_eq!(support.len(), 1);
        assert_eq!(query.len(), 1);
        assert_eq!(query[0].agent, "QueryAgent");
        assert_eq!(query[0].session_id, "q1");
    }

    #[tokio::test]
    async fn test_write_failures_are_swallowed() {
        let pool = ConnectionPool::new("sqlite::memory:", 1, 5).await.unwrap();
        let log = SqlMessageLog::new(pool);

        // no migrations: the insert fails but record must not panic or error
        log.record(AgentKind::Query, "q1", Role::User, "lost").await;
        assert!(log.fetch_all(AgentKind::Query).await.is_err());
    }
}
