//! Database migrations for the audit log

use crate::persistence::error::PersistenceError;
use crate::persistence::pool::{ConnectionPool, DatabaseBackend};
use sqlx::Row;

const MIGRATIONS_TABLE: &str = "_uellogent_migrations";

/// Initial schema: one append-only table per agent.
/// `{serial}` is replaced with the backend's auto-increment key type.
const MIGRATION_001_AUDIT_TABLES: &str = r#"
-- Support agent turns
CREATE TABLE IF NOT EXISTS support_agent_messages (
    message_id {serial},
    session_id TEXT NOT NULL,
    role TEXT NOT NULL,
    text TEXT NOT NULL,
    agent TEXT NOT NULL,
    created_at TEXT NOT NULL
);

-- Query agent turns
CREATE TABLE IF NOT EXISTS query_agent_messages (
    message_id {serial},
    session_id TEXT NOT NULL,
    role TEXT NOT NULL,
    text TEXT NOT NULL,
    agent TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_support_messages_session ON support_agent_messages(session_id);
CREATE INDEX IF NOT EXISTS idx_query_messages_session ON query_agent_messages(session_id);
"#;

/// Migration definition
struct Migration {
    name: &'static str,
    sql: &'static str,
    checksum: &'static str,
}

/// Get all migrations in order
fn get_migrations() -> Vec<Migration> {
    vec![Migration {
        name: "001_audit_tables",
        sql: MIGRATION_001_AUDIT_TABLES,
        checksum: "v1",
    }]
}

/// Split a migration script into executable statements, dropping comment lines
fn statements(sql: &str, backend: DatabaseBackend) -> Vec<String> {
    sql.replace("{serial}", backend.serial_key())
        .split(';')
        .map(|chunk| {
            chunk
                .lines()
                .filter(|line| !line.trim_start().starts_with("--"))
                .collect::<Vec<_>>()
                .join("\n")
                .trim()
                .to_string()
        })
        .filter(|statement| !statement.is_empty())
        .collect()
}

/// Migration runner for the audit database
pub struct MigrationRunner {
    pool: ConnectionPool,
}

impl MigrationRunner {
    /// Create a new migration runner
    pub fn new(pool: ConnectionPool) -> Self {
        Self { pool }
    }

    /// Run all pending migrations
    pub async fn migrate_up(&self) -> Result<MigrationResult, PersistenceError> {
        let backend = self.pool.backend();
        let mut applied = 0;
        let mut skipped = 0;

        self.ensure_migrations_table().await?;

        for migration in get_migrations() {
            if self.is_migration_applied(migration.name).await? {
                tracing::debug!("Migration '{}' already applied, skipping", migration.name);
                skipped += 1;
                continue;
            }

            tracing::info!("Applying migration: {}", migration.name);

            for statement in statements(migration.sql, backend) {
                sqlx::query(&statement)
                    .execute(self.pool.pool())
                    .await
                    .map_err(|e| {
                        PersistenceError::Migration(format!(
                            "Failed to execute migration '{}': {}",
                            migration.name, e
                        ))
                    })?;
            }

            self.record_migration(migration.name, migration.checksum)
                .await?;

            tracing::info!("Migration '{}' applied successfully", migration.name);
            applied += 1;
        }

        Ok(MigrationResult { applied, skipped })
    }

    /// Ensure the migrations tracking table exists
    async fn ensure_migrations_table(&self) -> Result<(), PersistenceError> {
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} (
                id {},
                name TEXT NOT NULL UNIQUE,
                applied_at TEXT NOT NULL,
                checksum TEXT NOT NULL
            )",
            MIGRATIONS_TABLE,
            self.pool.backend().serial_key()
        );

        sqlx::query(&sql)
            .execute(self.pool.pool())
            .await
            .map_err(|e| {
                PersistenceError::Migration(format!("Failed to create migrations table: {}", e))
            })?;

        Ok(())
    }

    /// Check if a migration has been applied
    async fn is_migration_applied(&self, name: &str) -> Result<bool, PersistenceError> {
        let sql = format!(
            "SELECT COUNT(*) AS count FROM {} WHERE name = {}",
            MIGRATIONS_TABLE,
            self.pool.backend().param(1)
        );

        let result = sqlx::query(&sql)
            .bind(name)
            .fetch_one(self.pool.pool())
            .await
            .map_err(|e| {
                PersistenceError::Migration(format!("Failed to check migration status: {}", e))
            })?;

        let count: i64 = result.try_get("count").unwrap_or(0);
        Ok(count > 0)
    }

    /// Record a migration as applied
    async fn record_migration(&self, name: &str, checksum: &str) -> Result<(), PersistenceError> {
        let backend = self.pool.backend();
        let now = chrono::Utc::now().to_rfc3339();
        let sql = format!(
            "INSERT INTO {} (name, applied_at, checksum) VALUES ({}, {}, {})",
            MIGRATIONS_TABLE,
            backend.param(1),
            backend.param(2),
            backend.param(3)
        );

        sqlx::query(&sql)
            .bind(name)
            .bind(&now)
            .bind(checksum)
            .execute(self.pool.pool())
            .await
            .map_err(|e| {
                PersistenceError::Migration(format!("Failed to record migration: {}", e))
            })?;

        Ok(())
    }
}

/// Result of running migrations
#[derive(Debug)]
pub struct MigrationResult {
    /// Number of migrations applied
    pub applied: usize,
    /// Number of migrations skipped (already applied)
    pub skipped: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statements_skip_comments_but_keep_sql() {
        let parsed = statements(MIGRATION_001_AUDIT_TABLES, DatabaseBackend::Sqlite);

        assert_eq!(parsed.len(), 4);
        assert!(parsed[0].starts_with("CREATE TABLE IF NOT EXISTS support_agent_messages"));
        assert!(parsed[0].contains("message_id INTEGER PRIMARY KEY AUTOINCREMENT"));
        assert!(parsed.iter().all(|s| !s.contains("--")));
    }

    #[test]
    fn test_postgres_uses_bigserial() {
        let parsed = statements(MIGRATION_001_AUDIT_TABLES, DatabaseBackend::Postgres);
        assert!(parsed[1].contains("message_id BIGSERIAL PRIMARY KEY"));
    }

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let pool = ConnectionPool::new("sqlite::memory:", 1, 5).await.unwrap();
        let runner = MigrationRunner::new(pool);

        let first = runner.migrate_up().await.unwrap();
        let second = runner.migrate_up().await.unwrap();

        assert_eq!(first.applied, 1);
        assert_eq!(second.applied, 0);
        assert_eq!(second.skipped, 1);
    }
}
