use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::adapters::session_registry::SessionRegistry;
use crate::agents::SupportAgent;
use crate::persistence::ConnectionPool;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub checks: HealthChecks,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthChecks {
    pub active_sessions: usize,
    pub audit_store: String,
}

pub struct HealthHandler {
    sessions: Arc<SessionRegistry<SupportAgent>>,
    audit_pool: Option<ConnectionPool>,
    start_time: std::time::Instant,
}

impl HealthHandler {
    /// `audit_pool` is probed by the readiness check when the audit log is SQL backed
    pub fn new(sessions: Arc<SessionRegistry<SupportAgent>>, audit_pool: Option<ConnectionPool>) -> Self {
        Self {
            sessions,
            audit_pool,
            start_time: std::time::Instant::now(),
        }
    }

    async fn audit_store_status(&self) -> &'static str {
        match &self.audit_pool {
            Some(pool) => match pool.health_check().await {
                Ok(()) => "ok",
                Err(_) => "unavailable",
            },
            None => "in-memory",
        }
    }

    /// Basic health check - returns 200 if server is running
    pub async fn health(&self) -> impl IntoResponse {
        let status = HealthStatus {
            status: "healthy".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: self.start_time.elapsed().as_secs(),
            checks: HealthChecks {
                active_sessions: self.sessions.len().await,
                audit_store: self.audit_store_status().await.to_string(),
            },
        };

        (StatusCode::OK, Json(status))
    }

    /// Readiness check - returns 200 once the audit store answers
    pub async fn ready(&self) -> impl IntoResponse {
        match self.audit_store_status().await {
            "unavailable" => (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({
                    "status": "not_ready",
                    "message": "Audit store is unreachable"
                })),
            ),
            _ => (
                StatusCode::OK,
                Json(serde_json::json!({
                    "status": "ready",
                    "message": "Server is ready to accept requests"
                })),
            ),
        }
    }

    /// Liveness check - returns 200 if server is alive
    pub async fn live(&self) -> impl IntoResponse {
        (StatusCode::OK, Json(serde_json::json!({
            "status": "alive",
            "message": "Server is alive"
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::session_registry::AgentFactory;
    use crate::agents::error::AgentError;
    use std::time::Duration;

    fn handler(audit_pool: Option<ConnectionPool>) -> HealthHandler {
        let factory: AgentFactory<SupportAgent> =
            Arc::new(|| Err(AgentError::Internal("unused".to_string())));
        HealthHandler::new(
            Arc::new(SessionRegistry::new(Duration::from_secs(900), factory)),
            audit_pool,
        )
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let response = handler(None).health().await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_ready_with_live_audit_pool() {
        let pool = ConnectionPool::new("sqlite::memory:", 1, 5).await.unwrap();

        let response = handler(Some(pool)).ready().await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_ready_with_closed_audit_pool() {
        let pool = ConnectionPool::new("sqlite::memory:", 1, 5).await.unwrap();
        pool.close().await;

        let response = handler(Some(pool)).ready().await.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_live_endpoint() {
        let response = handler(None).live().await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
