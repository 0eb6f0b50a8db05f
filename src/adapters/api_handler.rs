//! REST API handlers for the chat agents
//!
//! Support chat, query chat, admin audit retrieval, session deletion and
//! document ingestion.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tracing::{error, info, warn};

use crate::adapters::session_registry::{SessionRegistry, SessionRegistryError};
use crate::agents::domain::{AgentKind, AuditRecord, MessageLog};
use crate::agents::memory::HistoryStore;
use crate::agents::{QueryAgent, SupportAgent};
use crate::retrieval::Ingestor;

const INTERNAL_ERROR_DETAIL: &str = "An unexpected internal error occurred. Please try again later.";
const UNAUTHORIZED: &str = "Unauthorized";

/// Shared application state for API handlers
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionRegistry<SupportAgent>>,
    pub query_agent: Arc<QueryAgent>,
    pub history: Arc<dyn HistoryStore>,
    pub message_log: Arc<dyn MessageLog>,
    pub ingestor: Arc<Ingestor>,
    pub admin_key: AdminKey,
}

/// The key guarding the admin endpoints. With no key configured every
/// admin request is unauthorized.
#[derive(Clone, Default)]
pub struct AdminKey(Option<Arc<SecretString>>);

impl AdminKey {
    pub fn new(key: Option<SecretString>) -> Self {
        Self(key.map(Arc::new))
    }

    pub fn from_env(var: &str) -> Self {
        Self::new(
            std::env::var(var)
                .ok()
                .filter(|k| !k.is_empty())
                .map(SecretString::from),
        )
    }

    pub fn is_configured(&self) -> bool {
        self.0.is_some()
    }

    pub fn matches(&self, candidate: &str) -> bool {
        match &self.0 {
            Some(key) => key
                .expose_secret()
                .as_bytes()
                .ct_eq(candidate.as_bytes())
                .into(),
            None => false,
        }
    }
}

// ============================================================================
// Request / Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub query: String,
    pub session_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ScraperRequest {
    pub urls: Vec<String>,
    pub admin_key: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub status: &'static str,
    pub message: String,
}

impl MessageResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            status: "ok",
            message: message.into(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum AuditMessages {
    Records(Vec<AuditRecord>),
    Denied(&'static str),
}

#[derive(Debug, Serialize)]
pub struct MessagesResponse {
    pub status: &'static str,
    pub messages: AuditMessages,
}

impl MessagesResponse {
    fn unauthorized() -> Self {
        Self {
            status: "ok",
            messages: AuditMessages::Denied(UNAUTHORIZED),
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Errors surfaced to API callers as `{"detail": ...}`
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    /// Detail is logged, never returned
    Internal(String),
}

impl ApiError {
    pub fn internal(context: &str, err: impl std::fmt::Display) -> Self {
        ApiError::Internal(format!("{}: {}", context, err))
    }
}

impl From<SessionRegistryError> for ApiError {
    fn from(err: SessionRegistryError) -> Self {
        match err {
            SessionRegistryError::NotFound(_) => ApiError::NotFound("Session not found".to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            ApiError::NotFound(detail) => (StatusCode::NOT_FOUND, detail),
            ApiError::Internal(detail) => {
                error!("Request failed: {}", detail);
                (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR_DETAIL.to_string())
            }
        };

        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

// ============================================================================
// Root
// ============================================================================

pub async fn root() -> impl IntoResponse {
    Json(json!({
        "message": format!("UelloGent Agent Server {}", env!("CARGO_PKG_VERSION")),
        "version": env!("CARGO_PKG_VERSION"),
        "date": chrono::Local::now().format("%B %d, %Y").to_string(),
    }))
}

// ============================================================================
// Support agent
// ============================================================================

pub async fn support_chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let agent = state
        .sessions
        .get_or_create(&req.session_id)
        .await
        .map_err(|e| ApiError::internal(&format!("support session {}", req.session_id), e))?;

    let reply = agent
        .lock()
        .await
        .respond(&req.session_id, &req.query)
        .await
        .map_err(|e| ApiError::internal(&format!("support chat in session {}", req.session_id), e))?;

    info!(session_id = %req.session_id, "Support reply sent");
    Ok(Json(MessageResponse::ok(reply)))
}

pub async fn support_messages(
    State(state): State<AppState>,
    Path(admin_key): Path<String>,
) -> Result<Json<MessagesResponse>, ApiError> {
    audit_messages(&state, AgentKind::Support, &admin_key).await
}

pub async fn delete_support_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.sessions.delete(&session_id).await?;
    info!(session_id = %session_id, "Support session deleted");
    Ok(Json(MessageResponse::ok("Session deleted successfully")))
}

// ============================================================================
// Query agent
// ============================================================================

pub async fn query_chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let mut history = match state.history.load(&req.session_id).await {
        Ok(history) => history,
        Err(e) => {
            warn!(session_id = %req.session_id, "Failed to load history, starting fresh: {}", e);
            Vec::new()
        }
    };

    let reply = state
        .query_agent
        .respond(&mut history, &req.query, &req.session_id)
        .await
        .map_err(|e| ApiError::internal(&format!("query chat in session {}", req.session_id), e))?;

    if let Err(e) = state.history.save(&req.session_id, &history).await {
        error!(session_id = %req.session_id, "Failed to save history: {}", e);
    }

    info!(session_id = %req.session_id, "Query reply sent");
    Ok(Json(MessageResponse::ok(reply)))
}

pub async fn query_messages(
    State(state): State<AppState>,
    Path(admin_key): Path<String>,
) -> Result<Json<MessagesResponse>, ApiError> {
    audit_messages(&state, AgentKind::Query, &admin_key).await
}

pub async fn delete_query_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let existed = state
        .history
        .delete(&session_id)
        .await
        .map_err(|e| ApiError::internal("deleting query history", e))?;

    if !existed {
        return Err(ApiError::NotFound("Session not found".to_string()));
    }

    info!(session_id = %session_id, "Query session deleted");
    Ok(Json(MessageResponse::ok("Session deleted successfully")))
}

// ============================================================================
// Admin
// ============================================================================

async fn audit_messages(
    state: &AppState,
    agent: AgentKind,
    admin_key: &str,
) -> Result<Json<MessagesResponse>, ApiError> {
    if !state.admin_key.matches(admin_key) {
        warn!(agent = %agent, "Rejected audit fetch with wrong admin key");
        return Ok(Json(MessagesResponse::unauthorized()));
    }

    let records = state
        .message_log
        .fetch_all(agent)
        .await
        .map_err(|e| ApiError::internal("fetching audit records", e))?;

    info!(agent = %agent, count = records.len(), "Audit records fetched");
    Ok(Json(MessagesResponse {
        status: "ok",
        messages: AuditMessages::Records(records),
    }))
}

pub async fn scraper(
    State(state): State<AppState>,
    Json(req): Json<ScraperRequest>,
) -> Result<Json<Value>, ApiError> {
    if !state.admin_key.matches(&req.admin_key) {
        warn!("Rejected scraper request with wrong admin key");
        return Ok(Json(json!({ "status": "ok", "messages": UNAUTHORIZED })));
    }

    let stored = state
        .ingestor
        .ingest(&req.urls)
        .await
        .map_err(|e| ApiError::internal("indexing documents", e))?;

    Ok(Json(json!({
        "status": "ok",
        "message": format!("{} documents have been indexed.", stored),
    })))
}
