//! Domain types for the agent system
//!
//! Core abstractions shared by the support and query pipelines, plus the
//! ports through which the agents reach tools, the audit log and the
//! context index.

mod agent;
mod message;
mod tool_call;

pub use agent::*;
pub use message::*;
pub use tool_call::*;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::agents::error::{AgentResult, ToolError};

/// A persisted copy of one conversation turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub message_id: i64,
    pub session_id: String,
    pub role: String,
    pub text: String,
    pub agent: String,
    pub created_at: String,
}

/// A context excerpt returned by retrieval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextChunk {
    pub text: String,
    pub title: String,
    pub url: String,
}

/// Port for the tools available to the support agent
#[async_trait]
pub trait ToolPort: Send + Sync {
    /// Schemas published to the model
    fn definitions(&self) -> Vec<ToolDefinition>;

    /// Run one invocation and render its outcome as text
    async fn execute(&self, call: &ToolCall) -> Result<String, ToolError>;
}

/// Port for the append-only message audit trail
#[async_trait]
pub trait MessageLog: Send + Sync {
    /// Append one turn. Storage failures are logged by the implementation
    /// and never surface to the conversation.
    async fn record(&self, agent: AgentKind, session_id: &str, role: Role, text: &str);

    /// All records for an agent, most recent first
    async fn fetch_all(&self, agent: AgentKind) -> anyhow::Result<Vec<AuditRecord>>;
}

/// Port for semantic context lookup
#[async_trait]
pub trait ContextRetriever: Send + Sync {
    /// Up to `limit` chunks nearest to `query`
    async fn retrieve(&self, query: &str, limit: usize) -> AgentResult<Vec<ContextChunk>>;
}
