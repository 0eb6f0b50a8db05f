//! Agent domain types

use serde::{Deserialize, Serialize};

/// The two chat pipelines served by this backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgentKind {
    /// Tool-calling support agent
    #[serde(rename = "UelloSendAgent")]
    Support,
    /// Retrieval-augmented question answering agent
    #[serde(rename = "QueryAgent")]
    Query,
}

impl AgentKind {
    /// Tag stored with every audit record
    pub fn tag(&self) -> &'static str {
        match self {
            AgentKind::Support => "UelloSendAgent",
            AgentKind::Query => "QueryAgent",
        }
    }
}

impl std::fmt::Display for AgentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}
