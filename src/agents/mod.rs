//! Chat agents for UelloGent
//!
//! Two pipelines share the request/response shape:
//! - `SupportAgent` drives a tool-calling loop and lives in the session registry
//! - `QueryAgent` answers from retrieved documentation; its history lives in
//!   an external cache
//!
//! ## Architecture
//!
//! - `domain/` - Core types (Message, ToolCall, AgentKind) and ports
//! - `llm/` - LLM provider implementations
//! - `core/` - Agent implementations (Support, Query)
//! - `memory/` - Conversation history backends

pub mod config;
pub mod core;
pub mod domain;
pub mod error;
pub mod llm;
pub mod memory;
pub mod prompts;

// Re-export commonly used types
pub use config::*;
pub use domain::*;
pub use error::*;
pub use self::core::{QueryAgent, SupportAgent};
