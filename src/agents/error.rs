//! Error types for the agent layer

use thiserror::Error;

/// Errors that can occur while running an agent exchange
#[derive(Debug, Error)]
pub enum AgentError {
    /// LLM provider error
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    /// Context retrieval error
    #[error("Retrieval error: {0}")]
    Retrieval(String),

    /// Max iterations reached
    #[error("Max iterations ({0}) reached without completion")]
    MaxIterations(u32),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Errors specific to LLM provider operations
#[derive(Debug, Error)]
pub enum LlmError {
    /// API error
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Authentication error
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Network error
    #[error("Network error: {0}")]
    Network(String),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Content filtered
    #[error("Content filtered by safety system")]
    ContentFiltered,

    /// Timeout
    #[error("Request timed out")]
    Timeout,
}

/// Errors raised while dispatching a support tool
///
/// None of these abort a conversation: the agent loop renders them as
/// `Error - <message>` and hands them back to the model.
#[derive(Debug, Error)]
pub enum ToolError {
    /// The model asked for a tool that is not registered
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// Arguments failed validation before any network call
    #[error("Validation error: {0}")]
    Validation(String),

    /// Downstream returned a code outside the documented set
    #[error("Unexpected status code {code} from {tool}")]
    UnexpectedStatus { tool: String, code: i64 },

    /// Downstream call failed or returned an unreadable body
    #[error("Downstream error: {0}")]
    Downstream(String),
}

/// Errors raised by the conversation history cache
#[derive(Debug, Error)]
pub enum HistoryError {
    /// Cache backend unreachable or command failed
    #[error("History backend error: {0}")]
    Backend(String),

    /// Stored history could not be decoded
    #[error("History decode error: {0}")]
    Decode(String),
}

impl From<redis::RedisError> for HistoryError {
    fn from(err: redis::RedisError) -> Self {
        HistoryError::Backend(err.to_string())
    }
}

impl From<serde_json::Error> for HistoryError {
    fn from(err: serde_json::Error) -> Self {
        HistoryError::Decode(err.to_string())
    }
}

impl From<reqwest::Error> for ToolError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ToolError::Downstream("request timed out".to_string())
        } else {
            ToolError::Downstream(err.to_string())
        }
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Timeout
        } else if err.is_connect() {
            LlmError::Network(format!("Connection error: {}", err))
        } else {
            LlmError::Network(err.to_string())
        }
    }
}

/// Result type alias for agent operations
pub type AgentResult<T> = Result<T, AgentError>;

/// Result type alias for history cache operations
pub type HistoryResult<T> = Result<T, HistoryError>;

/// Result type alias for LLM operations
pub type LlmResult<T> = Result<T, LlmError>;
