//! Configuration types for the agents

use serde::{Deserialize, Serialize};

use super::prompts::{RAG_SYSTEM_PROMPT, SUPPORT_SYSTEM_PROMPT};

/// Configuration for the tool-calling support agent
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SupportAgentConfig {
    /// LLM provider configuration
    #[serde(default = "default_support_llm")]
    pub llm: LlmProviderConfig,
    /// System instruction sent with every model call
    #[serde(default = "default_support_prompt")]
    pub system_prompt: String,
    /// Maximum model calls per exchange
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
}

impl Default for SupportAgentConfig {
    fn default() -> Self {
        Self {
            llm: default_support_llm(),
            system_prompt: default_support_prompt(),
            max_iterations: default_max_iterations(),
        }
    }
}

/// Configuration for the retrieval-augmented query agent
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueryAgentConfig {
    /// LLM provider configuration
    #[serde(default = "default_query_llm")]
    pub llm: LlmProviderConfig,
    /// System instruction seeded into a fresh history
    #[serde(default = "default_rag_prompt")]
    pub system_prompt: String,
    /// Sampling temperature for every completion
    #[serde(default = "default_query_temperature")]
    pub temperature: f32,
    /// Sampling seed for every completion
    #[serde(default = "default_query_seed")]
    pub seed: u64,
    /// Number of context chunks to retrieve
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for QueryAgentConfig {
    fn default() -> Self {
        Self {
            llm: default_query_llm(),
            system_prompt: default_rag_prompt(),
            temperature: default_query_temperature(),
            seed: default_query_seed(),
            top_k: default_top_k(),
        }
    }
}

fn default_support_prompt() -> String {
    SUPPORT_SYSTEM_PROMPT.to_string()
}

fn default_rag_prompt() -> String {
    RAG_SYSTEM_PROMPT.to_string()
}

fn default_max_iterations() -> u32 {
    10
}

fn default_query_temperature() -> f32 {
    0.2
}

fn default_query_seed() -> u64 {
    23
}

fn default_top_k() -> usize {
    5
}

fn default_support_llm() -> LlmProviderConfig {
    LlmProviderConfig {
        provider: LlmProviderType::Gemini,
        model: "gemini-2.0-flash".to_string(),
        api_key_env: Some("GEMINI_API_KEY".to_string()),
        base_url: None,
        temperature: None,
        max_tokens: None,
        timeout_secs: default_llm_timeout(),
    }
}

fn default_query_llm() -> LlmProviderConfig {
    LlmProviderConfig {
        provider: LlmProviderType::OpenAI,
        model: "meta-llama/llama-3.3-70b-instruct:free".to_string(),
        api_key_env: Some("OPEN_ROUTER_KEY".to_string()),
        base_url: Some("https://openrouter.ai/api/v1".to_string()),
        temperature: None,
        max_tokens: None,
        timeout_secs: default_llm_timeout(),
    }
}

/// LLM provider configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LlmProviderConfig {
    /// Provider type
    #[serde(default)]
    pub provider: LlmProviderType,
    /// Model name/identifier
    pub model: String,
    /// Environment variable containing the API key
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    /// Custom base URL (for OpenAI-compatible gateways)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Default temperature for completions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Default max tokens for completions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Per-request timeout in seconds
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

fn default_llm_timeout() -> u64 {
    60
}

/// Supported LLM providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LlmProviderType {
    /// OpenAI and OpenAI-compatible gateways such as OpenRouter
    #[default]
    #[serde(alias = "openrouter")]
    OpenAI,
    /// Google Gemini
    #[serde(alias = "google")]
    Gemini,
}

impl std::fmt::Display for LlmProviderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LlmProviderType::OpenAI => write!(f, "openai"),
            LlmProviderType::Gemini => write!(f, "gemini"),
        }
    }
}

/// Storage backend for query agent history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum HistoryBackend {
    /// Process-local map, lost on restart
    #[default]
    Memory,
    /// Shared Redis instance
    Redis,
}

/// Query agent history cache configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HistoryConfig {
    #[serde(default)]
    pub backend: HistoryBackend,
    /// Connection URL, required for the redis backend
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redis_url: Option<String>,
    /// Prefix prepended to the session id to form the cache key
    #[serde(default = "default_history_prefix")]
    pub key_prefix: String,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            backend: HistoryBackend::default(),
            redis_url: None,
            key_prefix: default_history_prefix(),
        }
    }
}

fn default_history_prefix() -> String {
    "uelloagent_session:".to_string()
}
