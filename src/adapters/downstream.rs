//! Downstream account service used by the support tools
//!
//! Every tool is a JSON POST to its own endpoint. The service answers with
//! `{"code": ..., "result": ...}`; `code` (an integer, sometimes sent as a
//! numeric string) selects the outcome, not the HTTP status.

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;

use super::tool_handler::SupportTool;
use crate::agents::error::ToolError;

/// Endpoints of the downstream account service
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ToolsConfig {
    /// Customer lookup by email
    #[serde(default)]
    pub customer_url: String,
    /// Credit top-up resolution
    #[serde(default)]
    pub transaction_url: String,
    /// Account verification link resend
    #[serde(default)]
    pub verification_url: String,
    /// Password reset link
    #[serde(default)]
    pub reset_url: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_timeout() -> u64 {
    30
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            customer_url: String::new(),
            transaction_url: String::new(),
            verification_url: String::new(),
            reset_url: String::new(),
            timeout_secs: default_timeout(),
        }
    }
}

impl ToolsConfig {
    pub fn url_for(&self, tool: SupportTool) -> &str {
        match tool {
            SupportTool::VerifyCustomerExist => &self.customer_url,
            SupportTool::FixCreditTopupIssue => &self.transaction_url,
            SupportTool::ResendAccountVerificationLink => &self.verification_url,
            SupportTool::SendPasswordResetLink => &self.reset_url,
        }
    }
}

/// Body returned by the downstream service
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DownstreamReply {
    #[serde(deserialize_with = "deserialize_code")]
    pub code: i64,
    #[serde(default)]
    pub result: Value,
}

impl DownstreamReply {
    pub fn new(code: i64, result: Value) -> Self {
        Self { code, result }
    }

    /// `result` as display text: strings unquoted, anything else as JSON
    pub fn result_text(&self) -> String {
        match &self.result {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

fn deserialize_code<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
            .ok_or_else(|| D::Error::custom(format!("code is not an integer: {}", n))),
        Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_| D::Error::custom(format!("code is not numeric: {:?}", s))),
        other => Err(D::Error::custom(format!("unexpected code value: {}", other))),
    }
}

/// Port for the downstream account service
#[async_trait]
pub trait DownstreamClient: Send + Sync {
    async fn call(&self, tool: SupportTool, body: Value) -> Result<DownstreamReply, ToolError>;
}

/// reqwest-backed client
pub struct HttpDownstreamClient {
    client: reqwest::Client,
    config: ToolsConfig,
}

impl HttpDownstreamClient {
    pub fn new(config: ToolsConfig) -> Result<Self, ToolError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ToolError::Downstream(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl DownstreamClient for HttpDownstreamClient {
    async fn call(&self, tool: SupportTool, body: Value) -> Result<DownstreamReply, ToolError> {
        let url = self.config.url_for(tool);
        if url.is_empty() {
            return Err(ToolError::Downstream(format!(
                "no endpoint configured for {}",
                tool.name()
            )));
        }

        debug!(tool = tool.name(), "Calling downstream service");
        let response = self.client.post(url).json(&body).send().await?;

        response
            .json::<DownstreamReply>()
            .await
            .map_err(|e| ToolError::Downstream(format!("Unreadable reply from {}: {}", tool.name(), e)))
    }
}

/// Client answering from a fixed table, recording every request it receives
#[derive(Default)]
pub struct CannedDownstream {
    replies: HashMap<SupportTool, DownstreamReply>,
    requests: Mutex<Vec<(SupportTool, Value)>>,
}

impl CannedDownstream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(mut self, tool: SupportTool, code: i64, result: Value) -> Self {
        self.replies.insert(tool, DownstreamReply::new(code, result));
        self
    }

    /// Requests received so far, oldest first
    pub fn requests(&self) -> Vec<(SupportTool, Value)> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl DownstreamClient for CannedDownstream {
    async fn call(&self, tool: SupportTool, body: Value) -> Result<DownstreamReply, ToolError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push((tool, body));
        }
        self.replies
            .get(&tool)
            .cloned()
            .ok_or_else(|| ToolError::Downstream(format!("connection refused: {}", tool.name())))
    }
}
