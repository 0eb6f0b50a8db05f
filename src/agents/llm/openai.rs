//! OpenAI-compatible chat completions provider (OpenAI, OpenRouter)

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{
    api_key_from_env, http_client, CompletionRequest, CompletionResponse, FinishReason,
    LlmProvider, TokenUsage,
};
use crate::agents::config::LlmProviderConfig;
use crate::agents::domain::{Message, Role, ToolCall};
use crate::agents::error::{LlmError, LlmResult};

/// OpenAI-compatible LLM Provider
pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: SecretString,
    base_url: String,
    model: String,
    default_temperature: Option<f32>,
    default_max_tokens: Option<u32>,
}

impl OpenAiProvider {
    /// Create a new provider from configuration
    pub fn new(config: &LlmProviderConfig) -> LlmResult<Self> {
        let env_var = config.api_key_env.as_deref().unwrap_or("OPENAI_API_KEY");
        let api_key = api_key_from_env(env_var)?;
        Self::with_api_key(config, api_key)
    }

    /// Create a provider with an explicit key
    pub fn with_api_key(config: &LlmProviderConfig, api_key: SecretString) -> LlmResult<Self> {
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| "https://api.openai.com/v1".to_string());

        Ok(Self {
            client: http_client(config.timeout_secs)?,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            default_temperature: config.temperature,
            default_max_tokens: config.max_tokens,
        })
    }

    /// Build the request body for the chat completions API
    fn build_request_body(&self, request: &CompletionRequest) -> Value {
        let mut body = json!({
            "model": self.model,
            "messages": convert_messages(&request.messages),
        });

        if let Some(temp) = request.temperature.or(self.default_temperature) {
            body["temperature"] = json!(temp);
        }

        if let Some(max_tokens) = request.max_tokens.or(self.default_max_tokens) {
            body["max_tokens"] = json!(max_tokens);
        }

        if let Some(seed) = request.seed {
            body["seed"] = json!(seed);
        }

        if let Some(tools) = &request.tools {
            body["tools"] = json!(tools
                .iter()
                .map(|t| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": t.name,
                            "description": t.description,
                            "parameters": t.parameters
                        }
                    })
                })
                .collect::<Vec<_>>());
        }

        body
    }

    /// Parse a non-streaming response
    fn parse_response(&self, response: &OpenAiResponse) -> LlmResult<CompletionResponse> {
        let choice = response
            .choices
            .first()
            .ok_or_else(|| LlmError::Parse("No choices in response".to_string()))?;

        let tool_calls: Vec<ToolCall> = choice
            .message
            .tool_calls
            .as_ref()
            .map(|tcs| {
                tcs.iter()
                    .map(|tc| {
                        ToolCall::new(
                            tc.id.clone(),
                            tc.function.name.clone(),
                            serde_json::from_str(&tc.function.arguments)
                                .unwrap_or_else(|_| json!({})),
                        )
                    })
                    .collect()
            })
            .unwrap_or_default();

        let message = Message::model_with_tools(
            choice.message.content.clone().unwrap_or_default(),
            tool_calls,
        );

        let finish_reason = match choice.finish_reason.as_deref() {
            Some("length") => FinishReason::Length,
            Some("tool_calls") => FinishReason::ToolCalls,
            Some("content_filter") => FinishReason::ContentFilter,
            _ => FinishReason::Stop,
        };

        let usage = response.usage.as_ref().map(|u| TokenUsage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });

        Ok(CompletionResponse {
            message,
            finish_reason,
            usage,
        })
    }
}

/// Convert internal messages to the chat completions format
fn convert_messages(messages: &[Message]) -> Vec<Value> {
    messages
        .iter()
        .map(|m| {
            let mut msg = json!({
                "role": match m.role {
                    Role::System => "system",
                    Role::User => "user",
                    Role::Model => "assistant",
                    Role::Tool => "tool",
                },
                "content": m.content,
            });

            if !m.requested_tools().is_empty() {
                msg["tool_calls"] = json!(m
                    .requested_tools()
                    .iter()
                    .map(|tc| {
                        json!({
                            "id": tc.id,
                            "type": "function",
                            "function": {
                                "name": tc.name,
                                "arguments": tc.arguments.to_string()
                            }
                        })
                    })
                    .collect::<Vec<_>>());
            }

            if let Some(tool_call_id) = &m.tool_call_id {
                msg["tool_call_id"] = json!(tool_call_id);
            }

            msg
        })
        .collect()
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: CompletionRequest) -> LlmResult<CompletionResponse> {
        let body = self.build_request_body(&request);

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(LlmError::Authentication(
                "Chat completions endpoint rejected the API key".to_string(),
            ));
        }
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                message: error_text,
            });
        }

        let openai_response: OpenAiResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Parse(format!("Failed to parse response: {}", e)))?;

        self.parse_response(&openai_response)
    }
}

// Chat completions response types

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    #[serde(default)]
    choices: Vec<OpenAiChoice>,
    usage: Option<OpenAiUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiMessage {
    content: Option<String>,
    tool_calls: Option<Vec<OpenAiToolCall>>,
}

#[derive(Debug, Deserialize)]
struct OpenAiToolCall {
    id: String,
    function: OpenAiFunction,
}

#[derive(Debug, Deserialize)]
struct OpenAiFunction {
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct OpenAiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::config::LlmProviderType;

    fn provider() -> OpenAiProvider {
        let config = LlmProviderConfig {
            provider: LlmProviderType::OpenAI,
            model: "test-model".to_string(),
            api_key_env: None,
            base_url: Some("https://openrouter.ai/api/v1/".to_string()),
            temperature: None,
            max_tokens: Some(512),
            timeout_secs: 5,
        };
        OpenAiProvider::with_api_key(&config, SecretString::from("sk-test".to_string())).unwrap()
    }

    #[test]
    fn test_request_body_includes_sampling_controls() {
        let request = CompletionRequest::new(vec![
            Message::system("You are UelloGent"),
            Message::user("What is UelloSend?"),
        ])
        .with_sampling(0.2, 23);

        let p = provider();
        let body = p.build_request_body(&request);

        assert_eq!(p.base_url, "https://openrouter.ai/api/v1");
        assert_eq!(body["model"], "test-model");
        assert_eq!(body["seed"], 23);
        assert_eq!(body["max_tokens"], 512);
        assert!((body["temperature"].as_f64().unwrap() - 0.2).abs() < 1e-6);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "What is UelloSend?");
        assert!(body.get("tools").is_none());
    }

    #[test]
    fn test_model_turns_map_to_assistant_role() {
        let call = ToolCall::new("abc", "verify_customer_exist", json!({"customer_email": "a@b.co"}));
        let messages = convert_messages(&[
            Message::model_with_tools("", vec![call.clone()]),
            Message::tool_result(&call, "ok"),
        ]);

        assert_eq!(messages[0]["role"], "assistant");
        assert_eq!(messages[0]["tool_calls"][0]["function"]["name"], "verify_customer_exist");
        assert_eq!(messages[1]["role"], "tool");
        assert_eq!(messages[1]["tool_call_id"], "abc");
    }

    #[test]
    fn test_parse_plain_reply() {
        let parsed: OpenAiResponse = serde_json::from_value(json!({
            "choices": [{
                "message": {"role": "assistant", "content": "Hello from UelloGent"},
                "finish_reason": "stop"
            }]
        }))
        .unwrap();

        let response = provider().parse_response(&parsed).unwrap();

        assert_eq!(response.finish_reason, FinishReason::Stop);
        assert_eq!(response.message.role, Role::Model);
        assert_eq!(response.message.content, "Hello from UelloGent");
        assert!(response.message.tool_calls.is_none());
    }
}
