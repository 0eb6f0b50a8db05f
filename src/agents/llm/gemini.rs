//! Google Gemini LLM Provider

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

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Google Gemini LLM Provider
pub struct GeminiProvider {
    client: reqwest::Client,
    api_key: SecretString,
    base_url: String,
    model: String,
    default_temperature: Option<f32>,
    default_max_tokens: Option<u32>,
}

impl GeminiProvider {
    /// Create a new Gemini provider from configuration
    pub fn new(config: &LlmProviderConfig) -> LlmResult<Self> {
        let env_var = config.api_key_env.as_deref().unwrap_or("GEMINI_API_KEY");
        let api_key = api_key_from_env(env_var)?;
        Self::with_api_key(config, api_key)
    }

    /// Create a provider with an explicit key
    pub fn with_api_key(config: &LlmProviderConfig, api_key: SecretString) -> LlmResult<Self> {
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        Ok(Self {
            client: http_client(config.timeout_secs)?,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            default_temperature: config.temperature,
            default_max_tokens: config.max_tokens,
        })
    }

    /// Build the request body for Gemini API
    fn build_request_body(&self, request: &CompletionRequest) -> Value {
        let (system_instruction, contents) = convert_messages(&request.messages);
        let mut body = json!({ "contents": contents });

        if let Some(system) = system_instruction {
            body["systemInstruction"] = json!({ "parts": [{ "text": system }] });
        }

        let mut generation_config = json!({});

        if let Some(temp) = request.temperature.or(self.default_temperature) {
            generation_config["temperature"] = json!(temp);
        }

        if let Some(max_tokens) = request.max_tokens.or(self.default_max_tokens) {
            generation_config["maxOutputTokens"] = json!(max_tokens);
        }

        if let Some(seed) = request.seed {
            generation_config["seed"] = json!(seed);
        }

        if generation_config.as_object().map_or(false, |o| !o.is_empty()) {
            body["generationConfig"] = generation_config;
        }

        if let Some(tools) = &request.tools {
            body["tools"] = json!([{
                "function_declarations": tools.iter().map(|t| {
                    json!({
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.parameters
                    })
                }).collect::<Vec<_>>()
            }]);
        }

        body
    }

    /// Parse a non-streaming response
    fn parse_response(&self, response: &GeminiResponse) -> LlmResult<CompletionResponse> {
        let candidate = response
            .candidates
            .first()
            .ok_or_else(|| LlmError::Parse("No candidates in response".to_string()))?;

        if matches!(candidate.finish_reason.as_deref(), Some("SAFETY") | Some("RECITATION"))
            && candidate.content.as_ref().and_then(|c| c.parts.as_ref()).is_none()
        {
            return Err(LlmError::ContentFiltered);
        }

        let mut content = String::new();
        let mut tool_calls = Vec::new();

        let parts = candidate
            .content
            .as_ref()
            .and_then(|c| c.parts.as_deref())
            .unwrap_or_default();

        for part in parts {
            if let Some(text) = &part.text {
                content.push_str(text);
            }
            if let Some(fc) = &part.function_call {
                tool_calls.push(ToolCall::new(
                    format!("call_{}", tool_calls.len()),
                    fc.name.clone(),
                    fc.args.clone().unwrap_or_else(|| json!({})),
                ));
            }
        }

        let message = Message::model_with_tools(content, tool_calls);

        let finish_reason = if !message.requested_tools().is_empty() {
            FinishReason::ToolCalls
        } else {
            match candidate.finish_reason.as_deref() {
                Some("MAX_TOKENS") => FinishReason::Length,
                Some("SAFETY") | Some("RECITATION") => FinishReason::ContentFilter,
                _ => FinishReason::Stop,
            }
        };

        let usage = response.usage_metadata.as_ref().map(|u| TokenUsage {
            prompt_tokens: u.prompt_token_count.unwrap_or(0),
            completion_tokens: u.candidates_token_count.unwrap_or(0),
            total_tokens: u.total_token_count.unwrap_or(0),
        });

        Ok(CompletionResponse {
            message,
            finish_reason,
            usage,
        })
    }
}

/// Split out the system instruction and convert the rest to Gemini contents.
///
/// Consecutive tool turns are folded into a single `user` content holding
/// one `functionResponse` part each, which is how Gemini expects the
/// answers to a multi-call model turn.
fn convert_messages(messages: &[Message]) -> (Option<String>, Vec<Value>) {
    let mut system_instruction: Option<String> = None;
    let mut contents: Vec<Value> = Vec::new();
    let mut pending_responses: Vec<Value> = Vec::new();

    for m in messages {
        if m.role != Role::Tool && !pending_responses.is_empty() {
            contents.push(json!({
                "role": "user",
                "parts": std::mem::take(&mut pending_responses)
            }));
        }

        match m.role {
            Role::System => {
                system_instruction = Some(match system_instruction.take() {
                    Some(existing) => format!("{}\n\n{}", existing, m.content),
                    None => m.content.clone(),
                });
            }
            Role::User => {
                contents.push(json!({
                    "role": "user",
                    "parts": [{ "text": m.content }]
                }));
            }
            Role::Model => {
                let mut parts = Vec::new();

                if !m.content.is_empty() {
                    parts.push(json!({ "text": m.content }));
                }

                for tc in m.requested_tools() {
                    parts.push(json!({
                        "functionCall": {
                            "name": tc.name,
                            "args": tc.arguments
                        }
                    }));
                }

                if !parts.is_empty() {
                    contents.push(json!({
                        "role": "model",
                        "parts": parts
                    }));
                }
            }
            Role::Tool => {
                let tool_name = m.name.clone().unwrap_or_else(|| "tool".to_string());
                pending_responses.push(json!({
                    "functionResponse": {
                        "name": tool_name,
                        "response": { "result": m.content }
                    }
                }));
            }
        }
    }

    if !pending_responses.is_empty() {
        contents.push(json!({
            "role": "user",
            "parts": pending_responses
        }));
    }

    (system_instruction, contents)
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: CompletionRequest) -> LlmResult<CompletionResponse> {
        let body = self.build_request_body(&request);
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.expose_secret())])
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(LlmError::Authentication(format!(
                "Gemini rejected the API key ({})",
                status
            )));
        }
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                message: error_text,
            });
        }

        let gemini_response: GeminiResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Parse(format!("Failed to parse response: {}", e)))?;

        self.parse_response(&gemini_response)
    }
}

// Gemini API response types

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    usage_metadata: Option<GeminiUsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiContent {
    parts: Option<Vec<GeminiPart>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPart {
    text: Option<String>,
    function_call: Option<GeminiFunctionCall>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiFunctionCall {
    name: String,
    args: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsageMetadata {
    prompt_token_count: Option<u32>,
    candidates_token_count: Option<u32>,
    total_token_count: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::config::LlmProviderType;
    use crate::agents::domain::ToolDefinition;

    fn provider() -> GeminiProvider {
        let config = LlmProviderConfig {
            provider: LlmProviderType::Gemini,
            model: "gemini-2.0-flash".to_string(),
            api_key_env: None,
            base_url: None,
            temperature: None,
            max_tokens: None,
            timeout_secs: 5,
        };
        GeminiProvider::with_api_key(&config, SecretString::from("test-key".to_string())).unwrap()
    }

    #[test]
    fn test_request_body_carries_system_instruction_and_tools() {
        let request = CompletionRequest::new(vec![
            Message::system("be helpful"),
            Message::user("hello"),
        ])
        .with_tools(vec![ToolDefinition::new(
            "verify_customer_exist",
            "lookup",
            json!({"type": "object"}),
        )]);

        let body = provider().build_request_body(&request);

        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "be helpful");
        assert_eq!(body["contents"].as_array().unwrap().len(), 1);
        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(
            body["tools"][0]["function_declarations"][0]["name"],
            "verify_customer_exist"
        );
        assert!(body.get("generationConfig").is_none());
    }

    #[test]
    fn test_tool_results_fold_into_one_user_turn() {
        let a = ToolCall::new("call_0", "verify_customer_exist", json!({"customer_email": "a@b.co"}));
        let b = ToolCall::new("call_1", "send_password_reset_link", json!({"customer_email": "a@b.co"}));
        let messages = vec![
            Message::user("help"),
            Message::model_with_tools("", vec![a.clone(), b.clone()]),
            Message::tool_result(&a, "{\"customer_id\": 7}"),
            Message::tool_result(&b, "sent"),
        ];

        let (system, contents) = convert_messages(&messages);

        assert!(system.is_none());
        assert_eq!(contents.len(), 3);
        assert_eq!(contents[1]["role"], "model");
        assert_eq!(contents[1]["parts"].as_array().unwrap().len(), 2);
        let responses = contents[2]["parts"].as_array().unwrap();
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[1]["functionResponse"]["name"], "send_password_reset_link");
        assert_eq!(responses[1]["functionResponse"]["response"]["result"], "sent");
    }

    #[test]
    fn test_parse_response_with_function_calls() {
        let raw = json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [
                        {"text": "Let me check."},
                        {"functionCall": {"name": "verify_customer_exist", "args": {"customer_email": "a@b.co"}}}
                    ]
                },
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 10, "candidatesTokenCount": 4, "totalTokenCount": 14}
        });
        let parsed: GeminiResponse = serde_json::from_value(raw).unwrap();

        let response = provider().parse_response(&parsed).unwrap();

        assert_eq!(response.finish_reason, FinishReason::ToolCalls);
        assert_eq!(response.message.content, "Let me check.");
        let calls = response.message.requested_tools();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].id, "call_0");
        assert_eq!(calls[0].arguments["customer_email"], "a@b.co");
        assert_eq!(response.usage.unwrap().total_tokens, 14);
    }

    #[test]
    fn test_parse_response_without_candidates_fails() {
        let parsed: GeminiResponse = serde_json::from_value(json!({})).unwrap();
        assert!(matches!(
            provider().parse_response(&parsed),
            Err(LlmError::Parse(_))
        ));
    }

    #[test]
    fn test_safety_block_is_content_filtered() {
        let parsed: GeminiResponse =
            serde_json::from_value(json!({"candidates": [{"finishReason": "SAFETY"}]})).unwrap();
        assert!(matches!(
            provider().parse_response(&parsed),
            Err(LlmError::ContentFiltered)
        ));
    }
}
