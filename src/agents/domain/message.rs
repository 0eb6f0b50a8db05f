//! Conversation turn types

use serde::{Deserialize, Serialize};

use super::ToolCall;

/// Role of a conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instruction
    System,
    /// User message
    User,
    /// Model reply (including turns that request tool calls)
    #[serde(alias = "assistant")]
    Model,
    /// Tool outcome fed back to the model
    Tool,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Model => write!(f, "model"),
            Role::Tool => write!(f, "tool"),
        }
    }
}

/// A single turn in a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Role of the message sender
    pub role: Role,
    /// Message content (text)
    pub content: String,
    /// Tool calls requested by the model (if any)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    /// ID of the tool call this message is responding to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Tool name for tool turns
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Message {
    fn plain(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: None,
            tool_call_id: None,
            name: None,
        }
    }

    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::plain(Role::System, content)
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::plain(Role::User, content)
    }

    /// Create a model message
    pub fn model(content: impl Into<String>) -> Self {
        Self::plain(Role::Model, content)
    }

    /// Create a model message that requests tool calls
    pub fn model_with_tools(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Model,
            content: content.into(),
            tool_calls: if tool_calls.is_empty() {
                None
            } else {
                Some(tool_calls)
            },
            tool_call_id: None,
            name: None,
        }
    }

    /// Create a tool outcome message answering `call`
    pub fn tool_result(call: &ToolCall, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
            tool_calls: None,
            tool_call_id: Some(call.id.clone()),
            name: Some(call.name.clone()),
        }
    }

    /// Tool calls carried by this message, empty when there are none
    pub fn requested_tools(&self) -> &[ToolCall] {
        self.tool_calls.as_deref().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_role_serializes_as_lowercase() {
        assert_eq!(serde_json::to_value(Role::Model).unwrap(), json!("model"));
        let role: Role = serde_json::from_value(json!("assistant")).unwrap();
        assert_eq!(role, Role::Model);
    }

    #[test]
    fn test_history_round_trips_through_json() {
        let call = ToolCall::new("call_0", "send_password_reset_link", json!({"customer_email": "a@b.co"}));
        let history = vec![
            Message::user("reset my password"),
            Message::model_with_tools("", vec![call.clone()]),
            Message::tool_result(&call, "sent"),
            Message::model("done"),
        ];

        let encoded = serde_json::to_string(&history).unwrap();
        let decoded: Vec<Message> = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, history);
        assert_eq!(decoded[1].requested_tools().len(), 1);
        assert_eq!(decoded[2].name.as_deref(), Some("send_password_reset_link"));
    }

    #[test]
    fn test_empty_tool_calls_are_dropped() {
        let msg = Message::model_with_tools("hi", Vec::new());
        assert!(msg.tool_calls.is_none());
        assert!(msg.requested_tools().is_empty());
    }
}
