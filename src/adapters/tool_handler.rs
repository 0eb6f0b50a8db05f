//! Support tool set
//!
//! Four downstream operations the support agent may invoke. Arguments are
//! validated before any request leaves the process, and every documented
//! downstream code maps to a fixed sentence for the model to relay.

use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Value};
use std::sync::{Arc, LazyLock};
use tracing::{debug, warn};

use super::downstream::{DownstreamClient, DownstreamReply};
use crate::agents::domain::{ToolCall, ToolDefinition, ToolPort};
use crate::agents::error::ToolError;

/// The closed set of tools published to the support model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SupportTool {
    VerifyCustomerExist,
    FixCreditTopupIssue,
    ResendAccountVerificationLink,
    SendPasswordResetLink,
}

impl SupportTool {
    pub const ALL: [SupportTool; 4] = [
        SupportTool::VerifyCustomerExist,
        SupportTool::FixCreditTopupIssue,
        SupportTool::ResendAccountVerificationLink,
        SupportTool::SendPasswordResetLink,
    ];

    /// Function name as seen by the model
    pub fn name(&self) -> &'static str {
        match self {
            SupportTool::VerifyCustomerExist => "verify_customer_exist",
            SupportTool::FixCreditTopupIssue => "fix_credit_topup_issue",
            SupportTool::ResendAccountVerificationLink => "resend_account_verification_link",
            SupportTool::SendPasswordResetLink => "send_password_reset_link",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tool| tool.name() == name)
    }

    /// Schema published to the model
    pub fn definition(&self) -> ToolDefinition {
        match self {
            SupportTool::VerifyCustomerExist => ToolDefinition::new(
                self.name(),
                "Checks the database to see if a customer exists for the provided email address, it returns a dictionary with customer_id as the key, the value of customer_id is postive integer if the customer exists or Not Found if the customer does not exist.",
                email_schema("Valid email address of the customer which will be used to check if the customer exists."),
            ),
            SupportTool::FixCreditTopupIssue => ToolDefinition::new(
                self.name(),
                "Resolves credit top up issues by verifying transactions and automatically crediting customer account with the correct amount, it returns the Status of the request eg Resolved, Not Resolved, No Resolution Required",
                json!({
                    "type": "object",
                    "properties": {
                        "customer_id": {
                            "type": "integer",
                            "description": "The ID of the customer making the request."
                        },
                        "transaction_id": {
                            "type": "string",
                            "description": "The ID of the transaction to be used for crediting customer account."
                        }
                    },
                    "required": ["customer_id", "transaction_id"]
                }),
            ),
            SupportTool::ResendAccountVerificationLink => ToolDefinition::new(
                self.name(),
                "This function will resend a account verification link to the provided email address of the customer if it exists on record, it returns a string value to indicate the status of the request eg Verification Link Sent, Unable To Send Verification Link, Customer Not Found.",
                email_schema("Valid email address of the customer which will be used as the recipient of the account verification link."),
            ),
            SupportTool::SendPasswordResetLink => ToolDefinition::new(
                self.name(),
                "This function will send reset password link to the provided email address of the customer if it exists on record, it returns a string value to indicate the status of the request eg Reset Password Link Sent, Unable To Send Reset Password Link, Customer Not Found.",
                email_schema("Valid email address of the customer which will be used as the recipient of the reset password link."),
            ),
        }
    }
}

fn email_schema(description: &str) -> Value {
    json!({
        "type": "object",
        "properties": {
            "customer_email": {
                "type": "string",
                "description": description
            }
        },
        "required": ["customer_email"]
    })
}

/// Validated arguments for one invocation
#[derive(Debug, Clone, PartialEq)]
enum ToolArgs {
    Email(String),
    Topup { customer_id: i64, transaction_id: String },
}

impl ToolArgs {
    fn parse(tool: SupportTool, args: &Value) -> Result<Self, ToolError> {
        match tool {
            SupportTool::FixCreditTopupIssue => Ok(ToolArgs::Topup {
                customer_id: customer_id(args.get("customer_id"))?,
                transaction_id: transaction_id(args.get("transaction_id"))?,
            }),
            _ => Ok(ToolArgs::Email(customer_email(args.get("customer_email"))?)),
        }
    }

    /// Request body sent downstream
    fn body(&self) -> Value {
        match self {
            ToolArgs::Email(email) => json!({ "email": email }),
            ToolArgs::Topup {
                customer_id,
                transaction_id,
            } => json!({ "user_id": customer_id, "transaction_id": transaction_id }),
        }
    }
}

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9-]+(\.[a-zA-Z0-9-]+)*\.[a-zA-Z]{2,}$").unwrap()
});

static TRANSACTION_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").unwrap());

fn customer_email(value: Option<&Value>) -> Result<String, ToolError> {
    let email = value
        .and_then(Value::as_str)
        .map(str::trim)
        .ok_or_else(|| ToolError::Validation("customer_email is required".to_string()))?;

    if EMAIL_RE.is_match(email) {
        Ok(email.to_string())
    } else {
        Err(ToolError::Validation(format!(
            "customer_email is not a valid email address: {}",
            email
        )))
    }
}

/// Positive integer; integral floats and numeric strings are accepted
fn customer_id(value: Option<&Value>) -> Result<i64, ToolError> {
    let invalid = || ToolError::Validation("customer_id must be a positive integer".to_string());

    let id = match value.ok_or_else(invalid)? {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };

    id.filter(|id| *id > 0).ok_or_else(invalid)
}

fn transaction_id(value: Option<&Value>) -> Result<String, ToolError> {
    let id = value
        .and_then(Value::as_str)
        .map(str::trim)
        .ok_or_else(|| ToolError::Validation("transaction_id is required".to_string()))?;

    if TRANSACTION_RE.is_match(id) {
        Ok(id.to_string())
    } else {
        Err(ToolError::Validation(format!(
            "transaction_id must contain only letters, digits, '-' or '_': {:?}",
            id
        )))
    }
}

/// Map a downstream reply to the sentence returned to the model
fn outcome(tool: SupportTool, args: &ToolArgs, reply: &DownstreamReply) -> Result<String, ToolError> {
    let result = reply.result_text();

    let text = match (tool, args, reply.code) {
        (_, _, 400) => format!("Error with request - {}", result),

        (SupportTool::VerifyCustomerExist, _, 404) => r#"{"customer_id": "Not Found"}"#.to_string(),
        (SupportTool::VerifyCustomerExist, _, 200) => format!(r#"{{"customer_id": {}}}"#, reply.result),

        (SupportTool::FixCreditTopupIssue, ToolArgs::Topup { transaction_id, .. }, code) => match code {
            502 => "Not Resolved: Payment Gateway Error".to_string(),
            402 => format!(
                "No Resolution Required: The transaction with ID - {} was not completed by the customer",
                transaction_id
            ),
            406 => format!(
                "No Resolution Required: The transaction with ID - {} cannot be found or has already been credited to the customer",
                transaction_id
            ),
            200 => format!(
                "Resolved: The transaction with ID - {} has been credited to the customer successfully, customer should check UelloSend Dashboard",
                transaction_id
            ),
            _ => return Err(unexpected(tool, code)),
        },

        (SupportTool::ResendAccountVerificationLink, ToolArgs::Email(email), code) => match code {
            404 => format!("No customer found for email: {}", email),
            500 => format!("Unable To Send Verification Link - {}", result),
            200 => format!(
                "Verification Link Sent to {} with Subject - UelloSend Account Verification Link. Customer should check all mail folders including SPAM",
                email
            ),
            406 => "Account has already been verified, you can login to UelloSend dashboard".to_string(),
            _ => return Err(unexpected(tool, code)),
        },

        (SupportTool::SendPasswordResetLink, ToolArgs::Email(email), code) => match code {
            404 => format!("No customer found for email: {}", email),
            500 => format!("Unable To Send Reset Password Link Sent - {}", result),
            200 => format!(
                "Reset Password Link Sent to {} with Subject - Reset Password Link. Customer should check all mail folders including SPAM",
                email
            ),
            _ => return Err(unexpected(tool, code)),
        },

        (_, _, code) => return Err(unexpected(tool, code)),
    };

    Ok(text)
}

fn unexpected(tool: SupportTool, code: i64) -> ToolError {
    ToolError::UnexpectedStatus {
        tool: tool.name().to_string(),
        code,
    }
}

/// ToolPort backed by the downstream account service
pub struct SupportToolSet {
    client: Arc<dyn DownstreamClient>,
}

impl SupportToolSet {
    pub fn new(client: Arc<dyn DownstreamClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ToolPort for SupportToolSet {
    fn definitions(&self) -> Vec<ToolDefinition> {
        SupportTool::ALL.iter().map(SupportTool::definition).collect()
    }

    async fn execute(&self, call: &ToolCall) -> Result<String, ToolError> {
        let tool = SupportTool::from_name(&call.name)
            .ok_or_else(|| ToolError::UnknownTool(call.name.clone()))?;
        let args = ToolArgs::parse(tool, &call.arguments)?;

        let reply = self.client.call(tool, args.body()).await?;
        debug!(tool = tool.name(), code = reply.code, "Downstream replied");

        outcome(tool, &args, &reply).inspect_err(|e| {
            warn!(tool = tool.name(), "{}", e);
        })
    }
}
