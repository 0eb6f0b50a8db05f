//! Tool-calling support agent

use std::sync::Arc;

use tracing::{debug, warn};

use crate::agents::config::SupportAgentConfig;
use crate::agents::domain::{AgentKind, Message, MessageLog, Role, ToolCall, ToolPort};
use crate::agents::error::{AgentError, AgentResult};
use crate::agents::llm::{CompletionRequest, LlmProvider};

/// A support conversation bound to one session.
///
/// Owns the ordered turns of that session. Each call to [`respond`] drives
/// the model until it produces a turn with no function calls, dispatching
/// every requested tool in between and auditing each step as it happens.
///
/// [`respond`]: SupportAgent::respond
pub struct SupportAgent {
    llm: Arc<dyn LlmProvider>,
    tools: Arc<dyn ToolPort>,
    log: Arc<dyn MessageLog>,
    system_prompt: String,
    max_iterations: u32,
    history: Vec<Message>,
}

impl SupportAgent {
    /// Create a new support agent with an empty conversation
    pub fn new(
        config: &SupportAgentConfig,
        llm: Arc<dyn LlmProvider>,
        tools: Arc<dyn ToolPort>,
        log: Arc<dyn MessageLog>,
    ) -> Self {
        Self {
            llm,
            tools,
            log,
            system_prompt: config.system_prompt.clone(),
            max_iterations: config.max_iterations,
            history: Vec::new(),
        }
    }

    /// Turns exchanged so far, excluding the system instruction
    pub fn history(&self) -> &[Message] {
        &self.history
    }

    /// Answer one user message
    ///
    /// On failure the conversation is rolled back to where it was before the
    /// call, so a retry does not replay half an exchange to the model.
    pub async fn respond(&mut self, session_id: &str, query: &str) -> AgentResult<String> {
        let checkpoint = self.history.len();
        let result = self.run_exchange(session_id, query).await;
        if result.is_err() {
            self.history.truncate(checkpoint);
        }
        result
    }

    async fn run_exchange(&mut self, session_id: &str, query: &str) -> AgentResult<String> {
        self.audit(session_id, Role::User, query).await;
        self.history.push(Message::user(query));

        let tools = self.tools.definitions();

        for iteration in 0..self.max_iterations {
            let mut messages = Vec::with_capacity(self.history.len() + 1);
            messages.push(Message::system(&self.system_prompt));
            messages.extend(self.history.iter().cloned());

            let request = CompletionRequest::new(messages).with_tools(tools.clone());
            let response = self.llm.complete(request).await?;
            let reply = response.message;

            let calls: Vec<ToolCall> = reply.requested_tools().to_vec();
            if calls.is_empty() {
                self.audit(session_id, Role::Model, &reply.content).await;
                let text = reply.content.clone();
                self.history.push(Message::model(reply.content));
                return Ok(text);
            }

            debug!(
                session_id,
                iteration,
                tool_calls = calls.len(),
                "Model requested tool calls"
            );

            if !reply.content.is_empty() {
                self.audit(session_id, Role::Model, &reply.content).await;
            }
            self.history.push(Message::model_with_tools(reply.content, calls.clone()));

            for call in &calls {
                self.audit(session_id, Role::Model, &format!("Tool called: {}", call.name))
                    .await;

                let outcome = match self.tools.execute(call).await {
                    Ok(output) => output,
                    Err(e) => {
                        warn!(session_id, tool = %call.name, "Tool call failed: {}", e);
                        format!("Error - {}", e)
                    }
                };

                let result = format!("Tool called: {} and result is: {}", call.name, outcome);
                self.audit(session_id, Role::Tool, &result).await;
                self.history.push(Message::tool_result(call, result));
            }
        }

        Err(AgentError::MaxIterations(self.max_iterations))
    }

    async fn audit(&self, session_id: &str, role: Role, text: &str) {
        self.log.record(AgentKind::Support, session_id, role, text).await;
    }
}
