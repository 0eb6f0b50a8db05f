//! Scripted provider replaying canned replies, for tests and offline runs

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

use super::{CompletionRequest, CompletionResponse, LlmProvider};
use crate::agents::domain::Message;
use crate::agents::error::{LlmError, LlmResult};

enum Step {
    Reply(Message),
    Fail(String),
}

/// Provider that answers each call with the next queued step and records
/// every request it receives
#[derive(Default)]
pub struct ScriptedProvider {
    steps: Mutex<VecDeque<Step>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reply
    pub fn reply(self, message: Message) -> Self {
        if let Ok(mut steps) = self.steps.lock() {
            steps.push_back(Step::Reply(message));
        }
        self
    }

    /// Queue a provider failure
    pub fn fail(self, reason: impl Into<String>) -> Self {
        if let Ok(mut steps) = self.steps.lock() {
            steps.push_back(Step::Fail(reason.into()));
        }
        self
    }

    /// Requests received so far
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    /// Number of calls made so far
    pub fn calls(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: CompletionRequest) -> LlmResult<CompletionResponse> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }

        let step = self
            .steps
            .lock()
            .map_err(|_| LlmError::Network("script lock poisoned".to_string()))?
            .pop_front();

        match step {
            Some(Step::Reply(message)) => Ok(CompletionResponse::new(message)),
            Some(Step::Fail(reason)) => Err(LlmError::Api {
                status: 503,
                message: reason,
            }),
            None => Err(LlmError::Parse("script exhausted".to_string())),
        }
    }
}
