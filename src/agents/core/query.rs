//! Retrieval-augmented query agent

use std::sync::Arc;

use tracing::debug;

use super::render_grounded_prompt;
use crate::agents::config::QueryAgentConfig;
use crate::agents::domain::{AgentKind, ContextRetriever, Message, MessageLog, Role};
use crate::agents::error::AgentResult;
use crate::agents::llm::{CompletionRequest, LlmProvider};
use crate::agents::prompts::unable_to_respond;

/// Stateless RAG agent operating on a caller-owned history
pub struct QueryAgent {
    config: QueryAgentConfig,
    llm: Arc<dyn LlmProvider>,
    retriever: Arc<dyn ContextRetriever>,
    log: Arc<dyn MessageLog>,
}

impl QueryAgent {
    pub fn new(
        config: QueryAgentConfig,
        llm: Arc<dyn LlmProvider>,
        retriever: Arc<dyn ContextRetriever>,
        log: Arc<dyn MessageLog>,
    ) -> Self {
        Self {
            config,
            llm,
            retriever,
            log,
        }
    }

    /// Answer `query`, appending the new turns to `history`.
    ///
    /// A fresh history is seeded with the system instruction and answered
    /// directly. Later turns are grounded in retrieved context; when retrieval
    /// finds nothing the fixed unable-to-respond reply is returned without
    /// touching the model or the history.
    pub async fn respond(
        &self,
        history: &mut Vec<Message>,
        query: &str,
        session_id: &str,
    ) -> AgentResult<String> {
        if history.is_empty() {
            debug!(session_id, "Bootstrapping query conversation");
            history.push(Message::system(&self.config.system_prompt));
            history.push(Message::user(query));
            self.audit(session_id, Role::User, query).await;
            return self.generate(history, session_id).await;
        }

        let contexts = self.retriever.retrieve(query, self.config.top_k).await?;

        if contexts.is_empty() {
            let reply = unable_to_respond(query);
            self.audit(session_id, Role::Model, &reply).await;
            return Ok(reply);
        }

        debug!(session_id, chunks = contexts.len(), "Grounding query in retrieved context");
        let prompt = render_grounded_prompt(&contexts, query)?;
        history.push(Message::user(prompt.clone()));
        self.audit(session_id, Role::User, &prompt).await;

        self.generate(history, session_id).await
    }

    async fn generate(&self, history: &mut Vec<Message>, session_id: &str) -> AgentResult<String> {
        let request = CompletionRequest::new(history.clone())
            .with_sampling(self.config.temperature, self.config.seed);

        let response = self.llm.complete(request).await?;
        let text = response.message.content.clone();

        history.push(Message::model(text.clone()));
        self.audit(session_id, Role::Model, &text).await;

        Ok(text)
    }

    async fn audit(&self, session_id: &str, role: Role, text: &str) {
        self.log.record(AgentKind::Query, session_id, role, text).await;
    }
}
