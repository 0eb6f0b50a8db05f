//! Agent implementations
//!
//! - `SupportAgent`: stateful tool-calling loop, one instance per session
//! - `QueryAgent`: stateless retrieval-augmented answering over an external history

mod query;
mod support;

pub use query::QueryAgent;
pub use support::SupportAgent;

use tera::{Context, Tera};

use crate::agents::domain::ContextChunk;
use crate::agents::error::{AgentError, AgentResult};
use crate::agents::prompts::GROUNDED_PROMPT_TEMPLATE;

/// Render the context-grounded question sent to the query model
pub fn render_grounded_prompt(contexts: &[ContextChunk], query: &str) -> AgentResult<String> {
    let mut context = Context::new();
    context.insert("contexts", contexts);
    context.insert("query", query);

    Tera::one_off(GROUNDED_PROMPT_TEMPLATE, &context, false)
        .map_err(|e| AgentError::Internal(format!("Failed to render grounded prompt: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grounded_prompt_numbers_each_excerpt() {
        let contexts = vec![
            ContextChunk {
                text: "UelloSend sends bulk SMS.".to_string(),
                title: "About".to_string(),
                url: "https://uellosend.com/about".to_string(),
            },
            ContextChunk {
                text: "Pricing starts at 0.03 per SMS.".to_string(),
                title: "Pricing".to_string(),
                url: "https://uellosend.com/pricing".to_string(),
            },
        ];

        let prompt = render_grounded_prompt(&contexts, "How much is an SMS?").unwrap();

        assert!(prompt.starts_with("Answer the following question based on the provided context information."));
        assert!(prompt.contains("\"I don't have enough information to answer this question.\""));
        assert!(prompt.contains("[1] UelloSend sends bulk SMS. (Source: About - https://uellosend.com/about)"));
        assert!(prompt.contains("[2] Pricing starts at 0.03 per SMS. (Source: Pricing - https://uellosend.com/pricing)"));
        assert!(prompt.contains("Question: How much is an SMS?"));
        assert!(prompt.trim_end().ends_with("Answer:"));
    }

    #[test]
    fn test_grounded_prompt_does_not_escape_html() {
        let contexts = vec![ContextChunk {
            text: "Use <b>Send</b> & wait".to_string(),
            title: "Guide".to_string(),
            url: "https://uellosend.com/guide?a=1&b=2".to_string(),
        }];

        let prompt = render_grounded_prompt(&contexts, "a < b?").unwrap();

        assert!(prompt.contains("Use <b>Send</b> & wait"));
        assert!(prompt.contains("a=1&b=2"));
        assert!(prompt.contains("Question: a < b?"));
    }
}
