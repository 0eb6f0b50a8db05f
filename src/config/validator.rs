use thiserror::Error;

use crate::agents::config::{HistoryBackend, LlmProviderConfig};
use crate::config::{ServerSettings, Settings};
use crate::persistence::DatabaseBackend;
use crate::retrieval::IndexBackend;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

fn invalid(field: &str, reason: impl Into<String>) -> ValidationError {
    ValidationError::InvalidValue {
        field: field.to_string(),
        reason: reason.into(),
    }
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

pub struct ConfigValidator;

impl ConfigValidator {
    /// Check every section, reporting all problems at once
    pub fn validate(settings: &Settings) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        Self::validate_server(&settings.server, &mut errors);
        Self::validate_sessions(settings, &mut errors);
        Self::validate_agents(settings, &mut errors);
        Self::validate_retrieval(settings, &mut errors);
        Self::validate_storage(settings, &mut errors);
        Self::validate_tools(settings, &mut errors);

        if settings.rate_limit.enabled && settings.rate_limit.requests_per_day == 0 {
            errors.push(invalid(
                "rate_limit.requests_per_day",
                "must be greater than 0 when rate limiting is enabled",
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn validate_server(server: &ServerSettings, errors: &mut Vec<ValidationError>) {
        if server.host.is_empty() {
            errors.push(ValidationError::MissingField("server.host".to_string()));
        }

        // u16 caps the upper bound
        if server.port == 0 {
            errors.push(invalid("server.port", "Port must be greater than 0"));
        }
    }

    fn validate_sessions(settings: &Settings, errors: &mut Vec<ValidationError>) {
        if settings.session.timeout_secs == 0 {
            errors.push(invalid("session.timeout_secs", "must be greater than 0"));
        }
        if settings.session.sweep_interval_secs == 0 {
            errors.push(invalid("session.sweep_interval_secs", "must be greater than 0"));
        }
    }

    fn validate_llm(section: &str, llm: &LlmProviderConfig, errors: &mut Vec<ValidationError>) {
        if llm.model.trim().is_empty() {
            errors.push(ValidationError::MissingField(format!("{}.llm.model", section)));
        }
        if llm.timeout_secs == 0 {
            errors.push(invalid(&format!("{}.llm.timeout_secs", section), "must be greater than 0"));
        }
        if let Some(url) = &llm.base_url {
            if !is_http_url(url) {
                errors.push(invalid(&format!("{}.llm.base_url", section), "must be an http(s) URL"));
            }
        }
    }

    fn validate_agents(settings: &Settings, errors: &mut Vec<ValidationError>) {
        Self::validate_llm("support_agent", &settings.support_agent.llm, errors);
        Self::validate_llm("query_agent", &settings.query_agent.llm, errors);

        if settings.support_agent.max_iterations == 0 {
            errors.push(invalid("support_agent.max_iterations", "must be greater than 0"));
        }
        if settings.query_agent.top_k == 0 {
            errors.push(invalid("query_agent.top_k", "must be greater than 0"));
        }
        if !(0.0..=2.0).contains(&settings.query_agent.temperature) {
            errors.push(invalid("query_agent.temperature", "must be between 0.0 and 2.0"));
        }
    }

    fn validate_retrieval(settings: &Settings, errors: &mut Vec<ValidationError>) {
        if settings.embeddings.dimensions == 0 {
            errors.push(invalid("embeddings.dimensions", "must be greater than 0"));
        }
        if !is_http_url(&settings.embeddings.base_url) {
            errors.push(invalid("embeddings.base_url", "must be an http(s) URL"));
        }
        if settings.vector_index.backend == IndexBackend::Qdrant && !is_http_url(&settings.vector_index.url) {
            errors.push(invalid("vector_index.url", "must be an http(s) URL"));
        }
        if settings.vector_index.collection.trim().is_empty() {
            errors.push(ValidationError::MissingField("vector_index.collection".to_string()));
        }
        if settings.ingest.chunk_size == 0 {
            errors.push(invalid("ingest.chunk_size", "must be greater than 0"));
        } else if settings.ingest.chunk_overlap >= settings.ingest.chunk_size {
            errors.push(invalid("ingest.chunk_overlap", "must be smaller than ingest.chunk_size"));
        }
    }

    fn validate_storage(settings: &Settings, errors: &mut Vec<ValidationError>) {
        if settings.history.backend == HistoryBackend::Redis {
            match settings.history.redis_url.as_deref() {
                None | Some("") => errors.push(ValidationError::MissingField(
                    "history.redis_url (required for the redis backend)".to_string(),
                )),
                Some(url) if !url.starts_with("redis://") && !url.starts_with("rediss://") => {
                    errors.push(invalid("history.redis_url", "must be a redis:// or rediss:// URL"))
                }
                Some(_) => {}
            }
        }

        if let Err(e) = DatabaseBackend::from_url(&settings.audit.database_url) {
            errors.push(invalid("audit.database_url", e.to_string()));
        }
        if settings.audit.max_connections == 0 {
            errors.push(invalid("audit.max_connections", "must be greater than 0"));
        }
    }

    fn validate_tools(settings: &Settings, errors: &mut Vec<ValidationError>) {
        let tools = &settings.tools;
        for (field, url) in [
            ("tools.customer_url", &tools.customer_url),
            ("tools.transaction_url", &tools.transaction_url),
            ("tools.verification_url", &tools.verification_url),
            ("tools.reset_url", &tools.reset_url),
        ] {
            // empty means not configured; the tool then reports itself unavailable
            if !url.is_empty() && !is_http_url(url) {
                errors.push(invalid(field, "must be an http(s) URL"));
            }
        }
        if tools.timeout_secs == 0 {
            errors.push(invalid("tools.timeout_secs", "must be greater than 0"));
        }
    }
}
