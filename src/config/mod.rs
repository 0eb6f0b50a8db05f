use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub mod validator;

use crate::adapters::downstream::ToolsConfig;
use crate::adapters::rate_limit::RateLimitConfig;
use crate::agents::config::{HistoryConfig, QueryAgentConfig, SupportAgentConfig};
use crate::cli::Cli;
use crate::persistence::AuditConfig;
use crate::retrieval::{EmbeddingConfig, IngestConfig, VectorIndexConfig};

/// Prefix for environment overrides, e.g. `UELLOGENT__SERVER__PORT=9000`
pub const ENV_PREFIX: &str = "UELLOGENT";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub admin: AdminSettings,
    #[serde(default)]
    pub session: SessionSettings,
    #[serde(default)]
    pub support_agent: SupportAgentConfig,
    #[serde(default)]
    pub query_agent: QueryAgentConfig,
    #[serde(default)]
    pub embeddings: EmbeddingConfig,
    #[serde(default)]
    pub vector_index: VectorIndexConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub audit: AuditConfig,
    /// Downstream endpoints behind the support tools
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AdminSettings {
    /// Environment variable holding the admin key
    #[serde(default = "default_admin_key_env")]
    pub key_env: String,
}

fn default_admin_key_env() -> String {
    "ADMIN_KEY".to_string()
}

impl Default for AdminSettings {
    fn default() -> Self {
        Self {
            key_env: default_admin_key_env(),
        }
    }
}

/// Idle timeout and sweep cadence shared by both agents' sessions
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionSettings {
    #[serde(default = "default_session_timeout")]
    pub timeout_secs: u64,
    /// Idle support sessions may outlive the timeout by up to one interval
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

fn default_session_timeout() -> u64 {
    15 * 60
}

fn default_sweep_interval() -> u64 {
    60 * 60
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_session_timeout(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

impl SessionSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl Settings {
    /// Load from `uellogent.toml` in the working directory and the environment
    pub fn new() -> Result<Self, anyhow::Error> {
        Self::load(Some(Path::new("uellogent.toml")), Self::environment())
    }

    /// Create settings from CLI arguments (includes config file and CLI overrides)
    pub fn new_with_cli(cli: &Cli) -> Result<Self, anyhow::Error> {
        let mut settings = Self::build(Some(&cli.config), Self::environment())?;

        // CLI > env vars > config file
        settings.apply_cli_overrides(cli);

        settings.validate()?;
        Ok(settings)
    }

    /// Layer defaults, an optional TOML file and environment overrides, then validate
    pub fn load(file: Option<&Path>, env: Environment) -> Result<Self, anyhow::Error> {
        let settings = Self::build(file, env)?;
        settings.validate()?;
        Ok(settings)
    }

    /// `UELLOGENT__SECTION__KEY` environment source
    pub fn environment() -> Environment {
        Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .try_parsing(true)
    }

    fn build(file: Option<&Path>, env: Environment) -> Result<Self, anyhow::Error> {
        let mut builder = Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(false));
        }

        let s = builder.add_source(env).build()?;
        Ok(s.try_deserialize()?)
    }

    fn apply_cli_overrides(&mut self, cli: &Cli) {
        if let Some(host) = &cli.host {
            self.server.host = host.clone();
        }
        if let Some(port) = cli.port {
            self.server.port = port;
        }
    }

    fn validate(&self) -> Result<(), anyhow::Error> {
        validator::ConfigValidator::validate(self).map_err(|errors| {
            let error_messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            anyhow::anyhow!(
                "Configuration validation failed:\n{}",
                error_messages.join("\n")
            )
        })
    }
}
