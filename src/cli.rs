use clap::Parser;
use std::path::PathBuf;

/// UelloGent - customer-support chat backend with tool-calling and RAG agents
#[derive(Parser, Debug, Clone)]
#[command(name = "uellogent", version, about, long_about = None)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, env = "UELLOGENT_CONFIG", default_value = "uellogent.toml")]
    pub config: PathBuf,

    /// Server host address
    #[arg(long, env = "UELLOGENT_HOST")]
    pub host: Option<String>,

    /// Server port
    #[arg(long, env = "UELLOGENT_PORT")]
    pub port: Option<u16>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_with_args() {
        let cli = Cli::parse_from([
            "uellogent",
            "--config",
            "custom.toml",
            "--host",
            "0.0.0.0",
            "--port",
            "8080",
        ]);
        assert_eq!(cli.config, PathBuf::from("custom.toml"));
        assert_eq!(cli.host, Some("0.0.0.0".to_string()));
        assert_eq!(cli.port, Some(8080));
    }

    #[test]
    fn test_cli_short_config_flag() {
        let cli = Cli::parse_from(["uellogent", "-c", "/etc/uellogent.toml", "--port", "9000"]);
        assert_eq!(cli.config, PathBuf::from("/etc/uellogent.toml"));
        assert_eq!(cli.port, Some(9000));
    }
}
