//! Command-line and environment configuration for `mcpchat-server`.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use mcpchat_agent::AgentConfig;
use mcpchat_agent::config::DEFAULT_MAX_ITERATIONS;

use crate::bootstrap::{CorsConfig, DEFAULT_PORT, ServerConfig};
use crate::gemini::{DEFAULT_BASE_URL, DEFAULT_MODEL, GeminiConfig};

#[derive(Debug, Parser)]
#[command(name = "mcpchat-server", version, about = "Gemini chat backend with MCP tool calling")]
pub struct ServerArgs {
    /// Port for the HTTP server.
    #[arg(long, env = "MCPCHAT_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// JSON file holding saved MCP server configs.
    #[arg(long, env = "MCPCHAT_CONFIG_PATH", default_value = "mcp-servers.json")]
    pub config_path: PathBuf,

    /// Gemini API key. Chat requests fail with 500 when unset.
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub gemini_api_key: Option<String>,

    /// Gemini model name.
    #[arg(long, env = "GEMINI_MODEL", default_value = DEFAULT_MODEL)]
    pub model: String,

    /// Gemini API base URL, for proxies and regional endpoints.
    #[arg(long, env = "GEMINI_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub gemini_base_url: String,

    /// Model rounds allowed per chat request.
    #[arg(long, env = "MCPCHAT_MAX_ITERATIONS", default_value_t = DEFAULT_MAX_ITERATIONS)]
    pub max_iterations: usize,

    /// Per tool call timeout in seconds; unset waits indefinitely.
    #[arg(long, env = "MCPCHAT_TOOL_TIMEOUT_SECS")]
    pub tool_timeout_secs: Option<u64>,

    /// Allowed CORS origins (comma separated). Any origin when empty.
    #[arg(long, env = "MCPCHAT_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Vec<String>,

    /// Connect every saved MCP server at startup.
    #[arg(long, env = "MCPCHAT_CONNECT_SAVED")]
    pub connect_saved: bool,
}

impl ServerArgs {
    pub fn into_config(self) -> ServerConfig {
        let mut agent = AgentConfig::default().with_max_iterations(self.max_iterations);
        if let Some(secs) = self.tool_timeout_secs.filter(|s| *s > 0) {
            agent = agent.with_tool_timeout(Duration::from_secs(secs));
        }

        let gemini = self.gemini_api_key.filter(|key| !key.trim().is_empty()).map(|key| {
            GeminiConfig::new(key)
                .with_model(self.model)
                .with_base_url(self.gemini_base_url)
        });

        let config = ServerConfig {
            port: self.port,
            config_path: self.config_path,
            gemini,
            agent,
            connect_saved: self.connect_saved,
            ..ServerConfig::with_defaults()
        };
        if self.cors_origins.is_empty() {
            config
        } else {
            config.with_allowed_origins(self.cors_origins)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_build_config() {
        let args = ServerArgs::try_parse_from([
            "mcpchat-server",
            "--port",
            "8080",
            "--gemini-api-key",
            "test-key",
            "--model",
            "gemini-2.5-flash",
            "--max-iterations",
            "4",
            "--tool-timeout-secs",
            "30",
            "--gemini-base-url",
            "http://localhost:8089/v1beta",
            "--cors-origins",
            "http://localhost:3000,http://127.0.0.1:3000",
        ])
        .unwrap();

        let config = args.into_config();
        assert_eq!(config.port, 8080);
        assert_eq!(config.agent.max_iterations, 4);
        assert_eq!(config.agent.tool_timeout, Some(Duration::from_secs(30)));
        let gemini = config.gemini.unwrap();
        assert_eq!(gemini.model, "gemini-2.5-flash");
        assert_eq!(gemini.api_key, "test-key");
        assert_eq!(gemini.base_url, "http://localhost:8089/v1beta");
        assert!(matches!(config.cors, CorsConfig::AllowOrigins(ref o) if o.len() == 2));
    }

    #[test]
    fn test_defaults_allow_any_origin() {
        let config = ServerArgs::try_parse_from(["mcpchat-server"]).unwrap().into_config();
        assert!(matches!(config.cors, CorsConfig::AllowAll));
        assert!(!config.connect_saved);
    }

    #[test]
    fn test_blank_api_key_means_no_model() {
        let args =
            ServerArgs::try_parse_from(["mcpchat-server", "--gemini-api-key", " "]).unwrap();
        assert!(args.into_config().gemini.is_none());
    }
}
