//! Axum server bootstrap - the composition root.
//!
//! This module is the ONLY place where infrastructure is wired together
//! for the web adapter. All concrete implementations are instantiated here.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use mcpchat_agent::AgentConfig;
use mcpchat_core::{AppEventEmitter, LlmPort, McpConfigRepository, ToolExecutor};
use mcpchat_mcp::{JsonFileConfigRepository, McpService};
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::gemini::{GeminiClient, GeminiConfig};
use crate::sse::SseBroadcaster;

pub const DEFAULT_PORT: u16 = 9887;

/// CORS configuration for the web server.
#[derive(Debug, Clone, Default)]
pub enum CorsConfig {
    /// Allow all origins (development mode).
    #[default]
    AllowAll,
    /// Allow specific origins (production mode).
    AllowOrigins(Vec<String>),
}

/// Server configuration for the Axum adapter.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port for the HTTP server.
    pub port: u16,
    /// JSON file holding the saved MCP server configs.
    pub config_path: PathBuf,
    /// Gemini settings; `None` when no API key is configured.
    pub gemini: Option<GeminiConfig>,
    pub agent: AgentConfig,
    /// Connect every saved server during startup.
    pub connect_saved: bool,
    pub cors: CorsConfig,
}

impl ServerConfig {
    pub fn with_defaults() -> Self {
        Self {
            port: DEFAULT_PORT,
            config_path: PathBuf::from("mcp-servers.json"),
            gemini: None,
            agent: AgentConfig::default(),
            connect_saved: false,
            cors: CorsConfig::default(),
        }
    }

    /// Set CORS to allow specific origins.
    #[must_use]
    pub fn with_allowed_origins(mut self, origins: Vec<String>) -> Self {
        self.cors = CorsConfig::AllowOrigins(origins);
        self
    }
}

/// Application context for the Axum adapter.
pub struct AxumContext {
    /// Saved configs plus the live connection registry.
    pub mcp: Arc<McpService>,
    /// Tool source for the agent loop; the registry in production.
    pub tools: Arc<dyn ToolExecutor>,
    /// Language model; `None` turns chat requests into a 500.
    pub llm: Option<Arc<dyn LlmPort>>,
    pub agent: AgentConfig,
    /// SSE broadcaster for lifecycle events.
    pub sse: Arc<SseBroadcaster>,
}

impl AxumContext {
    /// Context around an existing repository, using the registry as tool source.
    pub fn new(
        repository: Arc<dyn McpConfigRepository>,
        llm: Option<Arc<dyn LlmPort>>,
        agent: AgentConfig,
    ) -> Self {
        let sse = Arc::new(SseBroadcaster::with_defaults());
        let mcp = Arc::new(McpService::new(
            repository,
            Arc::clone(&sse) as Arc<dyn AppEventEmitter>,
        ));
        let tools: Arc<dyn ToolExecutor> = mcp.manager();
        Self {
            mcp,
            tools,
            llm,
            agent,
            sse,
        }
    }

    /// Replace the agent's tool source.
    #[must_use]
    pub fn with_tools(mut self, tools: Arc<dyn ToolExecutor>) -> Self {
        self.tools = tools;
        self
    }
}

/// Bootstrap the server with all services.
pub async fn bootstrap(config: ServerConfig) -> Result<AxumContext> {
    info!(
        target: "mcpchat.paths",
        config_path = %config.config_path.display(),
        "Axum bootstrap resolved paths"
    );

    let repository: Arc<dyn McpConfigRepository> =
        Arc::new(JsonFileConfigRepository::new(config.config_path.clone()));

    let llm = match config.gemini {
        Some(gemini) => {
            let client = GeminiClient::new(gemini);
            info!(model = %client.model(), "Gemini language model configured");
            Some(Arc::new(client) as Arc<dyn LlmPort>)
        }
        None => {
            warn!("GEMINI_API_KEY is not set; chat requests will fail");
            None
        }
    };

    let ctx = AxumContext::new(repository, llm, config.agent);

    // Surface a broken config file at startup rather than on first request
    let saved = ctx.mcp.list_configs().await?;
    info!(count = saved.len(), "Loaded saved MCP server configs");

    if config.connect_saved {
        let mcp = Arc::clone(&ctx.mcp);
        tokio::spawn(async move { mcp.connect_all_saved().await });
    }

    Ok(ctx)
}

/// Start the web server and run until ctrl-c, then close every MCP session.
pub async fn start_server(config: ServerConfig) -> Result<()> {
    let ctx = bootstrap(config.clone()).await?;
    let mcp = Arc::clone(&ctx.mcp);

    let app = crate::routes::create_router(ctx, &config.cors);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("mcpchat web server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutting down MCP connections");
    mcp.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
