//! Message-framed duplex channels to MCP servers.
//!
//! A transport only moves [`JsonRpcMessage`]s. Correlating requests with
//! responses is the session's job; see [`crate::client`].

mod process;
mod sse;
mod stdio;
mod streamable_http;

use std::sync::Arc;

use async_trait::async_trait;
use mcpchat_core::{ConfigError, McpServerConfig, TransportKind};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::protocol::JsonRpcMessage;

pub use sse::SseTransport;
pub use stdio::StdioTransport;
pub use streamable_http::StreamableHttpTransport;

/// Errors raised while opening or using a transport.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to spawn MCP server process '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to connect to MCP server at {url}: {reason}")]
    Connect { url: String, reason: String },

    #[error("Failed to communicate with MCP server: {0}")]
    Io(#[from] std::io::Error),

    #[error("MCP server HTTP error: {0}")]
    Http(String),

    #[error("Connection closed")]
    Closed,
}

impl TransportError {
    /// Whether the peer went away (as opposed to never being reachable).
    pub fn is_closed(&self) -> bool {
        match self {
            Self::Closed => true,
            Self::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::UnexpectedEof
            ),
            _ => false,
        }
    }
}

/// Messages arriving from the server. The channel ending means the
/// connection closed.
pub type Incoming = mpsc::UnboundedReceiver<JsonRpcMessage>;

/// Outgoing half of a connection.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, message: &JsonRpcMessage) -> Result<(), TransportError>;

    /// Release the connection. Safe to call more than once.
    async fn close(&self) -> Result<(), TransportError>;

    /// Extra context for error messages (for stdio, the tail of stderr).
    fn diagnostics(&self) -> Option<String> {
        None
    }
}

/// A freshly opened transport and its incoming message stream.
pub struct TransportHandle {
    pub transport: Arc<dyn Transport>,
    pub incoming: Incoming,
}

impl std::fmt::Debug for TransportHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportHandle").finish_non_exhaustive()
    }
}

/// Builds transports from server configs.
#[async_trait]
pub trait TransportFactory: Send + Sync {
    async fn open(&self, config: &McpServerConfig) -> Result<TransportHandle, TransportError>;
}

/// Factory for the three built-in transports.
#[derive(Debug, Clone, Default)]
pub struct DefaultTransportFactory {
    http: reqwest::Client,
}

impl DefaultTransportFactory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TransportFactory for DefaultTransportFactory {
    async fn open(&self, config: &McpServerConfig) -> Result<TransportHandle, TransportError> {
        config.validate()?;

        match config.transport {
            TransportKind::Stdio => StdioTransport::spawn(config),
            TransportKind::StreamableHttp => {
                StreamableHttpTransport::open(self.http.clone(), http_url(config)?)
            }
            TransportKind::Sse => SseTransport::connect(self.http.clone(), http_url(config)?).await,
        }
    }
}

fn http_url(config: &McpServerConfig) -> Result<url::Url, TransportError> {
    let raw = config
        .url
        .as_deref()
        .ok_or(ConfigError::MissingUrl(config.transport))?;
    url::Url::parse(raw).map_err(|e| {
        TransportError::Config(ConfigError::InvalidUrl {
            url: raw.to_string(),
            reason: e.to_string(),
        })
    })
}
