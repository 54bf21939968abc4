//! Connection registry: one entry per server id.
//!
//! State machine per id:
//!
//! ```text
//! disconnected -> connecting -> connected | error
//! connected | error -> disconnected
//! ```
//!
//! `connect` is serialized per id, so two concurrent calls never produce two
//! live sessions. Calls for different ids run independently. Every entry
//! carries an epoch that `connect` and `disconnect` replace with a fresh value
//! from a manager-wide counter, so epochs never repeat even after `remove`
//! drops the entry. A connect that finishes after its epoch moved on closes
//! the session it built and leaves the entry alone.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use async_trait::async_trait;
use futures_util::future::join_all;
use mcpchat_core::{
    AppEvent, AppEventEmitter, Capabilities, ConnectionState, McpErrorInfo, McpPrompt,
    McpResource, McpServerConfig, McpServiceError, McpTool, PromptResult, ResourceContent,
    ServerTool, ToolExecutor, ToolOutput, TransportKind,
};
use serde_json::{Map, Value};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::client::{McpClientError, McpSession, SessionOptions, collapse};
use crate::transport::{DefaultTransportFactory, TransportFactory};

struct Entry {
    state: ConnectionState,
    session: Option<Arc<McpSession>>,
    config: Option<McpServerConfig>,
    epoch: u64,
}

impl Entry {
    fn new(server_id: &str) -> Self {
        Self {
            state: ConnectionState::disconnected(server_id),
            session: None,
            config: None,
            epoch: 0,
        }
    }

    fn server_name(&self) -> String {
        self.config.as_ref().map_or_else(
            || self.state.server_id.clone(),
            |c| c.display_name().to_string(),
        )
    }
}

/// Process-wide table of MCP sessions.
///
/// Built once at startup and shared as `Arc<McpManager>`.
pub struct McpManager {
    entries: RwLock<HashMap<String, Entry>>,
    connect_locks: StdMutex<HashMap<String, Arc<Mutex<()>>>>,
    epochs: AtomicU64,
    factory: Arc<dyn TransportFactory>,
    options: SessionOptions,
    emitter: Arc<dyn AppEventEmitter>,
}

impl McpManager {
    /// Manager using the built-in transports and default session options.
    pub fn new(emitter: Arc<dyn AppEventEmitter>) -> Self {
        Self::with_factory(
            Arc::new(DefaultTransportFactory::new()),
            SessionOptions::default(),
            emitter,
        )
    }

    pub fn with_factory(
        factory: Arc<dyn TransportFactory>,
        options: SessionOptions,
        emitter: Arc<dyn AppEventEmitter>,
    ) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            connect_locks: StdMutex::new(HashMap::new()),
            epochs: AtomicU64::new(0),
            factory,
            options,
            emitter,
        }
    }

    fn next_epoch(&self) -> u64 {
        self.epochs.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn connect_lock(&self, server_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self
            .connect_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(server_id.to_string()).or_default())
    }

    /// Connect to a server, or return the live state if already connected.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` before any I/O when required fields are missing;
    /// `Connection` when the transport or handshake fails (the entry is left
    /// in `error`) or when a `disconnect` overtook the attempt.
    pub async fn connect(&self, config: McpServerConfig) -> Result<ConnectionState, McpServiceError> {
        config.validate()?;

        let server_id = config.id.clone();
        let server_name = config.display_name().to_string();
        let lock = self.connect_lock(&server_id);
        let _guard = lock.lock().await;

        let epoch = {
            let mut entries = self.entries.write().await;
            if let Some(entry) = entries.get(&server_id)
                && entry.session.is_some()
                && entry.state.is_connected()
            {
                debug!(server_id = %server_id, "MCP server already connected");
                return Ok(entry.state.clone());
            }

            let entry = entries
                .entry(server_id.clone())
                .or_insert_with(|| Entry::new(&server_id));
            entry.epoch = self.next_epoch();
            entry.state = ConnectionState::connecting(&server_id);
            entry.session = None;
            entry.config = Some(config.clone());
            entry.epoch
        };
        self.emitter.emit(AppEvent::mcp_server_connecting(&config));
        info!(
            server_id = %server_id,
            server_name = %server_name,
            transport = %config.transport,
            "Connecting to MCP server"
        );

        let result = self.establish(&config).await;

        let mut entries = self.entries.write().await;
        let current = entries
            .get_mut(&server_id)
            .filter(|entry| entry.epoch == epoch);

        match (result, current) {
            (Ok((session, capabilities)), Some(entry)) => {
                let tool_count = capabilities.tools.len();
                entry.state = ConnectionState::connected(&server_id, capabilities);
                entry.session = Some(session);
                let state = entry.state.clone();
                drop(entries);

                info!(
                    server_id = %server_id,
                    server_name = %server_name,
                    tools = tool_count,
                    prompts = state.prompts.len(),
                    resources = state.resources.len(),
                    "MCP server connected"
                );
                self.emitter.emit(AppEvent::mcp_server_connected(
                    &server_id,
                    &server_name,
                    tool_count,
                ));
                Ok(state)
            }
            (Ok((session, _)), None) => {
                drop(entries);
                info!(server_id = %server_id, "Connect superseded by disconnect, closing session");
                if let Err(e) = session.close().await {
                    debug!(server_id = %server_id, error = %e, "Error closing superseded session");
                }
                Err(McpServiceError::Connection(format!(
                    "Connection to {server_name} was cancelled by disconnect"
                )))
            }
            (Err(message), Some(entry)) => {
                entry.state = ConnectionState::failed(&server_id, &message);
                drop(entries);

                warn!(server_id = %server_id, server_name = %server_name, error = %message, "MCP connection failed");
                self.emitter.emit(AppEvent::mcp_server_error(McpErrorInfo::connection(
                    &server_id,
                    &server_name,
                    &message,
                )));
                Err(McpServiceError::Connection(message))
            }
            (Err(message), None) => {
                drop(entries);
                debug!(server_id = %server_id, error = %message, "Superseded connect also failed");
                Err(McpServiceError::Connection(message))
            }
        }
    }

    /// Open the transport, run the handshake and take the capability snapshot.
    async fn establish(
        &self,
        config: &McpServerConfig,
    ) -> Result<(Arc<McpSession>, Capabilities), String> {
        let handle = self
            .factory
            .open(config)
            .await
            .map_err(|e| describe_failure(config, &e.into(), None))?;
        let transport = Arc::clone(&handle.transport);

        let session = McpSession::initialize(handle, config.display_name(), &self.options)
            .await
            .map_err(|e| describe_failure(config, &e, transport.diagnostics()))?;

        let capabilities = session.fetch_capabilities().await;
        Ok((Arc::new(session), capabilities))
    }

    /// Close the session for `server_id` and mark it `disconnected`.
    ///
    /// Never fails: close errors are logged. Also cancels an in-flight connect.
    pub async fn disconnect(&self, server_id: &str) {
        let session = {
            let mut entries = self.entries.write().await;
            let entry = entries
                .entry(server_id.to_string())
                .or_insert_with(|| Entry::new(server_id));
            entry.epoch = self.next_epoch();
            entry.state = ConnectionState::disconnected(server_id);
            entry.config = None;
            entry.session.take()
        };

        if let Some(session) = session
            && let Err(e) = session.close().await
        {
            warn!(server_id = %server_id, error = %e, "Error closing MCP session");
        }

        info!(server_id = %server_id, "MCP server disconnected");
        self.emitter
            .emit(AppEvent::mcp_server_disconnected(server_id));
    }

    /// Disconnect and forget the entry entirely.
    pub async fn remove(&self, server_id: &str) {
        self.disconnect(server_id).await;
        self.entries.write().await.remove(server_id);
        self.connect_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(server_id);
        self.emitter.emit(AppEvent::mcp_server_removed(server_id));
    }

    /// Disconnect every server with a live or pending session.
    pub async fn shutdown(&self) {
        let ids: Vec<String> = {
            let entries = self.entries.read().await;
            entries
                .iter()
                .filter(|(_, entry)| entry.session.is_some() || entry.config.is_some())
                .map(|(id, _)| id.clone())
                .collect()
        };
        if ids.is_empty() {
            return;
        }
        info!(count = ids.len(), "Shutting down MCP connections");
        join_all(ids.iter().map(|id| self.disconnect(id))).await;
    }

    pub async fn get_connection_state(&self, server_id: &str) -> Option<ConnectionState> {
        self.entries
            .read()
            .await
            .get(server_id)
            .map(|entry| entry.state.clone())
    }

    /// Every known state, ordered by server id.
    pub async fn get_all_connection_states(&self) -> Vec<ConnectionState> {
        let mut states: Vec<ConnectionState> = self
            .entries
            .read()
            .await
            .values()
            .map(|entry| entry.state.clone())
            .collect();
        states.sort_by(|a, b| a.server_id.cmp(&b.server_id));
        states
    }

    /// Tools of connected servers only, ordered by server id.
    pub async fn get_all_tools(&self) -> Vec<ServerTool> {
        let entries = self.entries.read().await;
        let mut connected: Vec<&Entry> = entries
            .values()
            .filter(|entry| entry.state.is_connected())
            .collect();
        connected.sort_by(|a, b| a.state.server_id.cmp(&b.state.server_id));

        connected
            .into_iter()
            .flat_map(|entry| {
                let server_name = entry.server_name();
                entry.state.tools.iter().map(move |tool| ServerTool {
                    server_id: entry.state.server_id.clone(),
                    server_name: server_name.clone(),
                    tool: tool.clone(),
                })
            })
            .collect()
    }

    async fn live_session(&self, server_id: &str) -> Result<(Arc<McpSession>, u64), McpServiceError> {
        let entries = self.entries.read().await;
        entries
            .get(server_id)
            .and_then(|entry| entry.session.as_ref().map(|s| (Arc::clone(s), entry.epoch)))
            .ok_or_else(|| McpServiceError::NotConnected(server_id.to_string()))
    }

    /// Run `op` on the live session, noticing if the peer went away meanwhile.
    async fn with_session<T, F, Fut>(&self, server_id: &str, op: F) -> Result<T, McpServiceError>
    where
        F: FnOnce(Arc<McpSession>) -> Fut,
        Fut: Future<Output = Result<T, McpClientError>>,
    {
        let (session, epoch) = self.live_session(server_id).await?;
        let result = op(Arc::clone(&session)).await;
        if session.is_closed() {
            self.mark_lost(server_id, epoch).await;
        }
        result.map_err(|e| service_error(server_id, e))
    }

    async fn mark_lost(&self, server_id: &str, epoch: u64) {
        let (session, server_name) = {
            let mut entries = self.entries.write().await;
            let Some(entry) = entries
                .get_mut(server_id)
                .filter(|entry| entry.epoch == epoch && entry.session.is_some())
            else {
                return;
            };
            entry.state = ConnectionState::failed(server_id, "connection lost");
            (entry.session.take(), entry.server_name())
        };

        warn!(server_id = %server_id, server_name = %server_name, "MCP connection lost");
        if let Some(session) = session
            && let Err(e) = session.close().await
        {
            debug!(server_id = %server_id, error = %e, "Error closing lost session");
        }
        self.emitter.emit(AppEvent::mcp_server_error(McpErrorInfo::connection(
            server_id,
            server_name,
            "connection lost",
        )));
    }

    /// Re-fetch tools from the server. Unsupported means empty.
    pub async fn list_tools(&self, server_id: &str) -> Result<Vec<McpTool>, McpServiceError> {
        self.with_session(server_id, |s| async move { Ok(collapse(s.try_list_tools().await)) })
            .await
    }

    pub async fn list_prompts(&self, server_id: &str) -> Result<Vec<McpPrompt>, McpServiceError> {
        self.with_session(server_id, |s| async move {
            Ok(collapse(s.try_list_prompts().await))
        })
        .await
    }

    pub async fn list_resources(
        &self,
        server_id: &str,
    ) -> Result<Vec<McpResource>, McpServiceError> {
        self.with_session(server_id, |s| async move {
            Ok(collapse(s.try_list_resources().await))
        })
        .await
    }

    pub async fn call_tool(
        &self,
        server_id: &str,
        tool_name: &str,
        arguments: Map<String, Value>,
    ) -> Result<ToolOutput, McpServiceError> {
        debug!(server_id = %server_id, tool = %tool_name, "Calling MCP tool");
        self.with_session(server_id, |s| async move {
            s.call_tool(tool_name, arguments).await
        })
        .await
    }

    pub async fn get_prompt(
        &self,
        server_id: &str,
        prompt_name: &str,
        arguments: Map<String, Value>,
    ) -> Result<PromptResult, McpServiceError> {
        self.with_session(server_id, |s| async move {
            s.get_prompt(prompt_name, arguments).await
        })
        .await
    }

    pub async fn read_resource(
        &self,
        server_id: &str,
        uri: &str,
    ) -> Result<Vec<ResourceContent>, McpServiceError> {
        self.with_session(server_id, |s| async move { s.read_resource(uri).await })
            .await
    }
}

#[async_trait]
impl ToolExecutor for McpManager {
    async fn available_tools(&self) -> Vec<ServerTool> {
        self.get_all_tools().await
    }

    async fn execute_tool(
        &self,
        server_id: &str,
        tool_name: &str,
        arguments: Map<String, Value>,
    ) -> Result<ToolOutput, McpServiceError> {
        self.call_tool(server_id, tool_name, arguments).await
    }
}

/// Turn a connect failure into the message stored on the entry.
fn describe_failure(
    config: &McpServerConfig,
    error: &McpClientError,
    diagnostics: Option<String>,
) -> String {
    let mut message = if error.is_connection_closed() {
        let what = match config.transport {
            TransportKind::Stdio => "command",
            TransportKind::StreamableHttp | TransportKind::Sse => "URL",
        };
        format!(
            "Connection closed during the MCP handshake. Check that the server is configured correctly ({what}: {})",
            config.target_description()
        )
    } else {
        error.to_string()
    };

    if let Some(stderr) = diagnostics {
        message.push_str("\nServer stderr:\n");
        message.push_str(&stderr);
    }
    message
}

fn service_error(server_id: &str, error: McpClientError) -> McpServiceError {
    if error.is_connection_closed() {
        return McpServiceError::Connection(format!("Connection to server {server_id} lost"));
    }
    match error {
        McpClientError::Server { message, .. } => McpServiceError::ToolError(message),
        McpClientError::Transport(e) => McpServiceError::Connection(e.to_string()),
        other @ (McpClientError::Json(_)
        | McpClientError::Protocol(_)
        | McpClientError::Timeout { .. }
        | McpClientError::ConnectionClosed) => McpServiceError::Protocol(other.to_string()),
    }
}
