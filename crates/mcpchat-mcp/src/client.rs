//! MCP protocol session over any [`Transport`].
//!
//! A [`McpSession`] only exists after a successful `initialize` handshake,
//! so no RPC can be issued before it. Requests are correlated by id through
//! a pending table that a background reader task resolves.
//! Reference: <https://modelcontextprotocol.io/specification>

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use mcpchat_core::{
    Capabilities, McpPrompt, McpResource, McpTool, PromptResult, ResourceContent, ToolOutput,
};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use thiserror::Error;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::protocol::{
    InitializeResult, JsonRpcMessage, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse,
    ListPage, METHOD_NOT_FOUND, PROTOCOL_VERSION, PromptsPage, ReadResourceResult, RequestId,
    ResourcesPage, ServerCapabilities, ServerInfo, ToolsPage,
};
use crate::transport::{Incoming, Transport, TransportError, TransportHandle};

/// Upper bound on pages followed for one list call.
const MAX_LIST_PAGES: usize = 1000;

/// Errors that can occur during MCP client operations.
#[derive(Debug, Error)]
pub enum McpClientError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("MCP protocol error: {0}")]
    Protocol(String),

    #[error("Timeout waiting for MCP server response to {method}")]
    Timeout { method: String },

    #[error("MCP server returned error: code={code}, message={message}")]
    Server { code: i64, message: String },

    #[error("Connection closed")]
    ConnectionClosed,
}

impl McpClientError {
    /// Whether the peer went away mid-conversation.
    pub fn is_connection_closed(&self) -> bool {
        match self {
            Self::ConnectionClosed => true,
            Self::Transport(e) => e.is_closed(),
            _ => false,
        }
    }
}

/// Identity sent in `initialize`.
#[derive(Debug, Clone)]
pub struct ClientInfo {
    pub name: String,
    pub version: String,
}

impl Default for ClientInfo {
    fn default() -> Self {
        Self {
            name: "mcpchat".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Timeouts applied by a session.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub client_info: ClientInfo,
    /// Upper bound on the `initialize` round trip.
    pub handshake_timeout: Duration,
    /// Upper bound on every other request; `None` waits indefinitely.
    pub request_timeout: Option<Duration>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            client_info: ClientInfo::default(),
            handshake_timeout: Duration::from_secs(30),
            request_timeout: None,
        }
    }
}

/// Why a capability list could not be fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unsupported {
    /// The server did not advertise the capability in `initialize`.
    NotAdvertised,
    /// The server answered with JSON-RPC "method not found".
    MethodNotFound,
    /// Any other failure.
    Failed(String),
}

/// Outcome of listing an optional capability.
///
/// Callers that only need a list use [`collapse`].
pub type CapabilityList<T> = Result<Vec<T>, Unsupported>;

/// Treat an unsupported capability as an empty list.
pub fn collapse<T>(listed: CapabilityList<T>) -> Vec<T> {
    listed.unwrap_or_default()
}

#[derive(Default)]
struct PendingTable {
    closed: bool,
    waiters: HashMap<u64, oneshot::Sender<JsonRpcResponse>>,
}

type Pending = Arc<Mutex<PendingTable>>;

fn lock(pending: &Pending) -> std::sync::MutexGuard<'_, PendingTable> {
    pending.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Request/response plumbing shared by the handshake and the live session.
struct RpcChannel {
    transport: Arc<dyn Transport>,
    pending: Pending,
    next_id: AtomicU64,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl RpcChannel {
    fn start(handle: TransportHandle, server: String) -> Self {
        let pending: Pending = Arc::default();
        let reader = tokio::spawn(read_loop(
            handle.incoming,
            Arc::clone(&pending),
            Arc::clone(&handle.transport),
            server,
        ));
        Self {
            transport: handle.transport,
            pending,
            next_id: AtomicU64::new(1),
            reader: Mutex::new(Some(reader)),
        }
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Option<Value>,
        limit: Option<Duration>,
    ) -> Result<T, McpClientError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        {
            let mut table = lock(&self.pending);
            if table.closed {
                return Err(McpClientError::ConnectionClosed);
            }
            table.waiters.insert(id, tx);
        }

        trace!(id, method, "MCP request");
        let message = JsonRpcMessage::Request(JsonRpcRequest::new(id, method, params));
        if let Err(e) = self.transport.send(&message).await {
            lock(&self.pending).waiters.remove(&id);
            return Err(e.into());
        }

        let response = match limit {
            Some(limit) => {
                if let Ok(response) = tokio::time::timeout(limit, rx).await {
                    response
                } else {
                    lock(&self.pending).waiters.remove(&id);
                    return Err(McpClientError::Timeout {
                        method: method.to_string(),
                    });
                }
            }
            None => rx.await,
        }
        .map_err(|_| McpClientError::ConnectionClosed)?;

        let value = response
            .into_result()
            .map_err(|e| McpClientError::Server {
                code: e.code,
                message: e.message,
            })?;
        Ok(serde_json::from_value(value)?)
    }

    async fn notify(&self, method: &str, params: Option<Value>) -> Result<(), McpClientError> {
        let message = JsonRpcMessage::Notification(JsonRpcNotification::new(method, params));
        self.transport.send(&message).await?;
        Ok(())
    }

    fn mark_closed(&self) {
        fail_pending(&self.pending);
        if let Some(reader) = self
            .reader
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            reader.abort();
        }
    }
}

impl Drop for RpcChannel {
    fn drop(&mut self) {
        self.mark_closed();
    }
}

/// Drop every waiter so in-flight requests fail with `ConnectionClosed`.
fn fail_pending(pending: &Pending) {
    let mut table = lock(pending);
    table.closed = true;
    table.waiters.clear();
}

async fn read_loop(
    mut incoming: Incoming,
    pending: Pending,
    transport: Arc<dyn Transport>,
    server: String,
) {
    while let Some(message) = incoming.recv().await {
        match message {
            JsonRpcMessage::Response(response) => {
                let waiter = match &response.id {
                    Some(RequestId::Number(id)) => lock(&pending).waiters.remove(id),
                    _ => None,
                };
                match waiter {
                    Some(waiter) => {
                        let _ = waiter.send(response);
                    }
                    None => debug!(server = %server, id = ?response.id, "Dropping response with no waiter"),
                }
            }
            JsonRpcMessage::Request(request) => {
                let reply = if request.method == "ping" {
                    JsonRpcResponse::success(request.id, json!({}))
                } else {
                    debug!(server = %server, method = %request.method, "Rejecting server request");
                    JsonRpcResponse::failure(
                        request.id,
                        METHOD_NOT_FOUND,
                        format!("Method not supported by client: {}", request.method),
                    )
                };
                if let Err(e) = transport.send(&JsonRpcMessage::Response(reply)).await {
                    debug!(server = %server, error = %e, "Failed to answer server request");
                }
            }
            JsonRpcMessage::Notification(notification) => {
                trace!(server = %server, method = %notification.method, "MCP notification");
            }
        }
    }

    debug!(server = %server, "MCP connection closed");
    fail_pending(&pending);
}

/// An initialized MCP session.
pub struct McpSession {
    rpc: RpcChannel,
    server: String,
    server_info: ServerInfo,
    capabilities: ServerCapabilities,
    protocol_version: String,
    request_timeout: Option<Duration>,
    closed: AtomicBool,
}

impl std::fmt::Debug for McpSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpSession")
            .field("server", &self.server)
            .field("protocol_version", &self.protocol_version)
            .finish_non_exhaustive()
    }
}

impl McpSession {
    /// Run the `initialize` handshake over a fresh transport.
    ///
    /// On failure the transport is closed before the error is returned.
    pub async fn initialize(
        handle: TransportHandle,
        server: impl Into<String>,
        options: &SessionOptions,
    ) -> Result<Self, McpClientError> {
        let server = server.into();
        let rpc = RpcChannel::start(handle, server.clone());

        match Self::handshake(&rpc, options).await {
            Ok(init) => {
                info!(
                    server = %server,
                    server_name = %init.server_info.name,
                    protocol_version = %init.protocol_version,
                    "MCP session initialized"
                );
                if let Some(instructions) = &init.instructions {
                    debug!(server = %server, %instructions, "Server instructions");
                }
                Ok(Self {
                    rpc,
                    server,
                    server_info: init.server_info,
                    capabilities: init.capabilities,
                    protocol_version: init.protocol_version,
                    request_timeout: options.request_timeout,
                    closed: AtomicBool::new(false),
                })
            }
            Err(e) => {
                rpc.mark_closed();
                if let Err(close_err) = rpc.transport.close().await {
                    debug!(server = %server, error = %close_err, "Error closing transport after failed handshake");
                }
                Err(e)
            }
        }
    }

    async fn handshake(
        rpc: &RpcChannel,
        options: &SessionOptions,
    ) -> Result<InitializeResult, McpClientError> {
        let params = json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": {
                "name": options.client_info.name,
                "version": options.client_info.version,
            }
        });
        let init: InitializeResult = rpc
            .request("initialize", Some(params), Some(options.handshake_timeout))
            .await?;
        rpc.notify("notifications/initialized", None).await?;
        Ok(init)
    }

    pub const fn server_info(&self) -> &ServerInfo {
        &self.server_info
    }

    pub fn protocol_version(&self) -> &str {
        &self.protocol_version
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst) || lock(&self.rpc.pending).closed
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> Result<T, McpClientError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(McpClientError::ConnectionClosed);
        }
        self.rpc.request(method, params, self.request_timeout).await
    }

    async fn list_all<P: ListPage>(&self) -> Result<Vec<P::Item>, McpClientError> {
        let mut items = Vec::new();
        let mut cursor: Option<String> = None;
        let mut seen = HashSet::new();
        let mut pages = 0;
        loop {
            let params = cursor.take().map(|c| json!({ "cursor": c }));
            let page: P = self.request(P::METHOD, params).await?;
            let (batch, next) = page.into_parts();
            items.extend(batch);
            pages += 1;
            match next {
                Some(next) if !next.is_empty() => {
                    if !seen.insert(next.clone()) {
                        return Err(McpClientError::Protocol(format!(
                            "{} repeated cursor '{next}'",
                            P::METHOD
                        )));
                    }
                    if pages >= MAX_LIST_PAGES {
                        return Err(McpClientError::Protocol(format!(
                            "{} exceeded {MAX_LIST_PAGES} pages",
                            P::METHOD
                        )));
                    }
                    cursor = Some(next);
                }
                _ => return Ok(items),
            }
        }
    }

    async fn try_list<P: ListPage>(&self, advertised: bool) -> CapabilityList<P::Item> {
        if !advertised {
            return Err(Unsupported::NotAdvertised);
        }
        self.list_all::<P>().await.map_err(|e| match e {
            McpClientError::Server { code, .. } if code == METHOD_NOT_FOUND => {
                Unsupported::MethodNotFound
            }
            other => Unsupported::Failed(other.to_string()),
        })
    }

    pub async fn list_tools(&self) -> Result<Vec<McpTool>, McpClientError> {
        self.list_all::<ToolsPage>().await
    }

    pub async fn list_prompts(&self) -> Result<Vec<McpPrompt>, McpClientError> {
        self.list_all::<PromptsPage>().await
    }

    pub async fn list_resources(&self) -> Result<Vec<McpResource>, McpClientError> {
        self.list_all::<ResourcesPage>().await
    }

    pub async fn try_list_tools(&self) -> CapabilityList<McpTool> {
        self.try_list::<ToolsPage>(self.capabilities.tools.is_some())
            .await
    }

    pub async fn try_list_prompts(&self) -> CapabilityList<McpPrompt> {
        self.try_list::<PromptsPage>(self.capabilities.prompts.is_some())
            .await
    }

    pub async fn try_list_resources(&self) -> CapabilityList<McpResource> {
        self.try_list::<ResourcesPage>(self.capabilities.resources.is_some())
            .await
    }

    /// Fetch tools, prompts and resources concurrently.
    ///
    /// Unsupported capabilities become empty lists.
    pub async fn fetch_capabilities(&self) -> Capabilities {
        let (tools, prompts, resources) =
            tokio::join!(self.try_list_tools(), self.try_list_prompts(), self.try_list_resources());

        for (kind, outcome) in [
            ("tools", tools.as_ref().err()),
            ("prompts", prompts.as_ref().err()),
            ("resources", resources.as_ref().err()),
        ] {
            if let Some(reason) = outcome {
                debug!(server = %self.server, capability = kind, ?reason, "Capability unavailable");
            }
        }

        Capabilities {
            tools: collapse(tools),
            prompts: collapse(prompts),
            resources: collapse(resources),
        }
    }

    /// Invoke a tool. The server's `isError` flag is passed through untouched.
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> Result<ToolOutput, McpClientError> {
        let params = json!({ "name": name, "arguments": arguments });
        self.request("tools/call", Some(params)).await
    }

    /// Resolve a prompt template. Argument values are sent as strings.
    pub async fn get_prompt(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> Result<PromptResult, McpClientError> {
        let arguments: Map<String, Value> = arguments
            .into_iter()
            .map(|(k, v)| {
                let v = match v {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                (k, Value::String(v))
            })
            .collect();
        let params = json!({ "name": name, "arguments": arguments });
        self.request("prompts/get", Some(params)).await
    }

    pub async fn read_resource(&self, uri: &str) -> Result<Vec<ResourceContent>, McpClientError> {
        let result: ReadResourceResult = self
            .request("resources/read", Some(json!({ "uri": uri })))
            .await?;
        Ok(result.contents)
    }

    /// Close the session and its transport. Idempotent.
    pub async fn close(&self) -> Result<(), McpClientError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.rpc.mark_closed();
        if let Err(e) = self.rpc.transport.close().await {
            warn!(server = %self.server, error = %e, "Error closing MCP transport");
            return Err(e.into());
        }
        debug!(server = %self.server, "MCP session closed");
        Ok(())
    }
}
