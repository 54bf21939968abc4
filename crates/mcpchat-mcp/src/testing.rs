//! In-process MCP server used by unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use mcpchat_core::{AppEvent, AppEventEmitter, McpServerConfig, McpTool};
use serde_json::{Value, json};
use tokio::sync::mpsc;

use crate::protocol::{JsonRpcMessage, JsonRpcRequest, JsonRpcResponse, PROTOCOL_VERSION};
use crate::transport::{Transport, TransportError, TransportFactory, TransportHandle};

/// Scripted server behaviour.
#[derive(Debug, Clone, Default)]
pub(crate) struct FakeServer {
    tools: Vec<McpTool>,
    prompts: bool,
    page_size: Option<usize>,
    stuck_cursor: bool,
    init_delay: Option<Duration>,
    rejections: HashMap<String, i64>,
    hang_up: HashSet<String>,
    ignored: HashSet<String>,
}

impl FakeServer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_tools(mut self, tools: Vec<McpTool>) -> Self {
        self.tools = tools;
        self
    }

    pub(crate) fn advertise_prompts(mut self) -> Self {
        self.prompts = true;
        self
    }

    pub(crate) fn page_size(mut self, size: usize) -> Self {
        self.page_size = Some(size);
        self
    }

    /// Answer every `tools/list` with the same `nextCursor`.
    pub(crate) fn stuck_cursor(mut self) -> Self {
        self.stuck_cursor = true;
        self
    }

    pub(crate) fn init_delay(mut self, delay: Duration) -> Self {
        self.init_delay = Some(delay);
        self
    }

    pub(crate) fn reject(mut self, method: &str, code: i64) -> Self {
        self.rejections.insert(method.to_string(), code);
        self
    }

    /// Drop the connection when `method` arrives.
    pub(crate) fn hang_up_on(mut self, method: &str) -> Self {
        self.hang_up.insert(method.to_string());
        self
    }

    /// Never answer `method`.
    pub(crate) fn ignore(mut self, method: &str) -> Self {
        self.ignored.insert(method.to_string());
        self
    }

    fn answer(&self, request: &JsonRpcRequest) -> Value {
        let params = request.params.clone().unwrap_or(Value::Null);
        match request.method.as_str() {
            "initialize" => {
                let mut capabilities = serde_json::Map::new();
                if !self.tools.is_empty() {
                    capabilities.insert("tools".into(), json!({}));
                }
                if self.prompts {
                    capabilities.insert("prompts".into(), json!({}));
                }
                json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": capabilities,
                    "serverInfo": {"name": "fake-server", "version": "0.0.1"}
                })
            }
            "tools/list" => {
                let start = params["cursor"]
                    .as_str()
                    .and_then(|c| c.parse::<usize>().ok())
                    .unwrap_or(0);
                let size = self.page_size.unwrap_or(usize::MAX);
                let end = start.saturating_add(size).min(self.tools.len());
                let mut page = json!({ "tools": &self.tools[start..end] });
                if self.stuck_cursor {
                    page["nextCursor"] = json!("again");
                } else if end < self.tools.len() {
                    page["nextCursor"] = json!(end.to_string());
                }
                page
            }
            "prompts/list" => json!({ "prompts": [] }),
            "tools/call" => {
                let name = params["name"].as_str().unwrap_or_default();
                if name == "fail" {
                    json!({"content": [{"type": "text", "text": "boom"}], "isError": true})
                } else {
                    let text = format!("{name}:{}", params["arguments"]);
                    json!({"content": [{"type": "text", "text": text}]})
                }
            }
            _ => json!({}),
        }
    }
}

/// Observations about traffic a fake server received.
#[derive(Debug, Default)]
pub(crate) struct FakeStats {
    requests: Mutex<Vec<String>>,
    pub(crate) close_calls: AtomicUsize,
}

impl FakeStats {
    pub(crate) fn requests_for(&self, method: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|m| *m == method)
            .count()
    }
}

struct FakeTransport {
    server: FakeServer,
    tx: Mutex<Option<mpsc::UnboundedSender<JsonRpcMessage>>>,
    stats: Arc<FakeStats>,
}

impl FakeTransport {
    fn reply(&self, response: JsonRpcResponse, delay: Option<Duration>) {
        let Some(tx) = self.tx.lock().unwrap().clone() else {
            return;
        };
        let message = JsonRpcMessage::Response(response);
        match delay {
            Some(delay) => {
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = tx.send(message);
                });
            }
            None => {
                let _ = tx.send(message);
            }
        }
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn send(&self, message: &JsonRpcMessage) -> Result<(), TransportError> {
        if self.tx.lock().unwrap().is_none() {
            return Err(TransportError::Closed);
        }
        let JsonRpcMessage::Request(request) = message else {
            return Ok(());
        };
        self.stats.requests.lock().unwrap().push(request.method.clone());

        let method = request.method.as_str();
        if self.server.hang_up.contains(method) {
            self.tx.lock().unwrap().take();
            return Ok(());
        }
        if self.server.ignored.contains(method) {
            return Ok(());
        }
        if let Some(code) = self.server.rejections.get(method) {
            self.reply(
                JsonRpcResponse::failure(request.id.clone(), *code, "rejected"),
                None,
            );
            return Ok(());
        }

        let delay = if method == "initialize" {
            self.server.init_delay
        } else {
            None
        };
        self.reply(
            JsonRpcResponse::success(request.id.clone(), self.server.answer(request)),
            delay,
        );
        Ok(())
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.stats.close_calls.fetch_add(1, Ordering::SeqCst);
        self.tx.lock().unwrap().take();
        Ok(())
    }
}

pub(crate) fn fake_transport(server: FakeServer) -> (TransportHandle, Arc<FakeStats>) {
    let (tx, incoming) = mpsc::unbounded_channel();
    let stats = Arc::new(FakeStats::default());
    let transport = FakeTransport {
        server,
        tx: Mutex::new(Some(tx)),
        stats: Arc::clone(&stats),
    };
    (
        TransportHandle {
            transport: Arc::new(transport),
            incoming,
        },
        stats,
    )
}

/// Factory that serves scripted servers by config id.
#[derive(Default)]
pub(crate) struct FakeFactory {
    servers: HashMap<String, FakeServer>,
    pub(crate) opens: AtomicUsize,
    stats: Mutex<HashMap<String, Vec<Arc<FakeStats>>>>,
}

impl FakeFactory {
    pub(crate) fn with(mut self, id: &str, server: FakeServer) -> Self {
        self.servers.insert(id.to_string(), server);
        self
    }

    /// Stats of the most recent transport opened for `id`.
    pub(crate) fn stats(&self, id: &str) -> Arc<FakeStats> {
        self.sessions(id).pop().unwrap()
    }

    /// Stats of every transport opened for `id`, oldest first.
    pub(crate) fn sessions(&self, id: &str) -> Vec<Arc<FakeStats>> {
        self.stats.lock().unwrap().get(id).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl TransportFactory for FakeFactory {
    async fn open(&self, config: &McpServerConfig) -> Result<TransportHandle, TransportError> {
        config.validate()?;
        self.opens.fetch_add(1, Ordering::SeqCst);
        let Some(server) = self.servers.get(&config.id) else {
            return Err(TransportError::Connect {
                url: config.target_description(),
                reason: "connection refused".to_string(),
            });
        };
        let (handle, stats) = fake_transport(server.clone());
        self.stats
            .lock()
            .unwrap()
            .entry(config.id.clone())
            .or_default()
            .push(stats);
        Ok(handle)
    }
}

/// A stdio config the fake factory accepts.
pub(crate) fn fake_config(id: &str, name: &str) -> McpServerConfig {
    McpServerConfig::stdio(id, name, "fake-mcp-server", vec![])
}

/// Emitter that keeps every event for assertions.
#[derive(Debug, Clone, Default)]
pub(crate) struct RecordingEmitter {
    events: Arc<Mutex<Vec<AppEvent>>>,
}

impl RecordingEmitter {
    pub(crate) fn names(&self) -> Vec<&'static str> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(AppEvent::event_name)
            .collect()
    }
}

impl AppEventEmitter for RecordingEmitter {
    fn emit(&self, event: AppEvent) {
        self.events.lock().unwrap().push(event);
    }

    fn clone_box(&self) -> Box<dyn AppEventEmitter> {
        Box::new(self.clone())
    }
}
