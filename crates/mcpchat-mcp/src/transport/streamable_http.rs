//! Streamable HTTP transport (MCP 2025-03-26).
//!
//! Every outgoing message is its own POST. The server replies with a JSON
//! body, an SSE stream of messages, or `202 Accepted` for notifications.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures_util::StreamExt;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap};
use reqwest::{Client, Response, StatusCode};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

use super::{Transport, TransportError, TransportHandle};
use crate::protocol::JsonRpcMessage;

pub(crate) const SESSION_ID_HEADER: &str = "mcp-session-id";
const ACCEPT_BOTH: &str = "application/json, text/event-stream";
const DELETE_TIMEOUT: Duration = Duration::from_secs(5);

pub struct StreamableHttpTransport {
    client: Client,
    url: Url,
    session_id: RwLock<Option<String>>,
    incoming: mpsc::UnboundedSender<JsonRpcMessage>,
    cancel: CancellationToken,
    closed: AtomicBool,
}

impl StreamableHttpTransport {
    /// Prepare a transport for `url`. No I/O happens until the first send.
    pub fn open(client: Client, url: Url) -> Result<TransportHandle, TransportError> {
        let (tx, incoming) = mpsc::unbounded_channel();
        let transport = Self {
            client,
            url,
            session_id: RwLock::new(None),
            incoming: tx,
            cancel: CancellationToken::new(),
            closed: AtomicBool::new(false),
        };
        Ok(TransportHandle {
            transport: Arc::new(transport),
            incoming,
        })
    }

    fn session_id(&self) -> Option<String> {
        self.session_id
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn remember_session(&self, headers: &HeaderMap) {
        if let Some(id) = headers.get(SESSION_ID_HEADER).and_then(|v| v.to_str().ok()) {
            let mut slot = self.session_id.write().unwrap_or_else(PoisonError::into_inner);
            if slot.as_deref() != Some(id) {
                debug!(url = %self.url, session_id = %id, "MCP HTTP session established");
                *slot = Some(id.to_string());
            }
        }
    }

    fn connect_error(&self, err: &reqwest::Error) -> TransportError {
        if err.is_connect() || err.is_timeout() {
            TransportError::Connect {
                url: self.url.to_string(),
                reason: err.to_string(),
            }
        } else {
            TransportError::Http(err.to_string())
        }
    }

    fn forward(&self, messages: Vec<JsonRpcMessage>) {
        for message in messages {
            if self.incoming.send(message).is_err() {
                return;
            }
        }
    }

    async fn handle_response(&self, response: Response) -> Result<(), TransportError> {
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();

        if is_event_stream(&content_type) {
            let tx = self.incoming.clone();
            let cancel = self.cancel.clone();
            let url = self.url.to_string();
            tokio::spawn(async move {
                tokio::select! {
                    () = cancel.cancelled() => {}
                    () = pump_event_stream(response, tx, &url) => {}
                }
            });
            return Ok(());
        }

        let body = response
            .text()
            .await
            .map_err(|e| TransportError::Http(e.to_string()))?;
        if body.trim().is_empty() {
            return Ok(());
        }
        match JsonRpcMessage::parse_frame(&body) {
            Ok(messages) => {
                self.forward(messages);
                Ok(())
            }
            Err(e) => Err(TransportError::Http(format!(
                "invalid JSON-RPC body ({e}): {body}"
            ))),
        }
    }
}

fn is_event_stream(content_type: &str) -> bool {
    content_type.starts_with("text/event-stream")
}

async fn pump_event_stream(
    response: Response,
    tx: mpsc::UnboundedSender<JsonRpcMessage>,
    url: &str,
) {
    let mut events = Box::pin(response.bytes_stream().eventsource());
    while let Some(event) = events.next().await {
        match event {
            Ok(event) if event.data.trim().is_empty() => {}
            Ok(event) => match JsonRpcMessage::parse_frame(&event.data) {
                Ok(messages) => {
                    for message in messages {
                        if tx.send(message).is_err() {
                            return;
                        }
                    }
                }
                Err(e) => debug!(url = %url, error = %e, "Ignoring non JSON-RPC SSE event"),
            },
            Err(e) => {
                warn!(url = %url, error = %e, "MCP response stream failed");
                return;
            }
        }
    }
}

#[async_trait]
impl Transport for StreamableHttpTransport {
    async fn send(&self, message: &JsonRpcMessage) -> Result<(), TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }

        let mut request = self
            .client
            .post(self.url.clone())
            .header(ACCEPT, ACCEPT_BOTH)
            .json(message);
        if let Some(session_id) = self.session_id() {
            request = request.header(SESSION_ID_HEADER, session_id);
        }

        let response = request.send().await.map_err(|e| self.connect_error(&e))?;
        self.remember_session(response.headers());

        let status = response.status();
        if status == StatusCode::ACCEPTED {
            return Ok(());
        }
        if status == StatusCode::NOT_FOUND && self.session_id().is_some() {
            // Server dropped our session
            return Err(TransportError::Closed);
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(TransportError::Http(format!("{status}: {text}")));
        }

        self.handle_response(response).await
    }

    async fn close(&self) -> Result<(), TransportError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.cancel.cancel();

        if let Some(session_id) = self.session_id() {
            let result = self
                .client
                .delete(self.url.clone())
                .header(SESSION_ID_HEADER, session_id)
                .timeout(DELETE_TIMEOUT)
                .send()
                .await;
            // Servers may answer 405 when they do not support explicit termination
            if let Err(e) = result {
                debug!(url = %self.url, error = %e, "MCP session DELETE failed");
            }
        }
        Ok(())
    }
}
