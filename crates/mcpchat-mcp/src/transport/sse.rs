//! Legacy HTTP+SSE transport (MCP 2024-11-05).
//!
//! The client holds a GET event stream open. The server's first `endpoint`
//! event names the URL that outgoing messages are POSTed to; responses come
//! back as `message` events on the stream.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures_util::StreamExt;
use reqwest::Client;
use reqwest::header::ACCEPT;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use super::{Transport, TransportError, TransportHandle};
use crate::protocol::JsonRpcMessage;

const ENDPOINT_TIMEOUT: Duration = Duration::from_secs(30);

pub struct SseTransport {
    client: Client,
    endpoint: Url,
    cancel: CancellationToken,
    closed: AtomicBool,
}

impl SseTransport {
    /// Open the event stream and wait for the server to announce its endpoint.
    pub async fn connect(client: Client, url: Url) -> Result<TransportHandle, TransportError> {
        let connect_error = |reason: String| TransportError::Connect {
            url: url.to_string(),
            reason,
        };

        let response = client
            .get(url.clone())
            .header(ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(|e| connect_error(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(connect_error(format!("HTTP {status}")));
        }

        let mut events = Box::pin(response.bytes_stream().eventsource());

        let endpoint = tokio::time::timeout(ENDPOINT_TIMEOUT, async {
            while let Some(event) = events.next().await {
                match event {
                    Ok(event) if event.event == "endpoint" => return Ok(event.data),
                    Ok(event) => {
                        debug!(url = %url, event = %event.event, "Ignoring SSE event before endpoint");
                    }
                    Err(e) => return Err(connect_error(e.to_string())),
                }
            }
            Err(TransportError::Closed)
        })
        .await
        .map_err(|_| connect_error("server never sent an endpoint event".to_string()))??;

        let endpoint = url
            .join(endpoint.trim())
            .map_err(|e| connect_error(format!("invalid endpoint '{endpoint}': {e}")))?;
        info!(url = %url, endpoint = %endpoint, "MCP SSE stream open");

        let (tx, incoming) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let listener_cancel = cancel.clone();
        let stream_url = url.to_string();
        tokio::spawn(async move {
            let pump = async {
                while let Some(event) = events.next().await {
                    match event {
                        Ok(event) if event.event.is_empty() || event.event == "message" => {
                            match JsonRpcMessage::parse_frame(&event.data) {
                                Ok(messages) => {
                                    for message in messages {
                                        if tx.send(message).is_err() {
                                            return;
                                        }
                                    }
                                }
                                Err(e) => {
                                    debug!(url = %stream_url, error = %e, "Ignoring malformed SSE message");
                                }
                            }
                        }
                        Ok(event) => debug!(url = %stream_url, event = %event.event, "Ignoring SSE event"),
                        Err(e) => {
                            warn!(url = %stream_url, error = %e, "MCP SSE stream failed");
                            return;
                        }
                    }
                }
                debug!(url = %stream_url, "MCP SSE stream ended");
            };

            tokio::select! {
                () = listener_cancel.cancelled() => {}
                () = pump => {}
            }
        });

        let transport = Self {
            client,
            endpoint,
            cancel,
            closed: AtomicBool::new(false),
        };
        Ok(TransportHandle {
            transport: Arc::new(transport),
            incoming,
        })
    }
}

#[async_trait]
impl Transport for SseTransport {
    async fn send(&self, message: &JsonRpcMessage) -> Result<(), TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(message)
            .send()
            .await
            .map_err(|e| TransportError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(TransportError::Http(format!("{status}: {text}")));
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), TransportError> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.cancel.cancel();
        }
        Ok(())
    }
}
