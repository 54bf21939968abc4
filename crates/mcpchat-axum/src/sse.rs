//! SSE support.
//!
//! [`SseBroadcaster`] implements the core event emitter port so the MCP
//! registry can push lifecycle events to every connected web client.
//! [`agent_event`] renders one agent loop event for the chat stream.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::response::sse::{Event, KeepAlive, Sse};
use futures_util::stream::Stream;
use mcpchat_agent::AgentEvent;
use mcpchat_core::{AppEvent, AppEventEmitter};
use tokio::sync::broadcast;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;

const DEFAULT_CAPACITY: usize = 256;

/// Fan-out of lifecycle events to SSE subscribers.
///
/// Slow clients may miss events when the buffer overflows.
#[derive(Debug, Clone)]
pub struct SseBroadcaster {
    sender: broadcast::Sender<AppEvent>,
}

impl SseBroadcaster {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }

    /// SSE response for a new client, with a keep-alive ping every 30 seconds.
    pub fn subscribe(
        self: Arc<Self>,
    ) -> Sse<impl Stream<Item = Result<Event, Infallible>> + Send + 'static> {
        let receiver = self.sender.subscribe();
        let stream = BroadcastStream::new(receiver).filter_map(|result| match result {
            Ok(event) => match serde_json::to_string(&event) {
                Ok(json) => Some(Ok(Event::default().event(event.event_name()).data(json))),
                Err(e) => {
                    tracing::warn!("Failed to serialize event: {}", e);
                    None
                }
            },
            Err(e) => {
                // Lagged receivers skip ahead
                tracing::debug!("SSE stream error: {}", e);
                None
            }
        });

        Sse::new(stream).keep_alive(
            KeepAlive::new()
                .interval(Duration::from_secs(30))
                .text("ping"),
        )
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl AppEventEmitter for SseBroadcaster {
    fn emit(&self, event: AppEvent) {
        // No subscribers is fine
        let _ = self.sender.send(event);
    }

    fn clone_box(&self) -> Box<dyn AppEventEmitter> {
        Box::new(self.clone())
    }
}

/// Named SSE event for one agent loop step.
pub fn agent_event(event: &AgentEvent) -> Event {
    let event_name = event.event_name();
    match serde_json::to_string(event) {
        Ok(json) => Event::default().event(event_name).data(json),
        Err(e) => {
            tracing::warn!(event = event_name, error = %e, "Failed to serialize agent event");
            let message = serde_json::json!({ "message": e.to_string() });
            Event::default().event("error").data(message.to_string())
        }
    }
}
