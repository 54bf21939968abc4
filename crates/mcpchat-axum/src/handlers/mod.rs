//! HTTP request handlers for the Axum web server.
//!
//! Each submodule covers one API area. Handlers are thin wrappers that
//! delegate to `McpService`, the connection registry or the agent loop.

pub mod chat;
pub mod events;
pub mod mcp;
pub mod servers;

use axum::Json;
use mcpchat_core::{ConnectionState, McpServiceError};

use crate::error::HttpError;
use crate::state::AppState;

/// A failed connection still answers 200 with the state the registry recorded.
async fn connection_outcome(
    state: &AppState,
    server_id: &str,
    result: Result<ConnectionState, McpServiceError>,
) -> Result<Json<ConnectionState>, HttpError> {
    match result {
        Ok(connected) => Ok(Json(connected)),
        Err(McpServiceError::Connection(message)) => {
            let recorded = state
                .mcp
                .manager()
                .get_connection_state(server_id)
                .await
                .unwrap_or_else(|| ConnectionState::failed(server_id, &message));
            Ok(Json(recorded))
        }
        Err(e) => Err(e.into()),
    }
}
