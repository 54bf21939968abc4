//! Saved server config handlers.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use mcpchat_core::{ConnectionState, McpServerConfig};
use mcpchat_mcp::McpServerInfo;

use crate::error::HttpError;
use crate::state::AppState;

/// Saved servers with their live state.
pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<McpServerInfo>>, HttpError> {
    Ok(Json(state.mcp.list_servers_with_status().await?))
}

/// Create or update a saved server. An empty `id` gets a generated one.
pub async fn save(
    State(state): State<AppState>,
    body: Result<Json<McpServerConfig>, JsonRejection>,
) -> Result<Json<McpServerConfig>, HttpError> {
    let Json(config) = body?;
    Ok(Json(state.mcp.save_config(config).await?))
}

/// Disconnect and delete a saved server.
pub async fn remove(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, HttpError> {
    state.mcp.delete_config(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Connect a saved server by id; connection failures come back as state.
pub async fn connect(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ConnectionState>, HttpError> {
    let result = state.mcp.connect_saved(&id).await;
    super::connection_outcome(&state, &id, result).await
}

/// Download the saved configs as a JSON document.
pub async fn export(State(state): State<AppState>) -> Result<impl IntoResponse, HttpError> {
    let document = state.mcp.export_configs().await?;
    Ok((
        [
            (header::CONTENT_TYPE, "application/json"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"mcp-servers.json\"",
            ),
        ],
        document,
    ))
}

/// Replace the saved configs with an exported document.
pub async fn import(
    State(state): State<AppState>,
    body: String,
) -> Result<Json<Vec<McpServerConfig>>, HttpError> {
    Ok(Json(state.mcp.import_configs(&body).await?))
}
