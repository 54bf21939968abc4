//! MCP handlers - live connections and capability calls.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use mcpchat_core::{ConnectionState, PromptResult, ToolOutput};
use serde_json::Value;
use tracing::debug;

use crate::dto::mcp::require;
use crate::dto::{
    CallToolRequest, DisconnectRequest, DisconnectResponse, GetPromptRequest, PromptsResponse,
    ReadResourceRequest, ResourceContentsResponse, ResourcesResponse, ServerIdQuery,
    StatusResponse, ToolsResponse, parse_server_config,
};
use crate::error::HttpError;
use crate::state::AppState;

/// Connect to a server described in the body.
///
/// A failed connection is still a 200: the body is the recorded `error`
/// state. Only invalid configs are rejected.
pub async fn connect(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<ConnectionState>, HttpError> {
    let Json(body) = body?;
    let config = parse_server_config(body)?;
    let server_id = config.id.clone();

    let result = state.mcp.manager().connect(config).await;
    super::connection_outcome(&state, &server_id, result).await
}

/// Disconnect a server. Always succeeds for a well-formed request.
pub async fn disconnect(
    State(state): State<AppState>,
    body: Result<Json<DisconnectRequest>, JsonRejection>,
) -> Result<Json<DisconnectResponse>, HttpError> {
    let Json(request) = body?;
    let server_id = require(request.server_id, "Missing required field: serverId")?;
    state.mcp.manager().disconnect(&server_id).await;
    Ok(Json(DisconnectResponse {
        success: true,
        server_id,
    }))
}

/// One server's state, or every state plus the connected tools.
pub async fn status(
    State(state): State<AppState>,
    Query(query): Query<ServerIdQuery>,
) -> Result<Response, HttpError> {
    let manager = state.mcp.manager();
    if let Some(server_id) = query.server_id {
        let found = manager
            .get_connection_state(&server_id)
            .await
            .ok_or_else(|| HttpError::NotFound("Server not found".to_string()))?;
        return Ok(Json(found).into_response());
    }

    let states = manager.get_all_connection_states().await;
    let tools = manager.get_all_tools().await;
    Ok(Json(StatusResponse { states, tools }).into_response())
}

pub async fn list_tools(
    State(state): State<AppState>,
    Query(query): Query<ServerIdQuery>,
) -> Result<Json<ToolsResponse>, HttpError> {
    let server_id = query.require()?;
    let tools = state.mcp.manager().list_tools(&server_id).await?;
    Ok(Json(ToolsResponse { tools }))
}

/// Execute a tool. A tool-reported failure is a 200 with `isError: true`.
pub async fn call_tool(
    State(state): State<AppState>,
    body: Result<Json<CallToolRequest>, JsonRejection>,
) -> Result<Json<ToolOutput>, HttpError> {
    let Json(request) = body?;
    let missing = "Missing required fields: serverId, toolName";
    let server_id = require(request.server_id, missing)?;
    let tool_name = require(request.tool_name, missing)?;
    debug!(server_id = %server_id, tool = %tool_name, "Manual tool call");

    let output = state
        .mcp
        .manager()
        .call_tool(&server_id, &tool_name, request.arguments.unwrap_or_default())
        .await?;
    Ok(Json(output))
}

pub async fn list_prompts(
    State(state): State<AppState>,
    Query(query): Query<ServerIdQuery>,
) -> Result<Json<PromptsResponse>, HttpError> {
    let server_id = query.require()?;
    let prompts = state.mcp.manager().list_prompts(&server_id).await?;
    Ok(Json(PromptsResponse { prompts }))
}

pub async fn get_prompt(
    State(state): State<AppState>,
    body: Result<Json<GetPromptRequest>, JsonRejection>,
) -> Result<Json<PromptResult>, HttpError> {
    let Json(request) = body?;
    let missing = "Missing required fields: serverId, promptName";
    let server_id = require(request.server_id, missing)?;
    let prompt_name = require(request.prompt_name, missing)?;

    let result = state
        .mcp
        .manager()
        .get_prompt(&server_id, &prompt_name, request.arguments.unwrap_or_default())
        .await?;
    Ok(Json(result))
}

pub async fn list_resources(
    State(state): State<AppState>,
    Query(query): Query<ServerIdQuery>,
) -> Result<Json<ResourcesResponse>, HttpError> {
    let server_id = query.require()?;
    let resources = state.mcp.manager().list_resources(&server_id).await?;
    Ok(Json(ResourcesResponse { resources }))
}

pub async fn read_resource(
    State(state): State<AppState>,
    body: Result<Json<ReadResourceRequest>, JsonRejection>,
) -> Result<Json<ResourceContentsResponse>, HttpError> {
    let Json(request) = body?;
    let missing = "Missing required fields: serverId, uri";
    let server_id = require(request.server_id, missing)?;
    let uri = require(request.uri, missing)?;

    let contents = state.mcp.manager().read_resource(&server_id, &uri).await?;
    Ok(Json(ResourceContentsResponse { contents }))
}
