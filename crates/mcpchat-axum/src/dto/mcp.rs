//! MCP endpoint DTOs.

use mcpchat_core::{
    ConfigError, ConnectionState, McpPrompt, McpResource, McpServerConfig, McpTool,
    ResourceContent, ServerTool, TransportKind,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::HttpError;

/// `?serverId=` on the capability and status GETs.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerIdQuery {
    #[serde(default)]
    pub server_id: Option<String>,
}

impl ServerIdQuery {
    /// The id, or 400 when it is absent or blank.
    pub fn require(self) -> Result<String, HttpError> {
        require(self.server_id, "Missing required query param: serverId")
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisconnectRequest {
    #[serde(default)]
    pub server_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisconnectResponse {
    pub success: bool,
    pub server_id: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallToolRequest {
    #[serde(default)]
    pub server_id: Option<String>,
    #[serde(default)]
    pub tool_name: Option<String>,
    #[serde(default)]
    pub arguments: Option<Map<String, Value>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetPromptRequest {
    #[serde(default)]
    pub server_id: Option<String>,
    #[serde(default)]
    pub prompt_name: Option<String>,
    #[serde(default)]
    pub arguments: Option<Map<String, Value>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadResourceRequest {
    #[serde(default)]
    pub server_id: Option<String>,
    #[serde(default)]
    pub uri: Option<String>,
}

/// Every known state plus the flattened tools of connected servers.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub states: Vec<ConnectionState>,
    pub tools: Vec<ServerTool>,
}

#[derive(Debug, Serialize)]
pub struct ToolsResponse {
    pub tools: Vec<McpTool>,
}

#[derive(Debug, Serialize)]
pub struct PromptsResponse {
    pub prompts: Vec<McpPrompt>,
}

#[derive(Debug, Serialize)]
pub struct ResourcesResponse {
    pub resources: Vec<McpResource>,
}

#[derive(Debug, Serialize)]
pub struct ResourceContentsResponse {
    pub contents: Vec<ResourceContent>,
}

/// Required, non-blank string field.
pub fn require(value: Option<String>, message: &str) -> Result<String, HttpError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| HttpError::BadRequest(message.to_string()))
}

/// Parse and validate a server config posted by the client.
///
/// Missing identity fields and transport-specific fields are reported
/// before any serde error so the message names the field.
pub fn parse_server_config(body: Value) -> Result<McpServerConfig, ConfigError> {
    let field = |name: &str| {
        body.get(name)
            .and_then(Value::as_str)
            .is_some_and(|v| !v.trim().is_empty())
    };
    let missing: Vec<&'static str> = ["id", "name", "transport"]
        .into_iter()
        .filter(|name| !field(*name))
        .collect();
    if !missing.is_empty() {
        return Err(ConfigError::MissingFields(missing));
    }

    if let Some(transport) = body.get("transport").and_then(Value::as_str) {
        transport.parse::<TransportKind>()?;
    }

    let config: McpServerConfig =
        serde_json::from_value(body).map_err(|e| ConfigError::InvalidFormat(e.to_string()))?;
    config.validate()?;
    Ok(config)
}
