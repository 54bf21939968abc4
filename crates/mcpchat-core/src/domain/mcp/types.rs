//! MCP server domain types.
//!
//! These types are shared between the Rust backend and the web frontend,
//! so their JSON shape (camelCase, wire names for enums) is part of the API.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// How mcpchat reaches an MCP server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransportKind {
    /// Local process; protocol messages travel over stdin/stdout.
    #[default]
    #[serde(rename = "stdio")]
    Stdio,
    /// Streamable HTTP: one POST per message, JSON or SSE replies.
    #[serde(rename = "streamable-http")]
    StreamableHttp,
    /// Legacy HTTP+SSE: long-lived event stream plus a POST endpoint.
    #[serde(rename = "sse")]
    Sse,
}

impl TransportKind {
    /// Wire name used in JSON and log output.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stdio => "stdio",
            Self::StreamableHttp => "streamable-http",
            Self::Sse => "sse",
        }
    }

    /// Whether this transport talks HTTP and therefore needs a `url`.
    pub const fn is_http(self) -> bool {
        matches!(self, Self::StreamableHttp | Self::Sse)
    }
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TransportKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stdio" => Ok(Self::Stdio),
            "streamable-http" => Ok(Self::StreamableHttp),
            "sse" => Ok(Self::Sse),
            other => Err(ConfigError::UnknownTransport(other.to_string())),
        }
    }
}

/// Rejection reasons for a server configuration.
///
/// Every variant is a caller mistake; none of them are worth retrying.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),

    #[error("Unknown transport type: {0}")]
    UnknownTransport(String),

    #[error("STDIO transport requires a command")]
    MissingCommand,

    #[error("{0} transport requires a URL")]
    MissingUrl(TransportKind),

    #[error("Invalid server URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Invalid config format: {0}")]
    InvalidFormat(String),
}

/// User-declared descriptor of one external MCP server.
///
/// `command`/`args`/`env` apply to [`TransportKind::Stdio`]; `url` applies to
/// the two HTTP transports. [`McpServerConfig::validate`] must pass before
/// any connection attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McpServerConfig {
    pub id: String,
    pub name: String,
    pub transport: TransportKind,

    /// Executable to launch (resolved via `PATH` when not absolute).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<String>>,

    /// Overrides merged on top of the inherited process environment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<BTreeMap<String, String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl McpServerConfig {
    /// Create a stdio server config.
    pub fn stdio(
        id: impl Into<String>,
        name: impl Into<String>,
        command: impl Into<String>,
        args: Vec<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            transport: TransportKind::Stdio,
            command: Some(command.into()),
            args: Some(args),
            env: None,
            url: None,
        }
    }

    /// Create a config for one of the HTTP transports.
    pub fn http(
        id: impl Into<String>,
        name: impl Into<String>,
        transport: TransportKind,
        url: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            transport,
            command: None,
            args: None,
            env: None,
            url: Some(url.into()),
        }
    }

    /// Add an environment override.
    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value.into());
        self
    }

    /// Check that the fields required by the selected transport are present.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_identity()?;

        match self.transport {
            TransportKind::Stdio => {
                if self.command.as_deref().is_none_or(|c| c.trim().is_empty()) {
                    return Err(ConfigError::MissingCommand);
                }
            }
            TransportKind::StreamableHttp | TransportKind::Sse => {
                let Some(raw) = self.url.as_deref().filter(|u| !u.trim().is_empty()) else {
                    return Err(ConfigError::MissingUrl(self.transport));
                };
                let parsed = url::Url::parse(raw).map_err(|e| ConfigError::InvalidUrl {
                    url: raw.to_string(),
                    reason: e.to_string(),
                })?;
                if !matches!(parsed.scheme(), "http" | "https") {
                    return Err(ConfigError::InvalidUrl {
                        url: raw.to_string(),
                        reason: format!("unsupported scheme '{}'", parsed.scheme()),
                    });
                }
            }
        }

        Ok(())
    }

    /// Check only `id` and `name`, the fields every transport needs.
    pub fn validate_identity(&self) -> Result<(), ConfigError> {
        let mut missing = Vec::new();
        if self.id.trim().is_empty() {
            missing.push("id");
        }
        if self.name.trim().is_empty() {
            missing.push("name");
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::MissingFields(missing))
        }
    }

    /// Display name, falling back to the id when the name is blank.
    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            &self.id
        } else {
            &self.name
        }
    }

    /// Human-readable target used in diagnostics (`command args` or the URL).
    pub fn target_description(&self) -> String {
        match self.transport {
            TransportKind::Stdio => {
                let mut out = self.command.clone().unwrap_or_default();
                for arg in self.args.iter().flatten() {
                    out.push(' ');
                    out.push_str(arg);
                }
                out
            }
            TransportKind::StreamableHttp | TransportKind::Sse => {
                self.url.clone().unwrap_or_default()
            }
        }
    }
}

/// JSON-Schema-like description of a tool's arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInputSchema {
    #[serde(rename = "type", default = "default_schema_type")]
    pub schema_type: String,

    /// Property name to `{type, description, ...}`.
    #[serde(default)]
    pub properties: Map<String, Value>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,

    /// Remaining top-level keywords (`$defs`, `title`, ...), kept verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_schema_type() -> String {
    "object".to_string()
}

impl Default for ToolInputSchema {
    fn default() -> Self {
        Self {
            schema_type: default_schema_type(),
            properties: Map::new(),
            required: Vec::new(),
            extra: Map::new(),
        }
    }
}

/// Tool exposed by an MCP server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McpTool {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_schema: Option<ToolInputSchema>,
}

impl McpTool {
    /// Create a new tool definition.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            input_schema: None,
        }
    }

    /// Set the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the input schema.
    #[must_use]
    pub fn with_input_schema(mut self, schema: ToolInputSchema) -> Self {
        self.input_schema = Some(schema);
        self
    }
}

/// One declared argument of a prompt template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptArgument {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
}

/// Prompt template exposed by an MCP server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct McpPrompt {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Vec<PromptArgument>>,
}

/// Resource exposed by an MCP server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McpResource {
    pub uri: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

/// Snapshot of everything a server declared at connect time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Capabilities {
    pub tools: Vec<McpTool>,
    pub prompts: Vec<McpPrompt>,
    pub resources: Vec<McpResource>,
}

/// Connection lifecycle of one server id.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Error,
}

/// The registry's live record for a server id.
///
/// Only the constructors below build one, so a state that is not
/// `connected` never carries capabilities.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionState {
    pub server_id: String,
    pub status: ConnectionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub tools: Vec<McpTool>,
    pub prompts: Vec<McpPrompt>,
    pub resources: Vec<McpResource>,
}

impl ConnectionState {
    fn empty(server_id: impl Into<String>, status: ConnectionStatus) -> Self {
        Self {
            server_id: server_id.into(),
            status,
            error: None,
            tools: Vec::new(),
            prompts: Vec::new(),
            resources: Vec::new(),
        }
    }

    pub fn disconnected(server_id: impl Into<String>) -> Self {
        Self::empty(server_id, ConnectionStatus::Disconnected)
    }

    pub fn connecting(server_id: impl Into<String>) -> Self {
        Self::empty(server_id, ConnectionStatus::Connecting)
    }

    pub fn connected(server_id: impl Into<String>, capabilities: Capabilities) -> Self {
        Self {
            server_id: server_id.into(),
            status: ConnectionStatus::Connected,
            error: None,
            tools: capabilities.tools,
            prompts: capabilities.prompts,
            resources: capabilities.resources,
        }
    }

    pub fn failed(server_id: impl Into<String>, message: impl Into<String>) -> Self {
        let mut state = Self::empty(server_id, ConnectionStatus::Error);
        state.error = Some(message.into());
        state
    }

    pub fn is_connected(&self) -> bool {
        self.status == ConnectionStatus::Connected
    }
}

/// A tool together with the server that owns it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerTool {
    pub server_id: String,
    pub server_name: String,
    pub tool: McpTool,
}
