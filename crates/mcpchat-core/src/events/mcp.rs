//! MCP server lifecycle events.

use serde::{Deserialize, Serialize};

use super::AppEvent;
use crate::domain::McpServerConfig;
use crate::ports::McpErrorInfo;

/// Lightweight server description for event payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McpServerSummary {
    pub id: String,
    pub name: String,
    /// Transport wire name (`stdio`, `streamable-http`, `sse`).
    pub transport: String,
}

impl From<&McpServerConfig> for McpServerSummary {
    fn from(config: &McpServerConfig) -> Self {
        Self {
            id: config.id.clone(),
            name: config.display_name().to_string(),
            transport: config.transport.as_str().to_string(),
        }
    }
}

impl AppEvent {
    pub fn mcp_server_connecting(config: &McpServerConfig) -> Self {
        Self::McpServerConnecting {
            server: config.into(),
        }
    }

    pub fn mcp_server_connected(
        server_id: impl Into<String>,
        server_name: impl Into<String>,
        tool_count: usize,
    ) -> Self {
        Self::McpServerConnected {
            server_id: server_id.into(),
            server_name: server_name.into(),
            tool_count,
        }
    }

    pub fn mcp_server_disconnected(server_id: impl Into<String>) -> Self {
        Self::McpServerDisconnected {
            server_id: server_id.into(),
        }
    }

    pub fn mcp_server_removed(server_id: impl Into<String>) -> Self {
        Self::McpServerRemoved {
            server_id: server_id.into(),
        }
    }

    pub const fn mcp_server_error(error: McpErrorInfo) -> Self {
        Self::McpServerError { error }
    }
}
