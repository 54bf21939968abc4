//! Lifecycle events broadcast to UI clients.
//!
//! # Wire Format
//!
//! Events are serialized with a `type` tag:
//!
//! ```json
//! { "type": "mcp_server_connected", "serverId": "mcp-1", "serverName": "Files", "toolCount": 3 }
//! ```

mod mcp;

use serde::{Deserialize, Serialize};

use crate::ports::McpErrorInfo;

pub use mcp::McpServerSummary;

/// Canonical event union for every adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppEvent {
    /// A connection attempt has started.
    McpServerConnecting { server: McpServerSummary },

    /// Handshake and capability fetch finished.
    McpServerConnected {
        #[serde(rename = "serverId")]
        server_id: String,
        #[serde(rename = "serverName")]
        server_name: String,
        #[serde(rename = "toolCount")]
        tool_count: usize,
    },

    /// The server was disconnected (explicitly or on shutdown).
    McpServerDisconnected {
        #[serde(rename = "serverId")]
        server_id: String,
    },

    /// The server configuration was deleted.
    McpServerRemoved {
        #[serde(rename = "serverId")]
        server_id: String,
    },

    /// Connecting failed or a live session was lost.
    McpServerError { error: McpErrorInfo },
}

impl AppEvent {
    /// Get the event name for wire protocols.
    pub const fn event_name(&self) -> &'static str {
        match self {
            Self::McpServerConnecting { .. } => "mcp:connecting",
            Self::McpServerConnected { .. } => "mcp:connected",
            Self::McpServerDisconnected { .. } => "mcp:disconnected",
            Self::McpServerRemoved { .. } => "mcp:removed",
            Self::McpServerError { .. } => "mcp:error",
        }
    }
}
