//! MCP service error types.

use thiserror::Error;

use super::McpRepositoryError;
use crate::domain::ConfigError;

/// Domain-specific errors for MCP service operations.
///
/// Transport and JSON-RPC details are flattened into messages here so that
/// adapters never depend on the MCP infrastructure crate.
#[derive(Debug, Error)]
pub enum McpServiceError {
    /// Configuration validation error.
    #[error("Invalid MCP configuration: {0}")]
    InvalidConfig(#[from] ConfigError),

    /// Transport open or handshake failed.
    #[error("{0}")]
    Connection(String),

    /// No live session for the server id.
    #[error("Server {0} is not connected")]
    NotConnected(String),

    /// Unknown server id.
    #[error("MCP server not found: {0}")]
    NotFound(String),

    /// Protocol error (JSON-RPC communication failure).
    #[error("MCP protocol error: {0}")]
    Protocol(String),

    /// The server answered a tool/prompt/resource request with an error.
    #[error("MCP tool error: {0}")]
    ToolError(String),

    /// Repository operation failed.
    #[error(transparent)]
    Repository(#[from] McpRepositoryError),

    /// Internal service error.
    #[error("Internal MCP error: {0}")]
    Internal(String),
}

/// User-safe error information for MCP events.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McpErrorInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_id: Option<String>,
    pub server_name: String,
    pub message: String,
    pub category: McpErrorCategory,
}

/// Categories of MCP errors for UI handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum McpErrorCategory {
    Connection,
    Protocol,
    Tool,
    Configuration,
    Unknown,
}

impl McpErrorInfo {
    /// Create error info from a service error.
    pub fn from_error(
        server_id: Option<String>,
        server_name: impl Into<String>,
        error: &McpServiceError,
    ) -> Self {
        Self {
            server_id,
            server_name: server_name.into(),
            message: error.to_string(),
            category: error.into(),
        }
    }

    /// Create error info for a connection failure.
    pub fn connection(
        server_id: impl Into<String>,
        server_name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            server_id: Some(server_id.into()),
            server_name: server_name.into(),
            message: message.into(),
            category: McpErrorCategory::Connection,
        }
    }
}

impl From<&McpServiceError> for McpErrorCategory {
    fn from(error: &McpServiceError) -> Self {
        match error {
            McpServiceError::Repository(_)
            | McpServiceError::Internal(_)
            | McpServiceError::NotFound(_) => Self::Unknown,
            McpServiceError::Connection(_) | McpServiceError::NotConnected(_) => Self::Connection,
            McpServiceError::Protocol(_) => Self::Protocol,
            McpServiceError::ToolError(_) => Self::Tool,
            McpServiceError::InvalidConfig(_) => Self::Configuration,
        }
    }
}
