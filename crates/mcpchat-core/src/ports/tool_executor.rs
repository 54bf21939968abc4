//! Port through which the agent loop reaches connected MCP servers.

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::McpServiceError;
use crate::domain::{ServerTool, ToolOutput};

#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Tools of every currently connected server.
    async fn available_tools(&self) -> Vec<ServerTool>;

    /// Run one tool on the given server.
    async fn execute_tool(
        &self,
        server_id: &str,
        tool_name: &str,
        arguments: Map<String, Value>,
    ) -> Result<ToolOutput, McpServiceError>;
}
