//! MCP domain types.

mod content;
mod types;

pub use content::{
    PromptMessage, PromptResult, PromptRole, ResourceContent, ToolCall, ToolCallResult,
    ToolContent, ToolOutput,
};
pub use types::{
    Capabilities, ConfigError, ConnectionState, ConnectionStatus, McpPrompt, McpResource,
    McpServerConfig, McpTool, PromptArgument, ServerTool, ToolInputSchema, TransportKind,
};
