//! Domain types for mcpchat.
//!
//! Pure data with serde derives; no I/O happens here.

pub mod chat;
pub mod mcp;

pub use chat::{ChatMessage, ChatRole, Conversation, Turn, TurnPart, TurnRole};
pub use mcp::{
    Capabilities, ConfigError, ConnectionState, ConnectionStatus, McpPrompt, McpResource,
    McpServerConfig, McpTool, PromptArgument, PromptMessage, PromptResult, PromptRole,
    ResourceContent, ServerTool, ToolCall, ToolCallResult, ToolContent, ToolInputSchema,
    ToolOutput, TransportKind,
};
