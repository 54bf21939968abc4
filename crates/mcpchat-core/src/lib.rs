#![doc = include_str!("../README.md")]
#![deny(unused_crate_dependencies)]

pub mod config_transfer;
pub mod domain;
pub mod events;
pub mod ports;

// Re-export commonly used types for convenience
pub use config_transfer::{export_configs, generate_server_id, import_configs};
pub use domain::{
    Capabilities, ChatMessage, ChatRole, ConfigError, ConnectionState, ConnectionStatus,
    Conversation, McpPrompt, McpResource, McpServerConfig, McpTool, PromptArgument,
    PromptMessage, PromptResult, PromptRole, ResourceContent, ServerTool, ToolCall,
    ToolCallResult, ToolContent, ToolInputSchema, ToolOutput, TransportKind, Turn, TurnPart,
    TurnRole,
};
pub use events::{AppEvent, McpServerSummary};
pub use ports::{
    AppEventEmitter, FunctionCallRequest, FunctionDeclaration, LlmError, LlmPort, LlmRequest,
    LlmResponse, McpConfigRepository, McpErrorCategory, McpErrorInfo, McpRepositoryError,
    McpServiceError, NoopEmitter, TextStream, ToolExecutor,
};
