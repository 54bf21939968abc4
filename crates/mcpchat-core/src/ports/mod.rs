//! Port definitions (trait abstractions) for external systems.
//!
//! Ports define the interfaces the domain expects from infrastructure.
//! Concrete implementations live in adapter crates.

pub mod event_emitter;
pub mod llm;
pub mod mcp_error;
pub mod mcp_repository;
pub mod tool_executor;

pub use event_emitter::{AppEventEmitter, NoopEmitter};
pub use llm::{
    FunctionCallRequest, FunctionDeclaration, LlmError, LlmPort, LlmRequest, LlmResponse,
    TextStream,
};
pub use mcp_error::{McpErrorCategory, McpErrorInfo, McpServiceError};
pub use mcp_repository::{McpConfigRepository, McpRepositoryError};
pub use tool_executor::ToolExecutor;
