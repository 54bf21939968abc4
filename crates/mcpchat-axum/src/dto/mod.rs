//! Data Transfer Objects (DTOs) for the HTTP API contract.
//!
//! Field names follow the web client (`serverId`, `toolName`, `useMCPTools`),
//! decoupled from the domain types where the shapes differ.

pub mod chat;
pub mod mcp;

pub use chat::ChatRequest;
pub use mcp::{
    CallToolRequest, DisconnectRequest, DisconnectResponse, GetPromptRequest, PromptsResponse,
    ReadResourceRequest, ResourceContentsResponse, ResourcesResponse, ServerIdQuery,
    StatusResponse, ToolsResponse, parse_server_config,
};
