//! Persistence port for MCP server configurations.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::McpServerConfig;

/// Errors from configuration storage.
#[derive(Debug, Error)]
pub enum McpRepositoryError {
    #[error("MCP server config not found: {0}")]
    NotFound(String),

    #[error("MCP config storage error: {0}")]
    Internal(String),
}

/// Storage for the user's declared MCP servers.
///
/// Implementations must be safe to share across request handlers.
#[async_trait]
pub trait McpConfigRepository: Send + Sync {
    /// All stored configs, in insertion order.
    async fn list(&self) -> Result<Vec<McpServerConfig>, McpRepositoryError>;

    /// Look up one config.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when no config has this id.
    async fn get(&self, id: &str) -> Result<McpServerConfig, McpRepositoryError>;

    /// Insert or replace by id.
    async fn save(&self, config: McpServerConfig) -> Result<(), McpRepositoryError>;

    /// Delete by id.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when no config has this id.
    async fn delete(&self, id: &str) -> Result<(), McpRepositoryError>;

    /// Replace the whole list (used by import).
    async fn replace_all(&self, configs: Vec<McpServerConfig>) -> Result<(), McpRepositoryError>;
}
