//! High-level MCP service.
//!
//! Combines the saved-config repository with the live connection registry.
//! This is the API the HTTP adapter talks to.

use std::sync::Arc;

use mcpchat_core::{
    AppEventEmitter, ConnectionState, McpConfigRepository, McpServerConfig, McpServiceError,
    export_configs, generate_server_id, import_configs,
};
use serde::Serialize;
use tracing::{info, warn};

use crate::manager::McpManager;

/// A saved server together with its live state.
#[derive(Debug, Clone, Serialize)]
pub struct McpServerInfo {
    pub server: McpServerConfig,
    pub state: ConnectionState,
}

/// MCP service with injected storage and registry.
///
/// Lifecycle events come from the registry, which owns the event sink.
pub struct McpService {
    repository: Arc<dyn McpConfigRepository>,
    manager: Arc<McpManager>,
}

impl McpService {
    /// Service with a registry built on the default transports.
    pub fn new(
        repository: Arc<dyn McpConfigRepository>,
        emitter: Arc<dyn AppEventEmitter>,
    ) -> Self {
        let manager = Arc::new(McpManager::new(emitter));
        Self::with_manager(repository, manager)
    }

    pub const fn with_manager(
        repository: Arc<dyn McpConfigRepository>,
        manager: Arc<McpManager>,
    ) -> Self {
        Self {
            repository,
            manager,
        }
    }

    /// The live registry, shared with the agent loop.
    pub fn manager(&self) -> Arc<McpManager> {
        Arc::clone(&self.manager)
    }

    pub async fn list_configs(&self) -> Result<Vec<McpServerConfig>, McpServiceError> {
        Ok(self.repository.list().await?)
    }

    pub async fn get_config(&self, id: &str) -> Result<McpServerConfig, McpServiceError> {
        self.repository.get(id).await.map_err(|e| match e {
            mcpchat_core::McpRepositoryError::NotFound(id) => McpServiceError::NotFound(id),
            other => other.into(),
        })
    }

    /// Validate and store a config, assigning an id when it has none.
    pub async fn save_config(
        &self,
        mut config: McpServerConfig,
    ) -> Result<McpServerConfig, McpServiceError> {
        if config.id.trim().is_empty() {
            config.id = generate_server_id();
        }
        config.validate()?;
        self.repository.save(config.clone()).await?;
        info!(server_id = %config.id, server_name = %config.name, "Saved MCP server config");
        Ok(config)
    }

    /// Disconnect the server, drop its registry entry and delete the config.
    pub async fn delete_config(&self, id: &str) -> Result<(), McpServiceError> {
        self.manager.remove(id).await;
        self.repository.delete(id).await.map_err(|e| match e {
            mcpchat_core::McpRepositoryError::NotFound(id) => McpServiceError::NotFound(id),
            other => other.into(),
        })?;
        info!(server_id = %id, "Deleted MCP server config");
        Ok(())
    }

    /// Connect a saved server by id.
    pub async fn connect_saved(&self, id: &str) -> Result<ConnectionState, McpServiceError> {
        let config = self.get_config(id).await?;
        self.manager.connect(config).await
    }

    /// Saved configs as a JSON document.
    pub async fn export_configs(&self) -> Result<String, McpServiceError> {
        let configs = self.repository.list().await?;
        Ok(export_configs(&configs)?)
    }

    /// Replace the saved list with an imported document.
    ///
    /// Every entry is validated before anything is written.
    pub async fn import_configs(&self, json: &str) -> Result<Vec<McpServerConfig>, McpServiceError> {
        let configs = import_configs(json)?;
        for config in &configs {
            config.validate()?;
        }

        // Servers that disappear from the list should not stay connected
        let previous = self.repository.list().await?;
        for old in previous.iter().filter(|old| !configs.iter().any(|c| c.id == old.id)) {
            self.manager.remove(&old.id).await;
        }

        self.repository.replace_all(configs.clone()).await?;
        info!(count = configs.len(), "Imported MCP server configs");
        Ok(configs)
    }

    /// Saved servers with their live state (`disconnected` when never connected).
    pub async fn list_servers_with_status(&self) -> Result<Vec<McpServerInfo>, McpServiceError> {
        let configs = self.repository.list().await?;
        let mut servers = Vec::with_capacity(configs.len());
        for server in configs {
            let state = self
                .manager
                .get_connection_state(&server.id)
                .await
                .unwrap_or_else(|| ConnectionState::disconnected(&server.id));
            servers.push(McpServerInfo { server, state });
        }
        Ok(servers)
    }

    /// Close every connection. Called on process shutdown.
    pub async fn shutdown(&self) {
        self.manager.shutdown().await;
    }

    /// Connect every saved server, logging failures.
    pub async fn connect_all_saved(&self) {
        let configs = match self.repository.list().await {
            Ok(configs) => configs,
            Err(e) => {
                warn!(error = %e, "Failed to load MCP server configs");
                return;
            }
        };
        for config in configs {
            let name = config.display_name().to_string();
            if let Err(e) = self.manager.connect(config).await {
                warn!(server_name = %name, error = %e, "Failed to connect MCP server");
            }
        }
    }
}
