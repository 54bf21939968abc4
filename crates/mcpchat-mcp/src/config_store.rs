//! Storage backends for the `McpConfigRepository` port.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use mcpchat_core::{McpConfigRepository, McpRepositoryError, McpServerConfig};
use tokio::fs;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

/// Configs kept as a pretty-printed JSON array on disk.
///
/// Writes go to a sibling temp file that is renamed over the target, so a
/// crash never leaves a half-written list behind. A missing file reads as
/// an empty list.
#[derive(Debug)]
pub struct JsonFileConfigRepository {
    path: PathBuf,
    // Serializes read-modify-write cycles
    write_lock: Mutex<()>,
}

impl JsonFileConfigRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Vec<McpServerConfig>, McpRepositoryError> {
        let text = match fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(internal(&self.path, "read", &e)),
        };
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&text).map_err(|e| internal(&self.path, "parse", &e))
    }

    async fn store(&self, configs: &[McpServerConfig]) -> Result<(), McpRepositoryError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| internal(parent, "create directory", &e))?;
        }

        let json = serde_json::to_string_pretty(configs)
            .map_err(|e| internal(&self.path, "serialize", &e))?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)
            .await
            .map_err(|e| internal(&tmp, "write", &e))?;
        fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| internal(&self.path, "replace", &e))?;

        debug!(path = %self.path.display(), count = configs.len(), "Saved MCP server configs");
        Ok(())
    }
}

fn internal(path: &Path, action: &str, error: &dyn std::fmt::Display) -> McpRepositoryError {
    McpRepositoryError::Internal(format!("Failed to {action} {}: {error}", path.display()))
}

#[async_trait]
impl McpConfigRepository for JsonFileConfigRepository {
    async fn list(&self) -> Result<Vec<McpServerConfig>, McpRepositoryError> {
        self.load().await
    }

    async fn get(&self, id: &str) -> Result<McpServerConfig, McpRepositoryError> {
        self.load()
            .await?
            .into_iter()
            .find(|c| c.id == id)
            .ok_or_else(|| McpRepositoryError::NotFound(id.to_string()))
    }

    async fn save(&self, config: McpServerConfig) -> Result<(), McpRepositoryError> {
        let _guard = self.write_lock.lock().await;
        let mut configs = self.load().await?;
        upsert(&mut configs, config);
        self.store(&configs).await
    }

    async fn delete(&self, id: &str) -> Result<(), McpRepositoryError> {
        let _guard = self.write_lock.lock().await;
        let mut configs = self.load().await?;
        let before = configs.len();
        configs.retain(|c| c.id != id);
        if configs.len() == before {
            return Err(McpRepositoryError::NotFound(id.to_string()));
        }
        self.store(&configs).await
    }

    async fn replace_all(&self, configs: Vec<McpServerConfig>) -> Result<(), McpRepositoryError> {
        let _guard = self.write_lock.lock().await;
        self.store(&configs).await
    }
}

/// Process-local storage, used when no config path is set and in tests.
#[derive(Debug, Default)]
pub struct InMemoryConfigRepository {
    configs: RwLock<Vec<McpServerConfig>>,
}

impl InMemoryConfigRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_configs(configs: Vec<McpServerConfig>) -> Self {
        Self {
            configs: RwLock::new(configs),
        }
    }
}

#[async_trait]
impl McpConfigRepository for InMemoryConfigRepository {
    async fn list(&self) -> Result<Vec<McpServerConfig>, McpRepositoryError> {
        Ok(self.configs.read().await.clone())
    }

    async fn get(&self, id: &str) -> Result<McpServerConfig, McpRepositoryError> {
        self.configs
            .read()
            .await
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .ok_or_else(|| McpRepositoryError::NotFound(id.to_string()))
    }

    async fn save(&self, config: McpServerConfig) -> Result<(), McpRepositoryError> {
        upsert(&mut *self.configs.write().await, config);
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), McpRepositoryError> {
        let mut configs = self.configs.write().await;
        let before = configs.len();
        configs.retain(|c| c.id != id);
        if configs.len() == before {
            return Err(McpRepositoryError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn replace_all(&self, configs: Vec<McpServerConfig>) -> Result<(), McpRepositoryError> {
        *self.configs.write().await = configs;
        Ok(())
    }
}

fn upsert(configs: &mut Vec<McpServerConfig>, config: McpServerConfig) {
    match configs.iter_mut().find(|c| c.id == config.id) {
        Some(existing) => *existing = config,
        None => configs.push(config),
    }
}
