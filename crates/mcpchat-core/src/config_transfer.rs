//! Settings export/import for MCP server configurations.
//!
//! The exported document is a pretty-printed JSON array of
//! [`McpServerConfig`]; importing it back yields the same list.

use serde_json::Value;

use crate::domain::{ConfigError, McpServerConfig};

const REQUIRED_IMPORT_FIELDS: [&str; 3] = ["id", "name", "transport"];

/// Serialize configs for export.
pub fn export_configs(configs: &[McpServerConfig]) -> Result<String, ConfigError> {
    serde_json::to_string_pretty(configs).map_err(|e| ConfigError::InvalidFormat(e.to_string()))
}

/// Parse an exported document.
///
/// The whole import is rejected when the document is not an array or any
/// entry lacks `id`, `name` or `transport`.
pub fn import_configs(json: &str) -> Result<Vec<McpServerConfig>, ConfigError> {
    let document: Value =
        serde_json::from_str(json).map_err(|e| ConfigError::InvalidFormat(e.to_string()))?;

    let Value::Array(entries) = document else {
        return Err(ConfigError::InvalidFormat(
            "expected a JSON array of server configs".to_string(),
        ));
    };

    entries
        .into_iter()
        .enumerate()
        .map(|(index, entry)| {
            let missing: Vec<&str> = REQUIRED_IMPORT_FIELDS
                .iter()
                .copied()
                .filter(|field| entry.get(field).is_none_or(Value::is_null))
                .collect();
            if !missing.is_empty() {
                return Err(ConfigError::InvalidFormat(format!(
                    "entry {index} is missing {}",
                    missing.join(", ")
                )));
            }
            serde_json::from_value(entry)
                .map_err(|e| ConfigError::InvalidFormat(format!("entry {index}: {e}")))
        })
        .collect()
}

/// Generate a fresh server id: `mcp-{unix millis}-{7 random chars}`.
pub fn generate_server_id() -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    let suffix: String = uuid::Uuid::new_v4().simple().to_string().chars().take(7).collect();
    format!("mcp-{millis}-{suffix}")
}
