//! Configuration types for viewgate.
//!
//! Configuration is loaded from an optional YAML file (`viewgate.yaml`).
//! Every section has defaults, so an absent file yields a working
//! configuration for the built-in item views. Warehouse credentials are read
//! from the environment only.
//!
//! ```yaml
//! catalog:
//!   catalog: main
//!   schema: ai_data_assets
//!   join_key: item_id
//! query:
//!   default_limit: 200
//!   unparsed_expressions: reject
//! session:
//!   history_limit: 5
//! mcp:
//!   transport: http
//!   port: 8000
//! ```

pub mod catalog;
pub mod mcp;
pub mod query;
pub mod warehouse;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub use catalog::{CatalogConfig, ViewDescriptor};
pub use mcp::{McpConfig, Transport};
pub use query::{QueryConfig, SessionConfig, UnparsedPolicy};
pub use warehouse::{WarehouseConfig, WarehouseCredentials};

/// Complete viewgate configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ViewgateConfig {
    /// Warehouse connection settings.
    #[serde(default)]
    pub warehouse: WarehouseConfig,

    /// View allow-list and naming.
    #[serde(default)]
    pub catalog: CatalogConfig,

    /// Query guardrails.
    #[serde(default)]
    pub query: QueryConfig,

    /// Session context settings.
    #[serde(default)]
    pub session: SessionConfig,

    /// MCP server settings.
    #[serde(default)]
    pub mcp: McpConfig,
}

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("missing warehouse credentials in environment: {}", variables.join(", "))]
    MissingCredentials { variables: Vec<String> },

    #[error("configuration error: {0}")]
    Invalid(String),
}

impl ViewgateConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML content.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load the file if it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Check invariants serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.catalog.views.is_empty() {
            return Err(ConfigError::Invalid(
                "catalog.views must list at least one view".to_string(),
            ));
        }
        for name in self
            .catalog
            .views
            .iter()
            .map(|v| v.view.as_str())
            .chain([self.catalog.join_key.as_str()])
        {
            if !is_plain_identifier(name) {
                return Err(ConfigError::Invalid(format!(
                    "'{}' is not a plain SQL identifier",
                    name
                )));
            }
        }
        if self.session.history_limit == 0 {
            return Err(ConfigError::Invalid(
                "session.history_limit must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// ASCII letters, digits and underscores, not starting with a digit.
pub fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
