//! CLI command implementations for the viewgate MCP server.

pub mod check;
pub mod serve;
pub mod tools;

use anyhow::{Context, Result};
use std::path::Path;
use tracing::warn;
use viewgate_core::ViewgateConfig;

/// Default configuration file, relative to the working directory.
pub const DEFAULT_CONFIG: &str = "viewgate.yaml";

/// Load the configuration file, falling back to defaults when it is absent.
pub fn load_config(path: &Path) -> Result<ViewgateConfig> {
    if !path.exists() {
        warn!(config = %path.display(), "Config file not found, using defaults");
    }
    ViewgateConfig::load_or_default(path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))
}
