//! Warehouse connection configuration.
//!
//! Credentials are never stored in the config file. The file only names the
//! environment variables that hold them, and [`WarehouseConfig::credentials`]
//! resolves those at startup.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::ConfigError;

/// Configuration for the SQL warehouse connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarehouseConfig {
    /// Environment variable holding the workspace host name.
    #[serde(default = "default_host_env")]
    pub host_env: String,

    /// Environment variable holding the warehouse HTTP path.
    #[serde(default = "default_http_path_env")]
    pub http_path_env: String,

    /// Environment variable holding the access token.
    #[serde(default = "default_token_env")]
    pub token_env: String,

    /// Seconds the warehouse may block before a statement is cancelled.
    #[serde(default = "default_wait_timeout_secs")]
    pub wait_timeout_secs: u32,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            host_env: default_host_env(),
            http_path_env: default_http_path_env(),
            token_env: default_token_env(),
            wait_timeout_secs: default_wait_timeout_secs(),
        }
    }
}

/// Resolved warehouse credentials.
#[derive(Clone)]
pub struct WarehouseCredentials {
    /// Workspace host, e.g. `dbc-1234.cloud.databricks.com`.
    pub host: String,
    /// Warehouse HTTP path, e.g. `/sql/1.0/warehouses/abc123`.
    pub http_path: String,
    /// Personal access token.
    pub token: String,
}

impl fmt::Debug for WarehouseCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WarehouseCredentials")
            .field("host", &self.host)
            .field("http_path", &self.http_path)
            .field("token", &"<redacted>")
            .finish()
    }
}

impl WarehouseConfig {
    /// Resolve credentials from the process environment.
    pub fn credentials(&self) -> Result<WarehouseCredentials, ConfigError> {
        self.credentials_from(|name| std::env::var(name).ok())
    }

    /// Resolve credentials through an arbitrary variable lookup.
    ///
    /// Every missing (or blank) variable is reported at once so the operator
    /// can fix the environment in a single pass.
    pub fn credentials_from<F>(&self, lookup: F) -> Result<WarehouseCredentials, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut missing = Vec::new();
        let mut fetch = |name: &str| -> String {
            match lookup(name).filter(|v| !v.trim().is_empty()) {
                Some(value) => value.trim().to_string(),
                None => {
                    missing.push(name.to_string());
                    String::new()
                }
            }
        };

        let host = fetch(&self.host_env);
        let http_path = fetch(&self.http_path_env);
        let token = fetch(&self.token_env);

        if !missing.is_empty() {
            return Err(ConfigError::MissingCredentials { variables: missing });
        }

        Ok(WarehouseCredentials {
            host,
            http_path,
            token,
        })
    }
}

fn default_host_env() -> String {
    "DATABRICKS_HOST".to_string()
}

fn default_http_path_env() -> String {
    "DATABRICKS_HTTP_PATH".to_string()
}

fn default_token_env() -> String {
    "DATABRICKS_TOKEN".to_string()
}

fn default_wait_timeout_secs() -> u32 {
    30
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_credentials_resolved() {
        let vars = env(&[
            ("DATABRICKS_HOST", "dbc.example.com"),
            ("DATABRICKS_HTTP_PATH", "/sql/1.0/warehouses/abc"),
            ("DATABRICKS_TOKEN", "dapi-secret"),
        ]);
        let creds = WarehouseConfig::default()
            .credentials_from(|k| vars.get(k).cloned())
            .unwrap();

        assert_eq!(creds.host, "dbc.example.com");
        assert_eq!(creds.http_path, "/sql/1.0/warehouses/abc");
        assert!(!format!("{:?}", creds).contains("dapi-secret"));
    }

    #[test]
    fn test_missing_credentials_reports_all() {
        let vars = env(&[("DATABRICKS_HOST", "dbc.example.com"), ("DATABRICKS_TOKEN", "  ")]);
        let err = WarehouseConfig::default()
            .credentials_from(|k| vars.get(k).cloned())
            .unwrap_err();

        match err {
            ConfigError::MissingCredentials { variables } => {
                assert_eq!(variables, vec!["DATABRICKS_HTTP_PATH", "DATABRICKS_TOKEN"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
