//! Query guardrail configuration.

use serde::{Deserialize, Serialize};

/// How expressions that cannot be parsed are treated during validation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UnparsedPolicy {
    /// Unparseable expressions are rejected before any SQL is assembled.
    #[default]
    Reject,
    /// Legacy behaviour: an unparseable expression has no checkable
    /// references and passes validation as raw text.
    Permit,
}

/// Limits and validation policy applied to generated queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Row limit used by the query tools when the caller gives none.
    #[serde(default = "default_limit")]
    pub default_limit: u32,

    /// Row limit for metadata listings.
    #[serde(default = "default_limit")]
    pub metadata_limit: u32,

    /// Hard ceiling on any requested row limit.
    #[serde(default = "default_max_rows")]
    pub max_rows: u32,

    /// Treatment of expressions the SQL parser cannot handle.
    #[serde(default)]
    pub unparsed_expressions: UnparsedPolicy,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            metadata_limit: default_limit(),
            max_rows: default_max_rows(),
            unparsed_expressions: UnparsedPolicy::default(),
        }
    }
}

impl QueryConfig {
    /// Clamp a requested limit to `[1, max_rows]`, applying the default when absent.
    pub fn effective_limit(&self, requested: Option<u32>) -> u32 {
        requested
            .unwrap_or(self.default_limit)
            .clamp(1, self.max_rows.max(1))
    }
}

/// Session context settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Number of queries and joins remembered per session.
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    /// Session identifier used when the transport supplies none.
    #[serde(default = "default_session_id")]
    pub default_session_id: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            history_limit: default_history_limit(),
            default_session_id: default_session_id(),
        }
    }
}

fn default_limit() -> u32 {
    200
}

fn default_max_rows() -> u32 {
    1000
}

fn default_history_limit() -> usize {
    5
}

fn default_session_id() -> String {
    "default".to_string()
}
