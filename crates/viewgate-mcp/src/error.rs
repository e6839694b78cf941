//! Error types for the MCP crate.

use thiserror::Error;

/// Errors that can occur in the MCP server.
///
/// Domain failures (bad view names, invalid columns, warehouse errors) are
/// not represented here; they are returned to the client as tool results
/// flagged `isError`.
#[derive(Debug, Error)]
pub enum McpError {
    /// Failed to start the server.
    #[error("failed to start MCP server: {0}")]
    StartupFailed(String),

    /// Tool not found.
    #[error("tool not found: {name}")]
    ToolNotFound { name: String },

    /// Invalid arguments for tool.
    #[error("invalid arguments for tool {tool}: {reason}")]
    InvalidArguments { tool: String, reason: String },

    /// Serialization error.
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl McpError {
    /// JSON-RPC error code for this error.
    pub fn code(&self) -> i32 {
        match self {
            McpError::ToolNotFound { .. } | McpError::InvalidArguments { .. } => -32602,
            McpError::SerializationError(_) => -32700,
            _ => -32603,
        }
    }
}
