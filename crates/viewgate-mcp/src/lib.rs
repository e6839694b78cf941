//! # viewgate-mcp
//!
//! MCP (Model Context Protocol) server that lets an AI assistant explore and
//! query allow-listed warehouse views.
//!
//! - **Fixed tool surface**: seven read-only tools registered at startup
//! - **Guardrails**: every view, column and expression is validated before a
//!   statement is sent to the warehouse
//! - **Session context**: recent queries, filters and joins per session
//! - **Multiple Transports**: stdio and HTTP
//!
//! ## Architecture
//!
//! ```text
//! AI assistant
//!       │
//!       │ MCP protocol (list tools / call tool)
//!       ▼
//! ┌──────────────────────┐
//! │  viewgate MCP server │
//! │  1. Decode arguments │
//! │  2. Resolve columns  │  ← SchemaRegistry + session cache
//! │  3. Validate + build │  ← viewgate-sql
//! │  4. Execute          │  ← StatementExecutor
//! │  5. Record session   │  ← SessionStore
//! └──────────┬───────────┘
//!            │
//!            ▼
//!    Databricks SQL warehouse
//! ```
//!
//! ## Example Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use viewgate_core::{ViewCatalog, ViewgateConfig};
//! use viewgate_mcp::{McpServer, SessionStore, ToolExecutor};
//! use viewgate_warehouse::DatabricksExecutor;
//!
//! let config = ViewgateConfig::load_or_default("viewgate.yaml")?;
//! let credentials = config.warehouse.credentials()?;
//! let warehouse = Arc::new(DatabricksExecutor::new(&credentials, config.warehouse.wait_timeout_secs)?);
//!
//! let executor = ToolExecutor::new(
//!     Arc::new(ViewCatalog::new(&config.catalog)),
//!     warehouse,
//!     Arc::new(SessionStore::new(config.session.history_limit)),
//!     config.query.clone(),
//! );
//! McpServer::new(config.mcp.clone(), Arc::new(executor)).run().await?;
//! ```

pub mod context;
pub mod error;
pub mod executor;
pub mod http_transport;
pub mod protocol;
pub mod server;
pub mod surface;
pub mod tools;

// Re-export main types
pub use context::{QueryLogEntry, RelevantContext, SessionContext, SessionStore};
pub use error::McpError;
pub use executor::{ExecutionResult, ToolExecutor};
pub use protocol::{
    CallToolParams, CallToolResponse, JsonRpcRequest, JsonRpcResponse, RequestContext,
    ToolAnnotations, ToolContent, ToolDefinition,
};
pub use server::McpServer;
pub use tools::{ParamSpec, ParamType, ToolRegistry, ToolSpec};
