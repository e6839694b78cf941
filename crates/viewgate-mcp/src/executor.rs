//! Tool execution engine.
//!
//! This module maps tool calls onto the schema registry, the query builder
//! and the warehouse:
//! - Argument decoding
//! - Allow-list and column validation before any statement runs
//! - Per-session column caching and query history
//! - Result formatting

use crate::context::{QueryLogEntry, SessionStore};
use crate::error::McpError;
use crate::protocol::{RequestContext, ToolContent};
use crate::surface::{
    self, FetchRecentQueryContextArgs, GetTableViewsMetadataArgs, ListTableRelationshipsArgs,
    QueryJoinedViewsArgs, QuerySingleViewArgs,
};
use crate::tools::ToolRegistry;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, info, warn};
use viewgate_core::{QueryConfig, ViewCatalog};
use viewgate_sql::{BuiltQuery, JoinedViewRequest, QueryBuilder, SingleViewRequest, SqlError};
use viewgate_warehouse::{SchemaRegistry, Statement, StatementExecutor, WarehouseError};

/// Result of a tool execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Whether the execution was successful.
    pub success: bool,
    /// The result content.
    pub content: Vec<ToolContent>,
    /// Error message if failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutionResult {
    /// Create a successful result with JSON content.
    pub fn success_json(value: Value) -> Self {
        Self {
            success: true,
            content: vec![ToolContent::Json { json: value }],
            error: None,
        }
    }

    /// Create a successful result with text content.
    pub fn success_text(text: impl Into<String>) -> Self {
        Self {
            success: true,
            content: vec![ToolContent::Text { text: text.into() }],
            error: None,
        }
    }

    /// Create an error result.
    pub fn error(message: impl Into<String>) -> Self {
        let msg = message.into();
        Self {
            success: false,
            content: vec![ToolContent::Text { text: msg.clone() }],
            error: Some(msg),
        }
    }

    /// The first text block, if any.
    pub fn text(&self) -> Option<&str> {
        self.content.iter().find_map(|c| match c {
            ToolContent::Text { text } => Some(text.as_str()),
            ToolContent::Json { .. } => None,
        })
    }

    /// The first JSON block, if any.
    pub fn json(&self) -> Option<&Value> {
        self.content.iter().find_map(|c| match c {
            ToolContent::Json { json } => Some(json),
            ToolContent::Text { .. } => None,
        })
    }
}

/// A domain failure reported to the assistant as an error result.
#[derive(Debug)]
enum ToolFailure {
    Request(SqlError),
    SchemaFetch(WarehouseError),
    Execution { target: String, source: WarehouseError },
}

impl ToolFailure {
    fn category(&self) -> &'static str {
        match self {
            ToolFailure::Request(e) => e.category(),
            ToolFailure::SchemaFetch(_) => "SchemaFetchError",
            ToolFailure::Execution { .. } => "ExecutionError",
        }
    }

    fn message(&self) -> String {
        let detail = match self {
            ToolFailure::Request(e) => e.to_string(),
            ToolFailure::SchemaFetch(e) => e.to_string(),
            ToolFailure::Execution { target, source } => format!("Error querying {target}: {source}"),
        };
        format!("{}: {}", self.category(), detail)
    }
}

impl From<SqlError> for ToolFailure {
    fn from(error: SqlError) -> Self {
        ToolFailure::Request(error)
    }
}

impl From<ToolFailure> for ExecutionResult {
    fn from(failure: ToolFailure) -> Self {
        ExecutionResult::error(failure.message())
    }
}

/// Executes tool calls against allow-listed views.
pub struct ToolExecutor {
    schema: Arc<SchemaRegistry>,
    warehouse: Arc<dyn StatementExecutor>,
    sessions: Arc<SessionStore>,
    builder: QueryBuilder,
    query: QueryConfig,
    tools: ToolRegistry,
}

impl ToolExecutor {
    /// Create an executor and register the tool surface.
    pub fn new(
        catalog: Arc<ViewCatalog>,
        warehouse: Arc<dyn StatementExecutor>,
        sessions: Arc<SessionStore>,
        query: QueryConfig,
    ) -> Self {
        let schema = Arc::new(SchemaRegistry::new(Arc::clone(&catalog), Arc::clone(&warehouse)));
        let builder = QueryBuilder::new(catalog, query.unparsed_expressions);
        let mut tools = ToolRegistry::new();
        surface::register_tools(&mut tools, query.default_limit);

        Self {
            schema,
            warehouse,
            sessions,
            builder,
            query,
            tools,
        }
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    pub fn schema(&self) -> &Arc<SchemaRegistry> {
        &self.schema
    }

    /// Execute a tool by name.
    ///
    /// Unknown tools and undecodable arguments are protocol errors; every
    /// domain failure comes back as an unsuccessful [`ExecutionResult`].
    pub async fn execute(
        &self,
        name: &str,
        arguments: Value,
        ctx: &RequestContext,
    ) -> Result<ExecutionResult, McpError> {
        if !self.tools.contains(name) {
            return Err(McpError::ToolNotFound {
                name: name.to_string(),
            });
        }
        info!(tool = name, session = %ctx.session_id, "Executing tool");

        let result = match name {
            surface::LIST_AVAILABLE_VIEWS => self.list_available_views(),
            surface::GET_TABLE_VIEWS_METADATA => {
                self.get_table_views_metadata(decode(name, arguments)?, ctx).await
            }
            surface::QUERY_SINGLE_VIEW => self
                .query_single_view(decode(name, arguments)?, ctx)
                .await
                .unwrap_or_else(Into::into),
            surface::QUERY_JOINED_VIEWS => self
                .query_joined_views(decode(name, arguments)?, ctx)
                .await
                .unwrap_or_else(Into::into),
            surface::LIST_TABLE_RELATIONSHIPS => self
                .list_table_relationships(decode(name, arguments)?)
                .unwrap_or_else(Into::into),
            surface::FETCH_RECENT_QUERY_CONTEXT => {
                self.fetch_recent_query_context(decode(name, arguments)?, ctx)?
            }
            surface::LIST_AVAILABLE_TOOLS => ExecutionResult::success_json(json!(self.tools.catalogue())),
            _ => {
                return Err(McpError::ToolNotFound {
                    name: name.to_string(),
                });
            }
        };

        if let Some(error) = &result.error {
            warn!(tool = name, session = %ctx.session_id, error = %error, "Tool call rejected");
        }
        Ok(result)
    }

    fn list_available_views(&self) -> ExecutionResult {
        ExecutionResult::success_json(json!(self.schema.catalog().descriptors()))
    }

    async fn get_table_views_metadata(
        &self,
        args: GetTableViewsMetadataArgs,
        ctx: &RequestContext,
    ) -> ExecutionResult {
        let limit = args.limit.unwrap_or(self.query.metadata_limit).max(1) as usize;

        let mut entries = Vec::with_capacity(args.table_views.len());
        for view in &args.table_views {
            if let Err(e) = self.builder.check_table(view) {
                entries.push(json!({ "view": view, "error": ToolFailure::from(e).message() }));
                continue;
            }
            match self.schema.describe(view).await {
                Ok(metadata) => {
                    let names: BTreeSet<String> =
                        metadata.iter().map(|c| c.column_name.clone()).collect();
                    self.sessions.cache_columns_for_session(&ctx.session_id, view, &names);
                    let columns: Vec<_> = metadata.iter().take(limit).collect();
                    entries.push(json!({ "view": view, "columns": columns }));
                }
                Err(e) => {
                    warn!(view = %view, error = %e, "Could not describe view");
                    entries.push(json!({ "view": view, "error": ToolFailure::SchemaFetch(e).message() }));
                }
            }
        }
        ExecutionResult::success_json(Value::Array(entries))
    }

    async fn query_single_view(
        &self,
        args: QuerySingleViewArgs,
        ctx: &RequestContext,
    ) -> Result<ExecutionResult, ToolFailure> {
        self.builder.check_table(&args.table_name)?;
        let valid = self.columns_for(&args.table_name, ctx).await?;

        let request = SingleViewRequest {
            table: args.table_name,
            columns: args.columns,
            where_clause: args.where_clause,
            group_by: args.group_by.into_vec(),
            order_by: args.order_by.into_vec(),
            limit: self.query.effective_limit(args.limit),
        };
        let built = self.builder.build_single(&request, &valid)?;
        self.run(surface::QUERY_SINGLE_VIEW, &request.table, built, ctx).await
    }

    async fn query_joined_views(
        &self,
        args: QueryJoinedViewsArgs,
        ctx: &RequestContext,
    ) -> Result<ExecutionResult, ToolFailure> {
        let plan = self.builder.join_plan(&args.from_table, &args.join_tables)?;

        let mut columns = BTreeMap::new();
        for view in plan.tables() {
            columns.insert(view.to_string(), self.columns_for(view, ctx).await?);
        }

        let request = JoinedViewRequest {
            select_columns: args.select_columns,
            from_table: args.from_table,
            join_tables: args.join_tables,
            where_clause: args.where_clause,
            group_by: args.group_by.into_vec(),
            order_by: args.order_by.into_vec(),
            limit: self.query.effective_limit(args.limit),
        };
        let built = self.builder.build_joined(&request, &columns)?;
        let target = format!("join of {}", plan.tables().collect::<Vec<_>>().join(", "));
        self.run(surface::QUERY_JOINED_VIEWS, &target, built, ctx).await
    }

    fn list_table_relationships(
        &self,
        args: ListTableRelationshipsArgs,
    ) -> Result<ExecutionResult, ToolFailure> {
        self.builder.check_table(&args.source_table)?;
        let relationships = self.schema.catalog().relationships(&args.source_table);
        Ok(ExecutionResult::success_json(json!(relationships)))
    }

    fn fetch_recent_query_context(
        &self,
        args: FetchRecentQueryContextArgs,
        ctx: &RequestContext,
    ) -> Result<ExecutionResult, McpError> {
        let context = self.sessions.relevant_context(&ctx.session_id, args.max_queries);
        Ok(ExecutionResult::success_json(serde_json::to_value(context)?))
    }

    /// Valid columns for `view`, preferring the session's own cache.
    async fn columns_for(
        &self,
        view: &str,
        ctx: &RequestContext,
    ) -> Result<BTreeSet<String>, ToolFailure> {
        if let Some(columns) = self.sessions.get_cached_columns(&ctx.session_id, view) {
            return Ok(columns);
        }
        let columns = self
            .schema
            .columns_for(view)
            .await
            .map_err(ToolFailure::SchemaFetch)?;
        self.sessions
            .cache_columns_for_session(&ctx.session_id, view, &columns);
        Ok(columns)
    }

    /// Execute a built query and record it in the session on success.
    async fn run(
        &self,
        tool: &str,
        target: &str,
        built: BuiltQuery,
        ctx: &RequestContext,
    ) -> Result<ExecutionResult, ToolFailure> {
        debug!(tool, sql = %built.sql, "Executing generated query");
        let rows = self
            .warehouse
            .execute(&Statement::new(built.sql.clone()))
            .await
            .map_err(|source| ToolFailure::Execution {
                target: target.to_string(),
                source,
            })?;

        info!(tool, rows = rows.len(), session = %ctx.session_id, "Query succeeded");
        self.sessions
            .record_query(&ctx.session_id, QueryLogEntry::from_built(tool, &built));
        Ok(ExecutionResult::success_text(rows.format_rows()))
    }
}

/// Decode tool arguments, treating a missing object as empty.
fn decode<T: DeserializeOwned>(tool: &str, arguments: Value) -> Result<T, McpError> {
    let arguments = match arguments {
        Value::Null => json!({}),
        other => other,
    };
    serde_json::from_value(arguments).map_err(|e| McpError::InvalidArguments {
        tool: tool.to_string(),
        reason: e.to_string(),
    })
}
