//! Shared test infrastructure for viewgate MCP end-to-end tests.
//!
//! This module provides:
//! - A catalog with the built-in views plus two join fixtures
//! - A scripted warehouse answering `DESCRIBE TABLE` and data queries
//! - Helper functions for calling tools and inspecting results

#![allow(dead_code)]

use serde_json::{Value, json};
use std::sync::Arc;
use viewgate_core::{CatalogConfig, McpConfig, QueryConfig, ViewCatalog, ViewDescriptor};
use viewgate_mcp::{ExecutionResult, McpServer, RequestContext, SessionStore, ToolExecutor};
use viewgate_warehouse::ResultSet;
use viewgate_warehouse::testing::ScriptedExecutor;

pub const HISTORY_LIMIT: usize = 5;

pub const DETAILS_COLUMNS: &[&str] = &["item_id", "vin", "industry", "make"];
pub const BASICS_COLUMNS: &[&str] = &["item_id", "make", "model"];
pub const BIDDING_COLUMNS: &[&str] = &["item_id", "amount", "bidder"];

// =============================================================================
// FIXTURES
// =============================================================================

pub fn catalog() -> Arc<ViewCatalog> {
    let mut config = CatalogConfig::default();
    config.views.push(ViewDescriptor::new(
        "item_basics",
        "Basic facts about each item.",
        "Use as the base of joins.",
    ));
    config.views.push(ViewDescriptor::new(
        "item_account_bidding",
        "Bids placed per item and account.",
        "Use for bid amounts.",
    ));
    Arc::new(ViewCatalog::new(&config))
}

fn describe(columns: &[&str]) -> ResultSet {
    ResultSet::new(
        vec!["col_name".into(), "data_type".into(), "comment".into()],
        columns
            .iter()
            .map(|c| vec![json!(c), json!("string"), Value::Null])
            .collect(),
    )
}

/// Warehouse with no column metadata table entries, so columns come from
/// `DESCRIBE TABLE`.
pub fn warehouse() -> ScriptedExecutor {
    ScriptedExecutor::new()
        .on(
            "DESCRIBE TABLE main.ai_data_assets.item_details",
            describe(DETAILS_COLUMNS),
        )
        .on(
            "DESCRIBE TABLE main.ai_data_assets.item_basics",
            describe(BASICS_COLUMNS),
        )
        .on(
            "DESCRIBE TABLE main.ai_data_assets.item_account_bidding",
            describe(BIDDING_COLUMNS),
        )
        .on(
            "INNER JOIN",
            ResultSet::new(
                vec!["item_id".into(), "amount".into()],
                vec![vec![json!(7), json!(1250.5)]],
            ),
        )
        .on(
            "FROM main.ai_data_assets.item_details",
            ResultSet::new(
                vec!["item_id".into(), "vin".into()],
                vec![
                    vec![json!(1), json!("1FTFW1E50MFA00001")],
                    vec![json!(2), Value::Null],
                ],
            ),
        )
}

pub struct TestContext {
    pub warehouse: Arc<ScriptedExecutor>,
    pub executor: Arc<ToolExecutor>,
    pub server: McpServer,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_warehouse(warehouse())
    }

    pub fn with_warehouse(warehouse: ScriptedExecutor) -> Self {
        let warehouse = Arc::new(warehouse);
        let executor = Arc::new(ToolExecutor::new(
            catalog(),
            warehouse.clone(),
            Arc::new(SessionStore::new(HISTORY_LIMIT)),
            QueryConfig::default(),
        ));
        let server = McpServer::new(McpConfig::default(), executor.clone());
        Self {
            warehouse,
            executor,
            server,
        }
    }

    /// Call a tool in `session`, failing the test on protocol errors.
    pub async fn call(&self, session: &str, tool: &str, arguments: Value) -> ExecutionResult {
        self.executor
            .execute(tool, arguments, &RequestContext::new(session))
            .await
            .unwrap_or_else(|e| panic!("{tool} failed at the protocol level: {e}"))
    }

    /// SQL of every data query sent to the warehouse, schema lookups excluded.
    pub fn data_queries(&self) -> Vec<String> {
        self.warehouse
            .calls()
            .into_iter()
            .map(|s| s.sql)
            .filter(|sql| !sql.starts_with("DESCRIBE") && !sql.contains("item_views_column_metadata"))
            .collect()
    }
}

// =============================================================================
// ASSERTION HELPERS
// =============================================================================

pub fn assert_success(result: &ExecutionResult, message: &str) {
    assert!(
        result.success,
        "{}: {:?}",
        message,
        result.error.as_deref().unwrap_or("unknown error")
    );
}

pub fn assert_error(result: &ExecutionResult, category: &str) {
    assert!(!result.success, "expected {category}, got success");
    let text = result.text().unwrap_or_default();
    assert!(
        text.starts_with(&format!("{category}: ")),
        "expected {category}, got: {text}"
    );
}

pub fn extract_json(result: &ExecutionResult) -> Value {
    result.json().cloned().unwrap_or(Value::Null)
}
