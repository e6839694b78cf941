//! Session tests for viewgate MCP.
//!
//! Tests per-session state:
//! - Isolation between session ids
//! - Bounded query history
//! - Filter history and recent tables
//! - Column metadata fetched once per view across sessions

use super::common::*;
use serde_json::json;

async fn query_vin(ctx: &TestContext, session: &str, filter: &str) {
    let result = ctx
        .call(
            session,
            "query_single_view",
            json!({
                "table_name": "item_details",
                "columns": ["vin"],
                "where_clause": filter
            }),
        )
        .await;
    assert_success(&result, "query should succeed");
}

// =============================================================================
// ISOLATION
// =============================================================================

#[tokio::test]
async fn test_sessions_are_isolated() {
    let ctx = TestContext::new();
    query_vin(&ctx, "alice", "industry = 'Ag'").await;

    let bob = extract_json(&ctx.call("bob", "fetch_recent_query_context", json!({})).await);
    assert_eq!(bob["recent_queries"], json!([]));
    assert_eq!(bob["recent_tables"], json!([]));
    assert_eq!(bob["filter_history"], json!({}));

    let alice = extract_json(&ctx.call("alice", "fetch_recent_query_context", json!({})).await);
    assert_eq!(alice["recent_tables"], json!(["item_details"]));
    assert_eq!(alice["filter_history"], json!({ "industry": "Ag" }));
}

#[tokio::test]
async fn test_column_cache_is_per_session() {
    let ctx = TestContext::new();
    query_vin(&ctx, "alice", "industry = 'Ag'").await;

    let sessions = ctx.executor.sessions();
    assert!(sessions.get_cached_columns("alice", "item_details").is_some());
    assert!(sessions.get_cached_columns("bob", "item_details").is_none());
}

// =============================================================================
// HISTORY
// =============================================================================

#[tokio::test]
async fn test_history_is_bounded() {
    let ctx = TestContext::new();
    for make in ["A", "B", "C", "D", "E", "F"] {
        query_vin(&ctx, "s1", &format!("make = '{make}'")).await;
    }

    let session = ctx.executor.sessions().get_or_create("s1");
    assert_eq!(session.recent_queries.len(), HISTORY_LIMIT);
    assert!(session.recent_queries[0].sql.contains("make = 'B'"));
    assert_eq!(session.filter_history["make"], "F");
}

#[tokio::test]
async fn test_recent_context_respects_max_queries() {
    let ctx = TestContext::new();
    for make in ["A", "B", "C", "D"] {
        query_vin(&ctx, "s1", &format!("make = '{make}'")).await;
    }

    let context = extract_json(&ctx.call("s1", "fetch_recent_query_context", json!({})).await);
    let queries = context["recent_queries"].as_array().unwrap();
    assert_eq!(queries.len(), 3);
    assert!(queries[2]["sql"].as_str().unwrap().contains("make = 'D'"));

    let context = extract_json(
        &ctx.call("s1", "fetch_recent_query_context", json!({ "max_queries": 1 }))
            .await,
    );
    assert_eq!(context["recent_queries"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_rejected_query_not_recorded() {
    let ctx = TestContext::new();
    ctx.call(
        "s1",
        "query_single_view",
        json!({ "table_name": "item_details", "columns": ["colour"] }),
    )
    .await;

    let session = ctx.executor.sessions().get_or_create("s1");
    assert!(session.recent_queries.is_empty());
}

// =============================================================================
// METADATA CACHE
// =============================================================================

#[tokio::test]
async fn test_columns_fetched_once_per_view() {
    let ctx = TestContext::new();
    query_vin(&ctx, "alice", "industry = 'Ag'").await;
    query_vin(&ctx, "bob", "industry = 'Ag'").await;
    ctx.call(
        "carol",
        "get_table_views_metadata",
        json!({ "table_views": ["item_details"] }),
    )
    .await;

    assert_eq!(ctx.warehouse.calls_matching("item_views_column_metadata"), 1);
    assert_eq!(
        ctx.warehouse
            .calls_matching("DESCRIBE TABLE main.ai_data_assets.item_details"),
        1
    );
}

#[tokio::test]
async fn test_metadata_per_view_errors() {
    let ctx = TestContext::new();

    let result = ctx
        .call(
            "s1",
            "get_table_views_metadata",
            json!({ "table_views": ["item_basics", "payroll", "item_location"] }),
        )
        .await;

    assert_success(&result, "metadata call should succeed overall");
    let entries = extract_json(&result);
    assert_eq!(entries[0]["view"], "item_basics");
    assert_eq!(entries[0]["columns"].as_array().unwrap().len(), BASICS_COLUMNS.len());
    assert_eq!(entries[0]["columns"][0]["column_name"], "item_id");
    assert!(entries[1]["error"].as_str().unwrap().starts_with("InvalidTableError"));
    assert!(entries[2]["error"].as_str().unwrap().starts_with("SchemaFetchError"));
}
