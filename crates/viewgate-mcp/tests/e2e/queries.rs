//! Query tests for viewgate MCP.
//!
//! Tests SQL generation and result formatting:
//! - Single-view queries with filters and limits
//! - Inner joins on the item key
//! - Wildcard expansion
//! - Aggregates with derived GROUP BY

use super::common::*;
use pretty_assertions::assert_eq;
use serde_json::json;

// =============================================================================
// SINGLE VIEW
// =============================================================================

#[tokio::test]
async fn test_single_view_query() {
    let ctx = TestContext::new();

    let result = ctx
        .call(
            "s1",
            "query_single_view",
            json!({
                "table_name": "item_details",
                "columns": ["item_id", "vin"],
                "where_clause": "industry = 'Ag'",
                "limit": 10
            }),
        )
        .await;

    assert_success(&result, "single view query should succeed");
    assert_eq!(
        ctx.data_queries(),
        vec!["SELECT item_id, vin FROM main.ai_data_assets.item_details WHERE industry = 'Ag' LIMIT 10"]
    );
    assert_eq!(
        result.text(),
        Some("(1, '1FTFW1E50MFA00001')\n(2, NULL)")
    );
}

#[tokio::test]
async fn test_empty_result() {
    let ctx = TestContext::new();

    let result = ctx
        .call(
            "s1",
            "query_single_view",
            json!({ "table_name": "item_basics", "columns": ["make"] }),
        )
        .await;

    assert_success(&result, "query should succeed");
    assert_eq!(result.text(), Some("No results found."));
}

#[tokio::test]
async fn test_wildcard_expands_to_valid_columns() {
    let ctx = TestContext::new();

    let result = ctx
        .call(
            "s1",
            "query_single_view",
            json!({ "table_name": "item_details" }),
        )
        .await;

    assert_success(&result, "wildcard query should succeed");
    assert_eq!(
        ctx.data_queries(),
        vec!["SELECT industry, item_id, make, vin FROM main.ai_data_assets.item_details LIMIT 200"]
    );
}

#[tokio::test]
async fn test_aggregate_derives_group_by() {
    let ctx = TestContext::new();

    let result = ctx
        .call(
            "s1",
            "query_single_view",
            json!({
                "table_name": "item_details",
                "columns": ["industry", "COUNT(item_id) AS items"],
                "order_by": "items DESC"
            }),
        )
        .await;

    assert_success(&result, "aggregate query should succeed");
    assert_eq!(
        ctx.data_queries(),
        vec![
            "SELECT industry, COUNT(item_id) AS items FROM main.ai_data_assets.item_details \
             GROUP BY industry ORDER BY items DESC LIMIT 200"
        ]
    );
}

#[tokio::test]
async fn test_limit_clamped_to_max_rows() {
    let ctx = TestContext::new();

    ctx.call(
        "s1",
        "query_single_view",
        json!({ "table_name": "item_details", "columns": ["vin"], "limit": 1000000 }),
    )
    .await;

    assert!(ctx.data_queries()[0].ends_with("LIMIT 1000"));
}

// =============================================================================
// JOINS
// =============================================================================

#[tokio::test]
async fn test_joined_query() {
    let ctx = TestContext::new();

    let result = ctx
        .call(
            "s1",
            "query_joined_views",
            json!({
                "select_columns": ["a.item_id", "b.amount"],
                "from_table": "item_basics",
                "join_tables": ["item_account_bidding"]
            }),
        )
        .await;

    assert_success(&result, "joined query should succeed");
    assert_eq!(
        ctx.data_queries(),
        vec![
            "SELECT a.item_id, b.amount FROM main.ai_data_assets.item_basics AS a \
             INNER JOIN main.ai_data_assets.item_account_bidding AS b ON a.item_id = b.item_id LIMIT 200"
        ]
    );
    assert_eq!(result.text(), Some("(7, 1250.5)"));

    let context = extract_json(&ctx.call("s1", "fetch_recent_query_context", json!({})).await);
    assert_eq!(
        context["relevant_joins"],
        json!([{
            "from_table": "item_basics",
            "join_tables": ["item_account_bidding"],
            "join_key": "item_id"
        }])
    );
}

#[tokio::test]
async fn test_self_join_dropped() {
    let ctx = TestContext::new();

    let result = ctx
        .call(
            "s1",
            "query_joined_views",
            json!({
                "select_columns": ["a.make", "b.amount"],
                "from_table": "item_basics",
                "join_tables": ["item_basics", "item_account_bidding"]
            }),
        )
        .await;

    assert_success(&result, "joined query should succeed");
    assert_eq!(ctx.data_queries()[0].matches("INNER JOIN").count(), 1);
}

#[tokio::test]
async fn test_join_with_view_qualifier() {
    let ctx = TestContext::new();

    let result = ctx
        .call(
            "s1",
            "query_joined_views",
            json!({
                "select_columns": ["item_basics.make", "SUM(item_account_bidding.amount) AS total"],
                "from_table": "item_basics",
                "join_tables": ["item_account_bidding"]
            }),
        )
        .await;

    assert_success(&result, "qualified join should succeed");
    let sql = &ctx.data_queries()[0];
    assert!(sql.starts_with("SELECT a.make, SUM(b.amount) AS total FROM"), "{sql}");
    assert!(sql.ends_with("GROUP BY a.make LIMIT 200"), "{sql}");
}
