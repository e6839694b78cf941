//! Guardrail tests for viewgate MCP.
//!
//! Every rejection here must happen before a data query reaches the
//! warehouse:
//! - Views outside the allow-list
//! - Unknown columns, with suggestions
//! - Injection attempts in columns and filters
//! - Clauses smuggled into the filter

use super::common::*;
use serde_json::json;

// =============================================================================
// ALLOW-LIST
// =============================================================================

#[tokio::test]
async fn test_invalid_table_makes_no_calls() {
    let ctx = TestContext::new();

    let result = ctx
        .call(
            "s1",
            "query_single_view",
            json!({ "table_name": "users", "columns": ["email"] }),
        )
        .await;

    assert_error(&result, "InvalidTableError");
    assert_eq!(ctx.warehouse.call_count(), 0);
}

#[tokio::test]
async fn test_invalid_join_table_makes_no_calls() {
    let ctx = TestContext::new();

    let result = ctx
        .call(
            "s1",
            "query_joined_views",
            json!({
                "select_columns": ["a.item_id"],
                "from_table": "item_basics",
                "join_tables": ["item_account_bidding", "main.other.secrets"]
            }),
        )
        .await;

    assert_error(&result, "InvalidTableError");
    assert_eq!(ctx.warehouse.call_count(), 0);
}

// =============================================================================
// COLUMNS
// =============================================================================

#[tokio::test]
async fn test_invalid_columns_listed_with_suggestions() {
    let ctx = TestContext::new();

    let result = ctx
        .call(
            "s1",
            "query_single_view",
            json!({
                "table_name": "item_details",
                "columns": ["item_id", "vim", "colour"]
            }),
        )
        .await;

    assert_error(&result, "InvalidColumnError");
    let text = result.text().unwrap();
    assert!(text.contains("'vim' (did you mean: vin)"), "{text}");
    assert!(text.contains("'colour'"), "{text}");
    assert!(!text.contains("'item_id'"), "{text}");
    assert!(ctx.data_queries().is_empty());
}

#[tokio::test]
async fn test_column_from_other_view_rejected() {
    let ctx = TestContext::new();

    let result = ctx
        .call(
            "s1",
            "query_single_view",
            json!({ "table_name": "item_basics", "columns": ["amount"] }),
        )
        .await;

    assert_error(&result, "InvalidColumnError");
    assert!(ctx.data_queries().is_empty());
}

#[tokio::test]
async fn test_joined_select_checked_against_planned_views() {
    let ctx = TestContext::new();

    let result = ctx
        .call(
            "s1",
            "query_joined_views",
            json!({
                "select_columns": ["a.item_id", "b.vin"],
                "from_table": "item_basics",
                "join_tables": ["item_account_bidding"]
            }),
        )
        .await;

    assert_error(&result, "InvalidColumnError");
    assert!(ctx.data_queries().is_empty());
}

// =============================================================================
// INJECTION
// =============================================================================

#[tokio::test]
async fn test_injection_in_column_rejected() {
    let ctx = TestContext::new();

    let result = ctx
        .call(
            "s1",
            "query_single_view",
            json!({ "table_name": "item_details", "columns": ["vin; DROP TABLE x"] }),
        )
        .await;

    assert_error(&result, "InvalidColumnError");
    assert!(ctx.data_queries().is_empty());
}

#[tokio::test]
async fn test_injection_in_filter_rejected() {
    let ctx = TestContext::new();

    let result = ctx
        .call(
            "s1",
            "query_single_view",
            json!({
                "table_name": "item_details",
                "columns": ["vin"],
                "where_clause": "industry = 'Ag'; DROP TABLE x"
            }),
        )
        .await;

    assert_error(&result, "MalformedRequestError");
    assert!(ctx.data_queries().is_empty());
}

#[tokio::test]
async fn test_subquery_in_filter_rejected() {
    let ctx = TestContext::new();

    let result = ctx
        .call(
            "s1",
            "query_single_view",
            json!({
                "table_name": "item_details",
                "columns": ["vin"],
                "where_clause": "item_id IN (SELECT item_id FROM main.other.secrets)"
            }),
        )
        .await;

    assert_error(&result, "MalformedRequestError");
    assert!(ctx.data_queries().is_empty());
}

#[tokio::test]
async fn test_smuggled_limit_rejected() {
    let ctx = TestContext::new();

    let result = ctx
        .call(
            "s1",
            "query_single_view",
            json!({
                "table_name": "item_details",
                "columns": ["vin"],
                "where_clause": "industry = 'Ag' LIMIT 100000"
            }),
        )
        .await;

    assert_error(&result, "MalformedRequestError");
    assert!(result.text().unwrap().contains("limit"));
    assert!(ctx.data_queries().is_empty());
}

#[tokio::test]
async fn test_filter_on_unknown_column_rejected() {
    let ctx = TestContext::new();

    let result = ctx
        .call(
            "s1",
            "query_single_view",
            json!({
                "table_name": "item_details",
                "columns": ["vin"],
                "where_clause": "password = 'x'"
            }),
        )
        .await;

    assert_error(&result, "InvalidColumnError");
    assert!(ctx.data_queries().is_empty());
}
