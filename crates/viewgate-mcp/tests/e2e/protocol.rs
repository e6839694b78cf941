//! Protocol tests for viewgate MCP.
//!
//! Drives `McpServer::handle_request` the way a transport does:
//! - Tool discovery
//! - Tool calls and their error mapping
//! - Session context supplied by the transport

use super::common::*;
use serde_json::{Value, json};
use viewgate_mcp::protocol::{INVALID_PARAMS, JsonRpcRequest};
use viewgate_mcp::RequestContext;

async fn call_tool(ctx: &TestContext, session: &str, name: &str, arguments: Value) -> Value {
    let request = JsonRpcRequest::new(
        1,
        "tools/call",
        Some(json!({ "name": name, "arguments": arguments })),
    );
    let response = ctx
        .server
        .handle_request(request, &RequestContext::new(session))
        .await
        .expect("tools/call has an id");
    serde_json::to_value(response).unwrap()
}

#[tokio::test]
async fn test_tools_list_matches_catalogue() {
    let ctx = TestContext::new();
    let response = ctx
        .server
        .handle_request(JsonRpcRequest::new(1, "tools/list", None), &RequestContext::new("s"))
        .await
        .unwrap();
    let listed: Vec<String> = response.result.unwrap()["tools"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap().to_string())
        .collect();

    let catalogue = call_tool(&ctx, "s", "list_available_tools", json!({})).await;
    let documented: Vec<String> = catalogue["result"]["content"][0]["json"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["tool"].as_str().unwrap().to_string())
        .collect();

    assert_eq!(listed, documented);
    assert_eq!(listed.len(), 7);
}

#[tokio::test]
async fn test_unknown_tool_is_invalid_params() {
    let ctx = TestContext::new();
    let response = call_tool(&ctx, "s", "drop_everything", json!({})).await;
    assert_eq!(response["error"]["code"], INVALID_PARAMS);
    assert!(response.get("result").is_none());
}

#[tokio::test]
async fn test_bad_arguments_are_invalid_params() {
    let ctx = TestContext::new();
    let response = call_tool(
        &ctx,
        "s",
        "query_single_view",
        json!({ "table_name": 42 }),
    )
    .await;
    assert_eq!(response["error"]["code"], INVALID_PARAMS);
    assert_eq!(ctx.warehouse.call_count(), 0);
}

#[tokio::test]
async fn test_tool_result_shape() {
    let ctx = TestContext::new();
    let response = call_tool(
        &ctx,
        "s",
        "query_single_view",
        json!({ "table_name": "item_details", "columns": ["item_id", "vin"], "limit": 2 }),
    )
    .await;

    assert_eq!(response["result"]["isError"], false);
    assert_eq!(response["result"]["content"][0]["type"], "text");

    let response = call_tool(&ctx, "s", "list_table_relationships", json!({ "source_table": "nope" })).await;
    assert_eq!(response["result"]["isError"], true);
}

#[tokio::test]
async fn test_session_follows_request_context() {
    let ctx = TestContext::new();
    call_tool(
        &ctx,
        "http-1",
        "query_single_view",
        json!({ "table_name": "item_details", "columns": ["vin"] }),
    )
    .await;

    let mine = call_tool(&ctx, "http-1", "fetch_recent_query_context", json!({})).await;
    let theirs = call_tool(&ctx, "http-2", "fetch_recent_query_context", json!({})).await;
    let queries = |v: &Value| v["result"]["content"][0]["json"]["recent_queries"].as_array().unwrap().len();
    assert_eq!(queries(&mine), 1);
    assert_eq!(queries(&theirs), 0);
}
