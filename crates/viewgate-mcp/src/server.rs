//! MCP server implementation.
//!
//! This module provides the main MCP server that handles tool discovery
//! and execution over stdio or HTTP.

use crate::error::McpError;
use crate::executor::{ExecutionResult, ToolExecutor};
use crate::http_transport::{HttpServer, HttpTransportState, RequestEnvelope};
use crate::protocol::*;
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use viewgate_core::{McpConfig, Transport};

/// MCP protocol revision this server speaks.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// The MCP server.
#[derive(Clone)]
pub struct McpServer {
    config: McpConfig,
    executor: Arc<ToolExecutor>,
    default_session_id: String,
}

impl McpServer {
    /// Create a new MCP server with the given configuration.
    pub fn new(config: McpConfig, executor: Arc<ToolExecutor>) -> Self {
        Self {
            config,
            executor,
            default_session_id: "default".to_string(),
        }
    }

    /// Session used by stdio and by HTTP requests that name none.
    pub fn with_default_session(mut self, session_id: impl Into<String>) -> Self {
        self.default_session_id = session_id.into();
        self
    }

    pub fn executor(&self) -> &Arc<ToolExecutor> {
        &self.executor
    }

    /// Start the MCP server.
    pub async fn run(&self) -> Result<(), McpError> {
        match self.config.transport {
            Transport::Stdio => self.run_stdio().await,
            Transport::Http => self.run_http().await,
        }
    }

    /// Run the server with stdio transport: one JSON-RPC message per line.
    async fn run_stdio(&self) -> Result<(), McpError> {
        tracing::info!(session = %self.default_session_id, "Starting MCP server with stdio transport");

        let ctx = RequestContext::new(self.default_session_id.clone());
        let mut lines = BufReader::new(tokio::io::stdin()).split(b'\n');
        let mut stdout = tokio::io::stdout();

        while let Some(line) = lines.next_segment().await? {
            if let Some(response) = self.handle_line(&line, &ctx).await {
                let mut payload = serde_json::to_vec(&response)?;
                payload.push(b'\n');
                stdout.write_all(&payload).await?;
                stdout.flush().await?;
            }
        }

        tracing::info!("stdin closed, stopping MCP server");
        Ok(())
    }

    /// Handle one raw stdio line. Blank lines yield no response; lines that
    /// are not UTF-8 JSON-RPC get a parse error.
    pub async fn handle_line(&self, line: &[u8], ctx: &RequestContext) -> Option<JsonRpcResponse> {
        let line = match std::str::from_utf8(line) {
            Ok(line) => line.trim(),
            Err(e) => {
                tracing::warn!(error = %e, "Rejected JSON-RPC message that is not UTF-8");
                return Some(JsonRpcResponse::error(
                    None,
                    PARSE_ERROR,
                    format!("Parse error: invalid UTF-8: {e}"),
                ));
            }
        };
        if line.is_empty() {
            return None;
        }

        match serde_json::from_str::<JsonRpcRequest>(line) {
            Ok(request) => self.handle_request(request, ctx).await,
            Err(e) => {
                tracing::warn!(error = %e, "Rejected malformed JSON-RPC message");
                Some(JsonRpcResponse::error(None, PARSE_ERROR, format!("Parse error: {e}")))
            }
        }
    }

    /// Run the server with HTTP transport.
    pub async fn run_http(&self) -> Result<(), McpError> {
        tracing::info!(
            address = %self.config.bind_address(),
            "Starting MCP server with HTTP transport"
        );

        // Create channel for request handling
        let (request_tx, mut request_rx) = mpsc::channel::<RequestEnvelope>(100);

        // One task per request; calls from different sessions run concurrently.
        let server = self.clone();
        tokio::spawn(async move {
            while let Some((request, ctx, response_tx)) = request_rx.recv().await {
                let server = server.clone();
                tokio::spawn(async move {
                    let response = server.handle_request(request, &ctx).await;
                    let _ = response_tx.send(response);
                });
            }
        });

        let state = HttpTransportState::new(request_tx, self.default_session_id.clone());
        HttpServer::new(self.config.bind_address(), state).run().await
    }

    /// Handle a JSON-RPC message. Notifications yield no response.
    pub async fn handle_request(
        &self,
        request: JsonRpcRequest,
        ctx: &RequestContext,
    ) -> Option<JsonRpcResponse> {
        let id = request.id.clone();
        let notification = request.is_notification();
        tracing::debug!(method = %request.method, session = %ctx.session_id, "Handling request");

        let response = match request.method.as_str() {
            "initialize" => self.handle_initialize(id),
            "initialized" | "notifications/initialized" => JsonRpcResponse::success(id, json!({})),
            "ping" => JsonRpcResponse::success(id, json!({})),
            "tools/list" => self.handle_list_tools(id),
            "tools/call" => self.handle_call_tool(id, request.params, ctx).await,
            "shutdown" => self.handle_shutdown(id),
            _ => JsonRpcResponse::error(
                id,
                METHOD_NOT_FOUND,
                format!("Method not found: {}", request.method),
            ),
        };

        (!notification).then_some(response)
    }

    fn handle_initialize(&self, id: Option<Value>) -> JsonRpcResponse {
        let result = json!({
            "protocolVersion": PROTOCOL_VERSION,
            "serverInfo": {
                "name": "viewgate",
                "version": env!("CARGO_PKG_VERSION")
            },
            "capabilities": {
                "tools": {
                    "listChanged": false
                }
            }
        });
        JsonRpcResponse::success(id, result)
    }

    fn handle_list_tools(&self, id: Option<Value>) -> JsonRpcResponse {
        let result = json!({ "tools": self.executor.tools().definitions() });
        JsonRpcResponse::success(id, result)
    }

    async fn handle_call_tool(
        &self,
        id: Option<Value>,
        params: Option<Value>,
        ctx: &RequestContext,
    ) -> JsonRpcResponse {
        let params: CallToolParams = match params {
            Some(p) => match serde_json::from_value(p) {
                Ok(params) => params,
                Err(e) => {
                    return JsonRpcResponse::error(id, INVALID_PARAMS, format!("Invalid params: {}", e));
                }
            },
            None => return JsonRpcResponse::error(id, INVALID_PARAMS, "Missing params"),
        };

        match self.executor.execute(&params.name, params.arguments, ctx).await {
            Ok(result) => execution_result_to_response(id, result),
            Err(e) => {
                tracing::warn!(tool = %params.name, error = %e, "Tool call failed");
                JsonRpcResponse::error(id, e.code(), e.to_string())
            }
        }
    }

    fn handle_shutdown(&self, id: Option<Value>) -> JsonRpcResponse {
        tracing::info!("MCP server shutdown requested");
        JsonRpcResponse::success(id, json!(null))
    }
}

fn execution_result_to_response(id: Option<Value>, result: ExecutionResult) -> JsonRpcResponse {
    let response = CallToolResponse {
        content: result.content,
        is_error: !result.success,
    };
    match serde_json::to_value(response) {
        Ok(value) => JsonRpcResponse::success(id, value),
        Err(e) => JsonRpcResponse::error(id, INTERNAL_ERROR, e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::SessionStore;
    use viewgate_core::{QueryConfig, ViewCatalog};
    use viewgate_warehouse::testing::ScriptedExecutor;

    fn server() -> McpServer {
        let executor = ToolExecutor::new(
            Arc::new(ViewCatalog::default()),
            Arc::new(ScriptedExecutor::new()),
            Arc::new(SessionStore::new(5)),
            QueryConfig::default(),
        );
        McpServer::new(McpConfig::default(), Arc::new(executor))
    }

    fn ctx() -> RequestContext {
        RequestContext::new("default")
    }

    #[tokio::test]
    async fn test_initialize() {
        let request = JsonRpcRequest::new(1, "initialize", None);

        let response = server().handle_request(request, &ctx()).await.unwrap();
        assert!(response.error.is_none());
        assert_eq!(response.result.unwrap()["protocolVersion"], PROTOCOL_VERSION);
    }

    #[tokio::test]
    async fn test_notification_has_no_response() {
        let request = JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            id: None,
            method: "notifications/initialized".to_string(),
            params: None,
        };

        assert!(server().handle_request(request, &ctx()).await.is_none());
    }

    #[tokio::test]
    async fn test_list_tools() {
        let request = JsonRpcRequest::new(1, "tools/list", None);

        let response = server().handle_request(request, &ctx()).await.unwrap();
        let result = response.result.unwrap();
        let tools = result["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 7);
        assert_eq!(tools[0]["name"], "list_available_views");
        assert_eq!(tools[0]["annotations"]["readOnlyHint"], true);
    }

    #[tokio::test]
    async fn test_invalid_utf8_line_is_parse_error() {
        let server = server();

        let response = server.handle_line(b"{\"jsonrpc\": \"2.0\", \xff}", &ctx()).await.unwrap();
        assert!(response.id.is_none());
        assert_eq!(response.error.unwrap().code, PARSE_ERROR);

        // The next well-formed line is still served.
        let line = br#"{"jsonrpc": "2.0", "id": 2, "method": "tools/list"}"#;
        let response = server.handle_line(line, &ctx()).await.unwrap();
        assert!(response.error.is_none());
    }

    #[tokio::test]
    async fn test_blank_line_ignored() {
        assert!(server().handle_line(b"  \r", &ctx()).await.is_none());
    }

    #[tokio::test]
    async fn test_call_nonexistent_tool() {
        let request = JsonRpcRequest::new(
            1,
            "tools/call",
            Some(json!({
                "name": "nonexistent",
                "arguments": {}
            })),
        );

        let response = server().handle_request(request, &ctx()).await.unwrap();
        assert_eq!(response.error.unwrap().code, INVALID_PARAMS);
    }

    #[tokio::test]
    async fn test_domain_error_is_tool_result() {
        let request = JsonRpcRequest::new(
            1,
            "tools/call",
            Some(json!({
                "name": "query_single_view",
                "arguments": { "table_name": "users", "columns": ["id"] }
            })),
        );

        let response = server().handle_request(request, &ctx()).await.unwrap();
        assert!(response.error.is_none());
        let result = response.result.unwrap();
        assert_eq!(result["isError"], true);
        assert_eq!(
            result["content"][0]["text"],
            "InvalidTableError: Invalid table name: users"
        );
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let request = JsonRpcRequest::new(1, "resources/list", None);

        let response = server().handle_request(request, &ctx()).await.unwrap();
        assert_eq!(response.error.unwrap().code, METHOD_NOT_FOUND);
    }
}
