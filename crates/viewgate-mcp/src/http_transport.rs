//! HTTP transport for MCP server.
//!
//! JSON-RPC messages are POSTed to `/mcp`. The session is taken from the
//! `Mcp-Session-Id` header, then the `session_id` query parameter. An
//! `initialize` without either starts a fresh session whose id is returned
//! in the response header; any other request without one uses the default
//! session.

use crate::error::McpError;
use crate::protocol::{INTERNAL_ERROR, JsonRpcRequest, JsonRpcResponse, PARSE_ERROR, RequestContext};
use axum::{
    Json, Router,
    extract::{Query, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tower_http::trace::TraceLayer;

/// Header carrying the session id in both directions.
pub const SESSION_HEADER: &str = "mcp-session-id";

/// A request handed to the server task, with the channel for its reply.
///
/// Notifications are answered with `None`.
pub type RequestEnvelope = (
    JsonRpcRequest,
    RequestContext,
    oneshot::Sender<Option<JsonRpcResponse>>,
);

/// HTTP transport handler state.
pub struct HttpTransportState {
    /// Channel for sending requests to the MCP server.
    request_tx: mpsc::Sender<RequestEnvelope>,
    /// Session used when a request names none.
    default_session_id: String,
}

impl HttpTransportState {
    /// Create a new HTTP transport state.
    pub fn new(request_tx: mpsc::Sender<RequestEnvelope>, default_session_id: impl Into<String>) -> Self {
        Self {
            request_tx,
            default_session_id: default_session_id.into(),
        }
    }
}

/// Query parameters for MCP endpoint.
#[derive(Debug, Deserialize)]
pub struct McpQuery {
    session_id: Option<String>,
}

/// Create the HTTP router for MCP.
pub fn create_router(state: Arc<HttpTransportState>) -> Router {
    Router::new()
        .route("/mcp", post(handle_mcp_post))
        .route("/health", get(handle_health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Resolve the session for a request. The flag is set when the id is new.
fn resolve_session(
    state: &HttpTransportState,
    headers: &HeaderMap,
    query: McpQuery,
    method: &str,
) -> (String, bool) {
    let named = headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .or(query.session_id.filter(|s| !s.is_empty()));

    match named {
        Some(id) => (id, false),
        None if method == "initialize" => (uuid::Uuid::new_v4().to_string(), true),
        None => (state.default_session_id.clone(), false),
    }
}

fn rpc_error(status: StatusCode, code: i32, message: impl Into<String>) -> Response {
    (status, Json(JsonRpcResponse::error(None, code, message))).into_response()
}

/// Handle POST requests to /mcp (JSON-RPC over HTTP).
async fn handle_mcp_post(
    State(state): State<Arc<HttpTransportState>>,
    headers: HeaderMap,
    Query(query): Query<McpQuery>,
    body: String,
) -> Response {
    let request: JsonRpcRequest = match serde_json::from_str(&body) {
        Ok(request) => request,
        Err(e) => {
            tracing::warn!(error = %e, "Rejected malformed JSON-RPC message");
            return rpc_error(StatusCode::BAD_REQUEST, PARSE_ERROR, format!("Parse error: {e}"));
        }
    };

    let (session_id, created) = resolve_session(&state, &headers, query, &request.method);
    if created {
        tracing::info!(session = %session_id, "Started new session");
    }

    let (response_tx, response_rx) = oneshot::channel();
    let ctx = RequestContext::new(session_id.clone());

    // Send request to MCP server
    if state.request_tx.send((request, ctx, response_tx)).await.is_err() {
        return rpc_error(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR, "MCP server unavailable");
    }

    let mut response = match response_rx.await {
        Ok(Some(response)) => (StatusCode::OK, Json(response)).into_response(),
        Ok(None) => StatusCode::ACCEPTED.into_response(),
        Err(_) => {
            return rpc_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                INTERNAL_ERROR,
                "No response from MCP server",
            );
        }
    };

    if let Ok(value) = HeaderValue::from_str(&session_id) {
        response.headers_mut().insert(SESSION_HEADER, value);
    }
    response
}

/// Handle health check requests.
async fn handle_health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "viewgate-mcp",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// HTTP server for MCP transport.
pub struct HttpServer {
    bind_address: String,
    state: Arc<HttpTransportState>,
}

impl HttpServer {
    /// Create a new HTTP server.
    pub fn new(bind_address: impl Into<String>, state: HttpTransportState) -> Self {
        Self {
            bind_address: bind_address.into(),
            state: Arc::new(state),
        }
    }

    /// Run the HTTP server until Ctrl-C.
    pub async fn run(self) -> Result<(), McpError> {
        let app = create_router(self.state);

        let listener = tokio::net::TcpListener::bind(&self.bind_address)
            .await
            .map_err(|e| {
                McpError::StartupFailed(format!("Failed to bind to {}: {}", self.bind_address, e))
            })?;

        tracing::info!(address = %self.bind_address, "MCP HTTP server listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| McpError::Internal(e.into()))?;

        Ok(())
    }
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        tracing::info!("Shutdown signal received");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    /// Router whose server task answers with the session it was given.
    fn echo_router() -> Router {
        let (tx, mut rx) = mpsc::channel::<RequestEnvelope>(8);
        tokio::spawn(async move {
            while let Some((request, ctx, reply)) = rx.recv().await {
                let response = (!request.is_notification()).then(|| {
                    JsonRpcResponse::success(request.id.clone(), json!({ "session": ctx.session_id }))
                });
                let _ = reply.send(response);
            }
        });
        create_router(Arc::new(HttpTransportState::new(tx, "default")))
    }

    fn post(body: Value, session: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/mcp")
            .header("content-type", "application/json");
        if let Some(session) = session {
            builder = builder.header("Mcp-Session-Id", session);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let (tx, _rx) = mpsc::channel(1);
        let state = Arc::new(HttpTransportState::new(tx, "default"));
        let app = create_router(state);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_session_from_header() {
        let response = echo_router()
            .oneshot(post(json!({"jsonrpc": "2.0", "id": 1, "method": "ping"}), Some("abc")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[SESSION_HEADER], "abc");
        assert_eq!(body_json(response).await["result"]["session"], "abc");
    }

    #[tokio::test]
    async fn test_session_from_query() {
        let request = Request::builder()
            .method("POST")
            .uri("/mcp?session_id=q1")
            .body(Body::from(json!({"jsonrpc": "2.0", "id": 1, "method": "ping"}).to_string()))
            .unwrap();
        let response = echo_router().oneshot(request).await.unwrap();
        assert_eq!(body_json(response).await["result"]["session"], "q1");
    }

    #[tokio::test]
    async fn test_initialize_starts_session() {
        let response = echo_router()
            .oneshot(post(json!({"jsonrpc": "2.0", "id": 1, "method": "initialize"}), None))
            .await
            .unwrap();

        let issued = response.headers()[SESSION_HEADER].to_str().unwrap().to_string();
        assert_ne!(issued, "default");
        assert_eq!(body_json(response).await["result"]["session"], issued);
    }

    #[tokio::test]
    async fn test_default_session_and_notification() {
        let response = echo_router()
            .oneshot(post(json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"}), None))
            .await
            .unwrap();
        assert_eq!(body_json(response).await["result"]["session"], "default");

        let response = echo_router()
            .oneshot(post(json!({"jsonrpc": "2.0", "method": "notifications/initialized"}), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
    }

    #[tokio::test]
    async fn test_malformed_body() {
        let request = Request::builder()
            .method("POST")
            .uri("/mcp")
            .body(Body::from("{not json"))
            .unwrap();
        let response = echo_router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"]["code"], PARSE_ERROR);
    }
}
