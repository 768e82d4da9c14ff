//! HTTP route handlers.

use std::sync::Arc;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::{Map, Value, json};

use crate::bridge::{Bridge, BridgeError};

/// MCP protocol revision sent in the initialize handshake.
const PROTOCOL_VERSION: &str = "2024-11-05";

#[derive(Debug, Deserialize)]
pub struct CallToolRequest {
    pub name: String,
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct ReadResourceRequest {
    pub uri: String,
}

fn handshake_params() -> Map<String, Value> {
    let mut params = Map::new();
    params.insert(
        "protocolVersion".to_string(),
        Value::String(PROTOCOL_VERSION.to_string()),
    );
    params.insert(
        "capabilities".to_string(),
        json!({"tools": {}, "resources": {}}),
    );
    params.insert(
        "clientInfo".to_string(),
        json!({"name": env!("CARGO_PKG_NAME"), "version": env!("CARGO_PKG_VERSION")}),
    );
    params
}

/// Liveness of the relay itself. Never touches the bridge, so it keeps
/// answering while the MCP server is down or restarting.
async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn initialize(State(bridge): State<Arc<Bridge>>) -> Response {
    proxy(bridge, "initialize", Some(handshake_params())).await
}

async fn list_tools(State(bridge): State<Arc<Bridge>>) -> Response {
    proxy(bridge, "tools/list", None).await
}

async fn call_tool(
    State(bridge): State<Arc<Bridge>>,
    Json(request): Json<CallToolRequest>,
) -> Response {
    let mut params = Map::new();
    params.insert("name".to_string(), Value::String(request.name));
    params.insert("arguments".to_string(), Value::Object(request.arguments));
    proxy(bridge, "tools/call", Some(params)).await
}

async fn list_resources(State(bridge): State<Arc<Bridge>>) -> Response {
    proxy(bridge, "resources/list", None).await
}

async fn read_resource(
    State(bridge): State<Arc<Bridge>>,
    Json(request): Json<ReadResourceRequest>,
) -> Response {
    let mut params = Map::new();
    params.insert("uri".to_string(), Value::String(request.uri));
    proxy(bridge, "resources/read", Some(params)).await
}

/// Forwards one method call through the bridge and shapes the outcome as an
/// HTTP response. Successful calls return the full JSON-RPC envelope, so
/// application-level `error` members pass through with status 200.
async fn proxy(bridge: Arc<Bridge>, method: &str, params: Option<Map<String, Value>>) -> Response {
    match bridge.call(method, params).await {
        Ok(response) => Json(response).into_response(),
        Err(error) => bridge_error(error).into_response(),
    }
}

fn bridge_error(error: BridgeError) -> (StatusCode, Json<Value>) {
    let kind = match &error {
        BridgeError::Startup(_) => "startup",
        BridgeError::Communication(_) => "communication",
    };
    tracing::error!(kind, error = %error, "Bridge call failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"error": kind, "detail": error.to_string()})),
    )
}

pub fn routes(bridge: Arc<Bridge>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/mcp/initialize", post(initialize))
        .route("/mcp/tools/list", get(list_tools))
        .route("/mcp/tools/call", post(call_tool))
        .route("/mcp/resources/list", get(list_resources))
        .route("/mcp/resources/read", post(read_resource))
        .with_state(bridge)
}
