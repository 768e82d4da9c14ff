//! Wire protocol types for relay-server communication.
//!
//! One request line out, one response line back. Requests carry ids from a
//! strictly increasing counter; responses must echo the id they answer.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// JSON-RPC version stamped on every outbound request.
pub const JSONRPC_VERSION: &str = "2.0";

/// One outbound request line.
///
/// Field order is the wire order: `jsonrpc`, `id`, `method`, `params`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    pub jsonrpc: String,
    pub id: u64,
    pub method: String,
    pub params: Map<String, Value>,
}

impl RpcRequest {
    /// Builds a request. `params` defaults to an empty object when `None`.
    pub fn new(id: u64, method: impl Into<String>, params: Option<Map<String, Value>>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            method: method.into(),
            params: params.unwrap_or_default(),
        }
    }
}

/// One inbound response line.
///
/// `result` and `error` pass through unshaped; whether `error` means failure
/// is the caller's call, not the transport's. An explicit `null` member is
/// kept as `Some(Value::Null)` so it survives re-serialization; only members
/// the server never sent are omitted. A line without an integer `id` does not
/// parse as a response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    #[serde(default = "default_jsonrpc")]
    pub jsonrpc: String,
    pub id: u64,
    #[serde(
        default,
        deserialize_with = "deserialize_present",
        skip_serializing_if = "Option::is_none"
    )]
    pub result: Option<Value>,
    #[serde(
        default,
        deserialize_with = "deserialize_present",
        skip_serializing_if = "Option::is_none"
    )]
    pub error: Option<Value>,
}

fn default_jsonrpc() -> String {
    JSONRPC_VERSION.to_string()
}

// A member that appears on the wire is `Some`, even when its value is `null`.
// Absent members take the `default` path and stay `None`.
fn deserialize_present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

/// Produces request ids: 1, 2, 3... for the lifetime of the owning bridge.
///
/// Not internally synchronized. It lives under the bridge's mutex, which
/// already makes concurrent access impossible.
#[derive(Debug, Default)]
pub struct RequestCounter {
    last: u64,
}

impl RequestCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&mut self) -> u64 {
        self.last += 1;
        self.last
    }
}
