//! The stdio bridge: serialized JSON-RPC calls into the MCP server process.
//!
//! # Architecture
//!
//! - **protocol**: request/response line types and the id counter
//! - **codec**: newline-delimited JSON framing for AsyncRead/AsyncWrite
//! - [`Bridge`]: the exclusive `call` operation with crash recovery
//!
//! One mutex guards the whole write-then-read exchange, so at most one
//! request is in flight against the child at any time. A transport fault
//! poisons the pipe for every later call, so recovery is always
//! discard-and-respawn, never resynchronization.

pub mod codec;
pub mod protocol;

use std::time::Duration;

use serde_json::{Map, Value};
use tokio::sync::Mutex;

use crate::bridge::codec::JsonLineError;
use crate::bridge::protocol::{RequestCounter, RpcRequest, RpcResponse};
use crate::process::{ServerCommand, ServerHandle, ServerProcess, SpawnError};

/// Transport faults that can hit a call mid-flight. Each one poisons the
/// request/response stream and triggers a restart.
#[derive(Debug, thiserror::Error)]
pub enum CallFault {
    #[error("failed to send request: {0}")]
    Send(#[source] JsonLineError),

    #[error("no response from server (stdout closed)")]
    NoResponse,

    #[error("no response from server within {0:?}")]
    Timeout(Duration),

    #[error("malformed response line: {0}")]
    Malformed(#[source] serde_json::Error),

    #[error("failed to read response: {0}")]
    Read(#[source] std::io::Error),

    #[error("response id {received} does not match request id {sent}")]
    IdMismatch { sent: u64, received: u64 },
}

/// What callers of [`Bridge::call`] see.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// The implicit startup at the top of a call failed. No request was
    /// sent and no restart is attempted.
    #[error("failed to start MCP server: {0}")]
    Startup(#[from] SpawnError),

    /// The exchange faulted mid-call. The server has already been restarted
    /// (best effort), so the next call may succeed.
    #[error("MCP server communication error: {0}")]
    Communication(#[from] CallFault),
}

/// Serializes JSON-RPC calls into the MCP server and heals the stream after
/// faults.
///
/// Construct one per served process and share it behind an `Arc`; every
/// caller funnels through the internal mutex in arrival order.
pub struct Bridge {
    state: Mutex<BridgeState>,
    response_timeout: Option<Duration>,
}

struct BridgeState {
    handle: ServerHandle,
    ids: RequestCounter,
}

impl Bridge {
    pub fn new(command: ServerCommand) -> Self {
        Self {
            state: Mutex::new(BridgeState {
                handle: ServerHandle::new(command),
                ids: RequestCounter::new(),
            }),
            response_timeout: None,
        }
    }

    /// Bounds the wait for each response line. Expiry is a fault and takes
    /// the same restart path as EOF.
    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = Some(timeout);
        self
    }

    /// Starts the server process if it is not already running.
    pub async fn start(&self) -> Result<(), SpawnError> {
        self.state.lock().await.handle.start().map(|_| ())
    }

    /// Stops the server process. Idempotent.
    pub async fn stop(&self) {
        self.state.lock().await.handle.stop().await;
    }

    /// Liveness of the server process, without blocking.
    pub async fn is_running(&self) -> bool {
        self.state.lock().await.handle.is_running()
    }

    /// Sends `method` with `params` (empty object when `None`) and returns
    /// the server's response line for it.
    ///
    /// The server is started lazily when no process is held. The response id
    /// must equal the request id; a stale line (for example one left behind
    /// by a caller that went away mid-exchange) therefore surfaces as a
    /// fault instead of being misattributed. After any fault the server is
    /// stopped and restarted before the error is returned, so the next call
    /// finds a clean stream.
    pub async fn call(
        &self,
        method: &str,
        params: Option<Map<String, Value>>,
    ) -> Result<RpcResponse, BridgeError> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        let process = state.handle.start()?;
        let id = state.ids.next_id();
        let request = RpcRequest::new(id, method, params);

        tracing::debug!(id, method, "Forwarding request to MCP server");
        match Self::exchange(process, request, self.response_timeout).await {
            Ok(response) => {
                tracing::debug!(id, "Response received");
                Ok(response)
            }
            Err(fault) => {
                tracing::warn!(id, error = %fault, "MCP server fault, restarting");
                state.handle.restart().await;
                Err(BridgeError::Communication(fault))
            }
        }
    }

    /// One write-then-read exchange against the running process.
    async fn exchange(
        process: &mut ServerProcess,
        request: RpcRequest,
        timeout: Option<Duration>,
    ) -> Result<RpcResponse, CallFault> {
        let id = request.id;
        process.send(request).await.map_err(CallFault::Send)?;

        let line = match timeout {
            Some(limit) => tokio::time::timeout(limit, process.recv())
                .await
                .map_err(|_| CallFault::Timeout(limit))?,
            None => process.recv().await,
        };

        let response = match line {
            Some(Ok(response)) => response,
            Some(Err(JsonLineError::Json(error))) => return Err(CallFault::Malformed(error)),
            Some(Err(JsonLineError::Io(error))) => return Err(CallFault::Read(error)),
            None => return Err(CallFault::NoResponse),
        };

        if response.id != id {
            return Err(CallFault::IdMismatch {
                sent: id,
                received: response.id,
            });
        }

        Ok(response)
    }
}
