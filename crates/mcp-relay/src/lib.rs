//! mcp-relay: HTTP façade for MCP servers that speak line-delimited
//! JSON-RPC 2.0 over stdio.
//!
//! The relay owns one child process and funnels every HTTP request through
//! the [`bridge::Bridge`], which serializes calls over the child's pipes and
//! restarts the child after transport faults.

pub mod bridge;
pub mod config;
pub mod process;
pub mod transport;

pub use bridge::{Bridge, BridgeError, CallFault};
pub use config::{ConfigError, RelayConfig};
pub use process::{ServerCommand, ServerHandle, ServerProcess, SpawnError};
pub use transport::{ServerConfig, serve};
