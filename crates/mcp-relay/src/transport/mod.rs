//! Transport layer for mcp-relay.
//!
//! Currently provides HTTP transport via axum. The Bridge itself is
//! transport-agnostic, so other front ends can be added as submodules.

pub mod http;

pub use http::{ServerConfig, serve};
