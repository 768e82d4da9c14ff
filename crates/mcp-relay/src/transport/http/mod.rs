//! HTTP transport: axum routes in front of the bridge.

pub mod routes;
pub mod server;

pub use server::{ServerConfig, serve};
