//! mcp-relay binary: load config, bring the MCP server up, serve HTTP.

use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use mcp_relay::bridge::Bridge;
use mcp_relay::config::RelayConfig;
use mcp_relay::transport;

/// Initialize tracing with RUST_LOG and LOG_FORMAT support.
fn init_tracing() {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::new("mcp_relay=info")
    };

    let use_json = std::env::var("LOG_FORMAT").as_deref() == Ok("json");

    if use_json {
        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr));
        let _ = subscriber.try_init();
    } else {
        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr));
        let _ = subscriber.try_init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = RelayConfig::from_env().context("invalid configuration")?;
    info!(command = %config.server_command, "Starting mcp-relay");

    let mut bridge = Bridge::new(config.server_command);
    if let Some(timeout) = config.response_timeout {
        bridge = bridge.with_response_timeout(timeout);
    }
    let bridge = Arc::new(bridge);

    // Fail fast when the MCP server cannot come up at all.
    bridge.start().await.context("failed to start MCP server")?;

    transport::serve(config.http, bridge).await
}
