//! Environment-driven configuration.

use std::time::Duration;

use crate::process::ServerCommand;
use crate::transport::ServerConfig;

/// Invalid environment values. Fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid {variable}: {value:?} is not {expected}")]
    Invalid {
        variable: &'static str,
        value: String,
        expected: &'static str,
    },

    #[error("{variable} must not be empty")]
    Empty { variable: &'static str },
}

/// Everything the binary needs to come up, resolved from the environment.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub server_command: ServerCommand,
    pub http: ServerConfig,
    /// Bound on each response wait. `None` waits indefinitely.
    pub response_timeout: Option<Duration>,
}

impl RelayConfig {
    /// Reads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads configuration through `lookup`, `None` meaning unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let host = lookup("MCP_SERVER_HOST").unwrap_or_else(|| "jenkins-mcp-server".to_string());

        let command_line = lookup("MCP_SERVER_COMMAND")
            .unwrap_or_else(|| format!("docker exec -i {host} python3 -m mcp_server.server"));
        let server_command = ServerCommand::parse(&command_line).ok_or(ConfigError::Empty {
            variable: "MCP_SERVER_COMMAND",
        })?;

        let defaults = ServerConfig::default();
        let http = ServerConfig {
            host: lookup("PROXY_HOST").unwrap_or(defaults.host),
            port: parse_var(&lookup, "PROXY_PORT", defaults.port, "a port number")?,
        };

        let timeout_secs = parse_var(
            &lookup,
            "MCP_RESPONSE_TIMEOUT_SECS",
            30u64,
            "a number of seconds",
        )?;
        let response_timeout = (timeout_secs != 0).then(|| Duration::from_secs(timeout_secs));

        Ok(Self {
            server_command,
            http,
            response_timeout,
        })
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    variable: &'static str,
    default: T,
    expected: &'static str,
) -> Result<T, ConfigError> {
    match lookup(variable) {
        Some(value) => value.parse().map_err(|_| ConfigError::Invalid {
            variable,
            value,
            expected,
        }),
        None => Ok(default),
    }
}
