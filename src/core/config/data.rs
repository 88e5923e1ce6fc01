use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Connect timeout applied to an endpoint that does not set its own.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Upper bound on a single tool invocation, unless overridden in config.
pub const DEFAULT_CALL_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct McpEndpointConfig {
    /// Endpoint address, e.g. "localhost:7001" or "http://tools.internal:7001".
    /// A bare host:port is treated as http.
    pub host: String,
    /// Handshake deadline for this endpoint, in seconds.
    pub connect_timeout_secs: Option<u64>,
    pub enabled: Option<bool>,
}

impl McpEndpointConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            connect_timeout_secs: None,
            enabled: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(
            self.connect_timeout_secs
                .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS),
        )
    }
}

#[derive(Debug, Serialize, Deserialize, Default, Clone)]
pub struct Config {
    /// Tool-provider endpoints, connected in declaration order.
    #[serde(default)]
    pub mcp_endpoints: Vec<McpEndpointConfig>,
    /// Upper bound on a single tool invocation, in seconds.
    pub call_timeout_secs: Option<u64>,
}

impl Config {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs.unwrap_or(DEFAULT_CALL_TIMEOUT_SECS))
    }
}
