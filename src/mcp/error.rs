//! Error taxonomy for the MCP transport and session layers.
//!
//! `TransportClosed` is the only retryable kind: it signals that the remote
//! end dropped the stream underneath a call, which a reconnect can repair.
//! Everything else surfaces as-is.

use rust_mcp_schema::RpcError;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum McpError {
    /// The connect/handshake sequence did not complete within the endpoint's
    /// configured deadline.
    #[error("connect to {endpoint} timed out after {timeout:?}")]
    ConnectTimeout { endpoint: String, timeout: Duration },

    /// Generic I/O or protocol fault, including a tool call exceeding the
    /// configured per-call timeout.
    #[error("transport error: {0}")]
    Transport(String),

    /// The remote end closed the stream beneath the call.
    #[error("transport closed")]
    TransportClosed,

    /// The server answered with a JSON-RPC error frame.
    #[error("MCP error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// A resource was requested before a successful `initialize`.
    #[error("MCP session manager is not initialized")]
    NotInitialized,
}

impl McpError {
    pub fn is_transport_closed(&self) -> bool {
        matches!(self, McpError::TransportClosed)
    }

    pub(crate) fn from_rpc(error: &RpcError) -> Self {
        let mut message = error.message.clone();
        if let Some(data) = &error.data {
            let details = data
                .get("details")
                .and_then(|value| value.as_str())
                .map(|value| value.to_string())
                .or_else(|| data.as_str().map(|value| value.to_string()));
            if let Some(details) = details {
                if !details.is_empty() {
                    message.push_str(": ");
                    message.push_str(&details);
                }
            }
        }
        McpError::Rpc {
            code: error.code,
            message,
        }
    }
}
