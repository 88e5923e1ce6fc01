//! Transport-aware tool-call dispatch.
//!
//! One failed tool must never abort the surrounding conversation turn, so
//! the dispatcher converts every failure into a structured result value. A
//! transport-closed failure gets one chance at redemption: force a
//! reconnect through the session manager and replay the call.

use super::error::McpError;
use super::manager::SessionLifecycle;
use super::tools::ToolInvoker;
use crate::core::correlation;
use futures_util::future::BoxFuture;
use serde_json::{Map, Value};
use tracing::{error, info, warn};

/// Callback run after a successful mid-dispatch reconnect, e.g. to refresh
/// cached tool handles. Reconnect issues new sessions, so handles backed by
/// the old ones are dead.
pub type ReconnectHook = Box<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// One tool invocation as requested by the conversation loop.
#[derive(Debug, Clone)]
pub struct ToolCallRequest {
    pub call_id: String,
    pub arguments: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolCallOutcome {
    Success { content: String },
    Failure { message: String, retried: bool },
}

/// Structured result of one dispatch; returned synchronously, never persisted.
#[derive(Debug, Clone)]
pub struct ToolCallResult {
    pub tool_name: String,
    pub call_id: String,
    pub outcome: ToolCallOutcome,
}

impl ToolCallResult {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, ToolCallOutcome::Success { .. })
    }

    /// The text handed back to the conversation loop: tool output on
    /// success, the error-flavored message otherwise.
    pub fn content(&self) -> &str {
        match &self.outcome {
            ToolCallOutcome::Success { content } => content,
            ToolCallOutcome::Failure { message, .. } => message,
        }
    }
}

/// Invoke `tool` with bounded, transport-aware retry.
///
/// Attempts run strictly sequentially, `max_retries + 1` at most. Only a
/// [`McpError::TransportClosed`] failure triggers a retry, and only after
/// `manager.reconnect()` reports success; `max_retries = 0` disables retry
/// entirely. All failures come back as a [`ToolCallOutcome::Failure`] value.
pub async fn dispatch_tool_call(
    manager: &dyn SessionLifecycle,
    tool: &dyn ToolInvoker,
    request: &ToolCallRequest,
    tool_name: &str,
    max_retries: u32,
    on_reconnect: Option<&ReconnectHook>,
    correlation_id: Option<String>,
) -> ToolCallResult {
    let correlation_id = correlation_id.unwrap_or_else(correlation::generate_id);
    info!(
        correlation_id = %correlation_id,
        tool_name = %tool_name,
        tool_call_id = %request.call_id,
        "mcp_tool_call_started"
    );

    let mut attempt: u32 = 0;
    loop {
        match tool.invoke(request.arguments.as_ref()).await {
            Ok(content) => {
                info!(
                    correlation_id = %correlation_id,
                    tool_name = %tool_name,
                    tool_call_id = %request.call_id,
                    attempt = attempt + 1,
                    "mcp_tool_call_successful"
                );
                return ToolCallResult {
                    tool_name: tool_name.to_string(),
                    call_id: request.call_id.clone(),
                    outcome: ToolCallOutcome::Success { content },
                };
            }
            Err(err) => {
                if err.is_transport_closed() && attempt < max_retries {
                    warn!(
                        correlation_id = %correlation_id,
                        tool_name = %tool_name,
                        tool_call_id = %request.call_id,
                        attempt = attempt + 1,
                        error = %err,
                        "mcp_connection_closed_retrying"
                    );
                    if manager.reconnect().await {
                        info!(
                            correlation_id = %correlation_id,
                            tool_name = %tool_name,
                            "mcp_reconnected_retrying_tool"
                        );
                        if let Some(hook) = on_reconnect {
                            hook().await;
                        }
                        attempt += 1;
                        continue;
                    }
                }

                error!(
                    correlation_id = %correlation_id,
                    tool_name = %tool_name,
                    tool_call_id = %request.call_id,
                    attempt = attempt + 1,
                    error = %err,
                    "mcp_tool_call_failed"
                );
                let mut message = format!("[ERROR] Tool '{tool_name}' failed: {err}");
                if err.is_transport_closed() {
                    message.push_str(" (MCP connection issue. Attempted reconnection.)");
                }
                return ToolCallResult {
                    tool_name: tool_name.to_string(),
                    call_id: request.call_id.clone(),
                    outcome: ToolCallOutcome::Failure {
                        message,
                        retried: attempt > 0,
                    },
                };
            }
        }
    }
}
