//! Tool handles: callable proxies for remotely exposed tools.

use super::error::McpError;
use super::protocol;
use super::session::McpSession;
use async_trait::async_trait;
use rust_mcp_schema::schema_utils::RequestFromClient;
use rust_mcp_schema::{CallToolRequestParams, ListToolsResult, Tool};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::debug;

/// Hard cap on the merged tool list loaded from one endpoint.
pub const MAX_TOOL_LIST: usize = 100;

/// A single remotely exposed tool, invocable through its backing session.
#[async_trait]
pub trait ToolInvoker: Send + Sync {
    fn name(&self) -> &str;

    async fn invoke(&self, arguments: Option<&Map<String, Value>>) -> Result<String, McpError>;
}

/// A tool bound to the transport session that announced it.
#[derive(Debug)]
pub struct ToolHandle {
    tool: Tool,
    session: Arc<McpSession>,
}

impl ToolHandle {
    pub fn new(tool: Tool, session: Arc<McpSession>) -> Self {
        Self { tool, session }
    }

    pub fn description(&self) -> Option<&str> {
        self.tool.description.as_deref()
    }

    pub fn input_schema(&self) -> Value {
        serde_json::to_value(&self.tool.input_schema).unwrap_or(Value::Null)
    }

    pub fn endpoint(&self) -> &str {
        self.session.endpoint()
    }
}

#[async_trait]
impl ToolInvoker for ToolHandle {
    fn name(&self) -> &str {
        &self.tool.name
    }

    async fn invoke(&self, arguments: Option<&Map<String, Value>>) -> Result<String, McpError> {
        let mut params = CallToolRequestParams::new(&self.tool.name);
        if let Some(arguments) = arguments {
            params = params.with_arguments(arguments.clone());
        }
        let response = self
            .session
            .request(RequestFromClient::CallToolRequest(params))
            .await?;
        let result = protocol::parse_call_tool(response)?;
        serde_json::to_string_pretty(&result).map_err(|err| McpError::Transport(err.to_string()))
    }
}

/// Load the endpoint's tool list, following pagination cursors until the
/// list is exhausted or [`MAX_TOOL_LIST`] is reached.
pub async fn load_tools(session: &Arc<McpSession>) -> Result<Vec<Arc<ToolHandle>>, McpError> {
    let mut tools: Vec<Tool> = Vec::new();
    let mut cursor: Option<String> = None;

    loop {
        let response = session
            .request(RequestFromClient::ListToolsRequest(
                protocol::paginated_params(cursor.clone()),
            ))
            .await?;
        let mut page: ListToolsResult = protocol::parse_list_tools(response)?;
        tools.append(&mut page.tools);

        if tools.len() >= MAX_TOOL_LIST {
            debug!(
                endpoint = %session.endpoint(),
                "Tool list capped at {MAX_TOOL_LIST} entries"
            );
            tools.truncate(MAX_TOOL_LIST);
            break;
        }
        match page.next_cursor {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }

    Ok(tools
        .into_iter()
        .map(|tool| Arc::new(ToolHandle::new(tool, Arc::clone(session))))
        .collect())
}
