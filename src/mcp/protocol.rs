//! JSON-RPC message construction and typed response parsing.

use super::error::McpError;
use rust_mcp_schema::schema_utils::ServerMessage;
use rust_mcp_schema::{
    CallToolResult, ClientCapabilities, Implementation, InitializeRequestParams, InitializeResult,
    ListToolsResult, PaginatedRequestParams, LATEST_PROTOCOL_VERSION,
};
use serde_json::Value;

pub(crate) fn client_details() -> InitializeRequestParams {
    InitializeRequestParams {
        capabilities: ClientCapabilities::default(),
        client_info: Implementation {
            name: "toolgate".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            title: Some("Toolgate MCP Client".to_string()),
            description: Some("Toolgate MCP session gateway".to_string()),
            icons: Vec::new(),
            website_url: Some("https://github.com/permacommons/toolgate".to_string()),
        },
        meta: None,
        protocol_version: LATEST_PROTOCOL_VERSION.to_string(),
    }
}

pub(crate) fn paginated_params(cursor: Option<String>) -> Option<PaginatedRequestParams> {
    cursor.map(|cursor| PaginatedRequestParams {
        cursor: Some(cursor),
        meta: None,
    })
}

pub(crate) fn parse_initialize_result(message: ServerMessage) -> Result<InitializeResult, McpError> {
    let value = parse_response_value(message)?;
    let result = serde_json::from_value::<InitializeResult>(value)
        .map_err(|err| McpError::Transport(err.to_string()))?;
    if result.protocol_version.trim().is_empty() {
        return Err(McpError::Transport(
            "unexpected initialize response".to_string(),
        ));
    }
    Ok(result)
}

pub(crate) fn parse_list_tools(message: ServerMessage) -> Result<ListToolsResult, McpError> {
    parse_response(message)
}

pub(crate) fn parse_call_tool(message: ServerMessage) -> Result<CallToolResult, McpError> {
    parse_response(message)
}

fn parse_response<T: serde::de::DeserializeOwned>(message: ServerMessage) -> Result<T, McpError> {
    let value = parse_response_value(message)?;
    serde_json::from_value::<T>(value).map_err(|err| McpError::Transport(err.to_string()))
}

pub(crate) fn parse_response_value(message: ServerMessage) -> Result<Value, McpError> {
    match message {
        ServerMessage::Response(response) => serde_json::to_value(&response.result)
            .map_err(|err| McpError::Transport(err.to_string())),
        ServerMessage::Error(error) => Err(McpError::from_rpc(&error.error)),
        other => Err(McpError::Transport(format!(
            "unexpected MCP server message: {other:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_initialize_rejects_blank_protocol_version() {
        let message = serde_json::from_value(serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": {
                "capabilities": {},
                "protocolVersion": " ",
                "serverInfo": {"name": "x", "version": "1.0.0"}
            }
        }))
        .expect("message should parse");

        assert!(parse_initialize_result(message).is_err());
    }

    #[test]
    fn parse_response_surfaces_rpc_errors_with_code() {
        let message = serde_json::from_value(serde_json::json!({
            "jsonrpc": "2.0",
            "id": 2,
            "error": {"code": -32601, "message": "Method not found"}
        }))
        .expect("message should parse");

        match parse_response_value(message) {
            Err(McpError::Rpc { code, .. }) => assert_eq!(code, -32601),
            other => panic!("expected Rpc error, got {other:?}"),
        }
    }

    #[test]
    fn parse_list_tools_reads_tool_names() {
        let message = serde_json::from_value(serde_json::json!({
            "jsonrpc": "2.0",
            "id": 3,
            "result": {
                "tools": [
                    {"name": "add", "inputSchema": {"type": "object"}},
                    {"name": "lookup", "inputSchema": {"type": "object"}}
                ]
            }
        }))
        .expect("message should parse");

        let list = parse_list_tools(message).expect("tools should parse");
        let names: Vec<&str> = list.tools.iter().map(|tool| tool.name.as_str()).collect();
        assert_eq!(names, vec!["add", "lookup"]);
    }
}
