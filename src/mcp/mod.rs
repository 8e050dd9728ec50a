//! MCP server surface.
//!
//! `MapiServer` implements the rmcp `ServerHandler`: tool listing and tool calls
//! are delegated to the `ToolDispatcher`, dispatch errors become JSON-RPC errors.
//! A scanner that exits non-zero is not an error here; it comes back as a normal
//! tool result labeled as a failure.

pub mod dispatch;

use std::sync::Arc;

use rmcp::model::{
    CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam,
    ServerCapabilities, ServerInfo,
};
use rmcp::service::RequestContext;
use rmcp::{ErrorData as McpError, RoleServer, ServerHandler};

use crate::config::ServerConfig;
pub use dispatch::{ToolDispatcher, ToolError};

const INSTRUCTIONS: &str = "MAPI Server runs the mapi API security scanner. \
Use 'discover' to find API specifications on a host, 'run' to fuzz an API from its \
specification, and 'defect_list' to list the defects of a finished run.";

impl From<ToolError> for McpError {
    fn from(err: ToolError) -> Self {
        match err {
            ToolError::Validation(_) | ToolError::UnknownTool(_) => {
                McpError::invalid_params(err.to_string(), None)
            }
            ToolError::Runner(_)
            | ToolError::Io { .. }
            | ToolError::Encode(_)
            | ToolError::Schema(_) => {
                McpError::internal_error(err.to_string(), None)
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct MapiServer {
    dispatcher: ToolDispatcher,
}

impl MapiServer {
    pub fn new(config: Arc<ServerConfig>) -> Self {
        Self {
            dispatcher: ToolDispatcher::new(config),
        }
    }
}

impl ServerHandler for MapiServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(INSTRUCTIONS.into()),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        Ok(ListToolsResult {
            tools: self.dispatcher.list_tools()?,
            next_cursor: None,
        })
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let name = request.name;
        self.dispatcher
            .dispatch(&name, request.arguments)
            .await
            .map_err(|e| {
                tracing::warn!(tool = %name, "tool call rejected: {e}");
                McpError::from(e)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapi::ValidationError;

    #[test]
    fn error_codes() {
        let err: McpError = ToolError::UnknownTool("nope".into()).into();
        assert_eq!(err.code, rmcp::model::ErrorCode::INVALID_PARAMS);
        assert!(err.message.contains("unknown tool: nope"));

        let err: McpError = ToolError::Validation(ValidationError::Empty { field: "host" }).into();
        assert_eq!(err.code, rmcp::model::ErrorCode::INVALID_PARAMS);

        let err: McpError = ToolError::Io {
            context: "cannot list /x".into(),
            source: std::io::Error::other("boom"),
        }
        .into();
        assert_eq!(err.code, rmcp::model::ErrorCode::INTERNAL_ERROR);

        let err: McpError = ToolError::Schema("run").into();
        assert_eq!(err.code, rmcp::model::ErrorCode::INTERNAL_ERROR);
    }
}
