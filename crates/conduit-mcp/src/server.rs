// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! [`ConduitMcpServer`] — the rmcp `ServerHandler` implementation.
//!
//! Wraps the tool registry and driver and implements the MCP `tools/list`
//! and `tools/call` protocol methods; lifecycle methods (initialize,
//! shutdown, ping) are the rmcp defaults.  Request ids round-trip inside
//! rmcp.  Tool errors surface as envelopes, never as transport faults.

use std::sync::Arc;

use rmcp::{
    handler::server::ServerHandler,
    model::{
        CallToolRequestParams, CallToolResult, ListToolsResult, PaginatedRequestParams,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    ErrorData as McpError,
};
use serde_json::Map;
use tracing::debug;

use conduit_model::{registry, ErrorKind};
use conduit_tools::{ToolDriver, ToolOutput, ToolRegistry};

use crate::bridge::{output_to_call_result, schema_to_mcp_tool};

#[derive(Clone)]
pub struct ConduitMcpServer {
    registry: Arc<ToolRegistry>,
    driver: Arc<ToolDriver>,
}

impl ConduitMcpServer {
    pub fn new(registry: Arc<ToolRegistry>, driver: Arc<ToolDriver>) -> Self {
        Self { registry, driver }
    }

    /// Models currently available across configured providers; feeds the
    /// auto-mode schema enum.
    fn available_models(&self) -> Vec<String> {
        let mut reg = registry::global()
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        reg.available_models(true).into_keys().collect()
    }
}

impl ServerHandler for ConduitMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..ServerInfo::default()
        }
    }

    fn list_tools(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListToolsResult, McpError>> + Send + '_ {
        let auto_mode = self.driver.config().is_auto_mode();
        let models = if auto_mode {
            self.available_models()
        } else {
            Vec::new()
        };
        let registry = Arc::clone(&self.registry);
        async move {
            let tools = registry
                .schemas(auto_mode, &models)
                .into_iter()
                .map(schema_to_mcp_tool)
                .collect();
            Ok(ListToolsResult {
                tools,
                next_cursor: None,
                meta: None,
            })
        }
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let args = request
            .arguments
            .map(|m| serde_json::Value::Object(m.into_iter().collect()))
            .unwrap_or(serde_json::Value::Object(serde_json::Map::new()));

        debug!(tool = %request.name, "tool call received");

        let output = match self.registry.get(&request.name) {
            Some(tool) => self.driver.execute(tool.as_ref(), args).await,
            None => {
                let mut metadata = Map::new();
                metadata.insert("tool_name".into(), serde_json::json!(request.name));
                ToolOutput::error(
                    ErrorKind::InvalidRequest,
                    format!("unknown tool: {}", request.name),
                    metadata,
                )
            }
        };

        Ok(output_to_call_result(output))
    }
}
