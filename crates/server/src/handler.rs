//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the worker and the cache admin tools.
use std::sync::Arc;

use crate::tools::{
    cache::{CachePurgeParams, list_impl, purge_impl},
    worker::{
        WorkerDetachParams, WorkerFetchParams, WorkerMessageParams, activate_impl, detach_impl, fetch_impl, install_impl,
        message_impl,
    },
};

use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};
use shellcache_client::Worker;

/// The main MCP server handler for shellcache.
#[derive(Clone)]
pub struct ShellcacheServer {
    tool_router: ToolRouter<Self>,
    worker: Arc<Worker>,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl ShellcacheServer {
    /// Create a new server handler around one worker generation.
    pub fn new(worker: Arc<Worker>) -> Self {
        Self { tool_router: Self::tool_router(), worker }
    }

    #[tool(description = "Install the worker: precache the shell into this generation's shell partition.")]
    async fn worker_install(&self) -> Result<CallToolResult, McpError> {
        install_impl(&self.worker).await
    }

    #[tool(description = "Activate the installed worker: delete partitions of other generations and claim all clients.")]
    async fn worker_activate(&self) -> Result<CallToolResult, McpError> {
        activate_impl(&self.worker).await
    }

    /// Route one intercepted request.
    ///
    /// Non-GET requests, and every request before activation, come back
    /// unhandled so the host performs them itself.
    #[tool(
        description = "Intercept a request. Returns the worker's response, or handled=false when the host should fetch it directly."
    )]
    async fn worker_fetch(&self, params: Parameters<WorkerFetchParams>) -> Result<CallToolResult, McpError> {
        fetch_impl(&self.worker, params.0).await
    }

    #[tool(description = "Forget a closed page so later activations no longer claim it.")]
    async fn worker_detach(&self, params: Parameters<WorkerDetachParams>) -> Result<CallToolResult, McpError> {
        detach_impl(&self.worker, params.0).await
    }

    #[tool(
        description = "Post a message to the worker, e.g. {\"kind\": \"precache-resource\", \"url\": \"./words.json\"} or {\"kind\": \"precache-default-resource\"}."
    )]
    async fn worker_message(&self, params: Parameters<WorkerMessageParams>) -> Result<CallToolResult, McpError> {
        message_impl(&self.worker, params.0).await
    }

    #[tool(description = "List cache partitions with entry counts and the worker's generation and state.")]
    async fn cache_list(&self) -> Result<CallToolResult, McpError> {
        list_impl(&self.worker).await
    }

    #[tool(description = "Delete one cache partition by name, or every partition with all=true.")]
    async fn cache_purge(&self, params: Parameters<CachePurgeParams>) -> Result<CallToolResult, McpError> {
        purge_impl(self.worker.db(), params.0).await
    }
}

impl ServerHandler for ShellcacheServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "shellcache".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}
