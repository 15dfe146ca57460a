//! MCP server handler implementation.
//!
//! Routes tool calls to the implementations in [`crate::tools`]. Calls are
//! serialized through one [`DataContext`]; each starts with
//! [`DataContext::begin_request`].

use std::sync::Arc;

use dispatch_client::DataContext;
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
use tokio::sync::{Mutex, MutexGuard};

use crate::tools::cache::{CacheInvalidateParams, invalidate_impl, stats_impl};
use crate::tools::cells::{CellsUpdateParams, RowAppendParams, append_impl, update_impl};
use crate::tools::requests::{RequestIdParams, assignments_impl, request_find_impl};
use crate::tools::riders::{RiderFindParams, RidersListParams, active_count_impl, find_impl, list_impl};

/// The main MCP server handler for dispatch-mcp.
#[derive(Clone)]
pub struct McpDispatchServer {
    tool_router: ToolRouter<Self>,
    ctx: Arc<Mutex<DataContext>>,
}

#[tool_router]
impl McpDispatchServer {
    pub fn new(ctx: DataContext) -> Self {
        Self { tool_router: Self::tool_router(), ctx: Arc::new(Mutex::new(ctx)) }
    }

    async fn begin(&self) -> MutexGuard<'_, DataContext> {
        let mut ctx = self.ctx.lock().await;
        ctx.begin_request();
        ctx
    }

    #[tool(description = "List riders from the Riders sheet. Set active_only to count only riders with an active status.")]
    async fn riders_list(&self, params: Parameters<RidersListParams>) -> Result<CallToolResult, McpError> {
        list_impl(&mut *self.begin().await, params.0).await
    }

    #[tool(description = "Find a rider by ID, or by name (case-insensitive) when no ID matches. Includes the rider's assignments.")]
    async fn rider_find(&self, params: Parameters<RiderFindParams>) -> Result<CallToolResult, McpError> {
        find_impl(&mut *self.begin().await, params.0).await
    }

    #[tool(description = "Count riders whose status is one of the configured active statuses.")]
    async fn rider_active_count(&self) -> Result<CallToolResult, McpError> {
        active_count_impl(&mut *self.begin().await).await
    }

    #[tool(description = "Find a request row by its Request ID.")]
    async fn request_find(&self, params: Parameters<RequestIdParams>) -> Result<CallToolResult, McpError> {
        request_find_impl(&mut *self.begin().await, params.0).await
    }

    #[tool(description = "List the assignment rows that reference a Request ID.")]
    async fn assignments_for_request(&self, params: Parameters<RequestIdParams>) -> Result<CallToolResult, McpError> {
        assignments_impl(&mut *self.begin().await, params.0).await
    }

    #[tool(
        description = "Update cells in a table, either by 1-based coordinates or by column name for one row. Writes are coalesced and flushed once."
    )]
    async fn cells_update(&self, params: Parameters<CellsUpdateParams>) -> Result<CallToolResult, McpError> {
        update_impl(&mut *self.begin().await, params.0).await
    }

    #[tool(description = "Append a row after the last populated row of a table. Returns the new row number.")]
    async fn row_append(&self, params: Parameters<RowAppendParams>) -> Result<CallToolResult, McpError> {
        append_impl(&mut *self.begin().await, params.0).await
    }

    #[tool(description = "Drop cached data for one table and everything derived from it, or for all tables.")]
    async fn cache_invalidate(&self, params: Parameters<CacheInvalidateParams>) -> Result<CallToolResult, McpError> {
        invalidate_impl(&mut *self.begin().await, params.0)
    }

    #[tool(description = "Cache hit/miss counters, entry count and write settings.")]
    async fn cache_stats(&self) -> Result<CallToolResult, McpError> {
        stats_impl(&*self.begin().await)
    }
}

impl ServerHandler for McpDispatchServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "dispatch-mcp".into(),
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
