//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the appropriate implementations.
use std::sync::Arc;

use crate::tools::{WebResearchParams, cache::purge_impl, research::research_impl};

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
use sift_client::Pipeline;

/// The main MCP server handler for sift.
#[derive(Clone)]
pub struct SiftServer {
    tool_router: ToolRouter<Self>,
    pipeline: Arc<Pipeline>,
}

#[tool_router]
impl SiftServer {
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        Self { tool_router: Self::tool_router(), pipeline }
    }

    /// Research a query across the configured search providers.
    ///
    /// Providers are tried in fallback order; result pages are fetched subject
    /// to robots.txt and domain policy, then deduplicated and ranked.
    #[tool(description = "Research a query across web search providers with automatic fallback. \
        Fetches result pages that crawl policy allows, extracts their text, removes duplicates and \
        returns the documents ranked by relevance together with a failure summary.")]
    async fn web_research(&self, params: Parameters<WebResearchParams>) -> Result<CallToolResult, McpError> {
        research_impl(&self.pipeline, params.0).await
    }

    /// Evict expired search, document and policy cache entries.
    #[tool(description = "Evict expired entries from the in-memory caches and the durable cache, \
        returning how many were removed from each tier.")]
    async fn cache_purge(&self) -> Result<CallToolResult, McpError> {
        purge_impl(&self.pipeline).await
    }
}

impl ServerHandler for SiftServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "sift".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            instructions: Some(
                "Use web_research to gather ranked source documents for a query. Check `degraded` and the \
                 summary before relying on sparse results."
                    .into(),
            ),
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
