//! MCP server handler implementation.
//!
//! The host delivers lifecycle events, intercepted requests and control
//! messages to one worker, and exposes its stores for inspection.
use std::sync::Arc;

use crate::tools::{
    cache::{CacheGetParams, get_impl, list_impl},
    fetch::{SwFetchParams, fetch_impl},
    lifecycle::{activate_impl, install_impl, register_impl, status_impl},
    message::{SwMessageParams, message_impl},
};

use offcache_client::{ControlPoster, Worker};
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

/// MCP handler hosting one offline cache worker.
#[derive(Clone)]
pub struct WorkerHost {
    worker: Arc<Worker>,
    control: ControlPoster,
    tool_router: ToolRouter<Self>,
}

/// Tool router implementation using the #[tool_router] macro.
#[tool_router]
impl WorkerHost {
    pub fn new(worker: Arc<Worker>, control: ControlPoster) -> Self {
        Self { worker, control, tool_router: Self::tool_router() }
    }

    #[tool(description = "Register the worker: install the current generation, then activate it immediately if it \
                          requested to skip waiting.")]
    async fn sw_register(&self) -> Result<CallToolResult, McpError> {
        register_impl(&self.worker).await
    }

    #[tool(description = "Deliver the install event: populate the current generation's store with every manifest \
                          entry, all-or-nothing.")]
    async fn sw_install(&self) -> Result<CallToolResult, McpError> {
        install_impl(&self.worker).await
    }

    #[tool(description = "Deliver the activate event: delete stale generations and start controlling clients.")]
    async fn sw_activate(&self) -> Result<CallToolResult, McpError> {
        activate_impl(&self.worker).await
    }

    /// Route one request through the worker.
    ///
    /// Navigations are network-first, other GETs stale-while-revalidate, and
    /// non-GET or API requests go straight to the network.
    #[tool(description = "Route a request through the worker. Returns the response and whether it came from the \
                          network, the cache, the offline page, passthrough, or an uncontrolled bypass.")]
    async fn sw_fetch(&self, params: Parameters<SwFetchParams>) -> Result<CallToolResult, McpError> {
        fetch_impl(&self.worker, params.0).await
    }

    #[tool(description = "Post a control message to the worker without waiting for it. \"SKIP_WAITING\" activates \
                          a waiting worker; anything else is ignored.")]
    async fn sw_message(&self, params: Parameters<SwMessageParams>) -> Result<CallToolResult, McpError> {
        message_impl(&self.control, params.0)
    }

    #[tool(description = "Report the worker's lifecycle state, generation, store name and pending background work.")]
    async fn sw_status(&self) -> Result<CallToolResult, McpError> {
        status_impl(&self.worker).await
    }

    #[tool(description = "Look up one request in the current generation's store.")]
    async fn cache_get(&self, params: Parameters<CacheGetParams>) -> Result<CallToolResult, McpError> {
        get_impl(&self.worker, params.0).await
    }

    #[tool(description = "List every store with the worker's prefix and its entry count.")]
    async fn cache_list(&self) -> Result<CallToolResult, McpError> {
        list_impl(&self.worker).await
    }
}

impl ServerHandler for WorkerHost {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "offcache-worker".into(),
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::worker;
    use offcache_client::ControlChannel;

    #[tokio::test]
    async fn test_every_tool_is_listed() {
        let (worker, _fetcher) = worker(true).await;
        let channel = ControlChannel::spawn(worker.clone());
        let host = WorkerHost::new(worker, channel.poster());

        let mut names: Vec<String> = host.tool_router.list_all().into_iter().map(|t| t.name.to_string()).collect();
        names.sort();

        assert_eq!(
            names,
            vec![
                "cache_get",
                "cache_list",
                "sw_activate",
                "sw_fetch",
                "sw_install",
                "sw_message",
                "sw_register",
                "sw_status"
            ]
        );

        drop(host);
        channel.close().await;
    }
}
