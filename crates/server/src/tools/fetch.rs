//! sw_fetch tool implementation.
//!
//! Routes one request through the worker as if a page had issued it.

use offcache_client::{ResponseSource, Worker, resolve};
use offcache_core::{Request, RequestMode};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{ResponseView, json_result};
use crate::error::HostError;

/// Input parameters for the sw_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwFetchParams {
    /// Absolute URL or path relative to the configured origin.
    pub url: String,

    /// HTTP method (default: GET).
    #[serde(default = "default_method")]
    pub method: String,

    /// Treat the request as a top-level page navigation.
    #[serde(default)]
    pub navigate: bool,

    /// Request body, sent only with passthrough requests.
    #[serde(default)]
    pub body: Option<String>,
}

fn default_method() -> String {
    "GET".into()
}

/// Output structure for the sw_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwFetchOutput {
    /// The request as the worker saw it.
    pub request: String,
    pub source: ResponseSource,
    pub response: ResponseView,
}

/// Implementation of the sw_fetch tool.
pub async fn fetch_impl(worker: &Worker, params: SwFetchParams) -> Result<CallToolResult, McpError> {
    if params.method.trim().is_empty() {
        return Err(HostError::InvalidInput("method cannot be empty".into()).into());
    }

    let origin = worker.config().origin_url().map_err(offcache_core::Error::from)?;
    let url = resolve(&origin, &params.url).map_err(HostError::from)?;
    let mode = if params.navigate { RequestMode::Navigate } else { RequestMode::SameOrigin };

    let mut request = Request::new(&params.method, url, mode);
    if let Some(body) = params.body {
        request = request.with_body(body);
    }

    let label = request.to_string();
    let routed = worker.fetch(request).await?;

    json_result(&SwFetchOutput { request: label, source: routed.source, response: ResponseView::from(&routed.response) })
}
