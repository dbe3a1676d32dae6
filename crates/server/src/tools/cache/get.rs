//! cache_get tool implementation.
//!
//! Looks up one request in the current generation's store.

use offcache_client::{Worker, resolve};
use offcache_core::{Error, Request, RequestMode};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::HostError;
use crate::tools::{ResponseView, json_result};

/// Parameters for the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetParams {
    /// Absolute URL or path relative to the configured origin.
    pub url: String,

    /// HTTP method of the stored request (default: GET).
    #[serde(default = "default_method")]
    pub method: String,
}

fn default_method() -> String {
    "GET".into()
}

/// Output from the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetOutput {
    pub cache_name: String,
    pub response: ResponseView,
}

/// Implementation of the cache_get tool.
pub async fn get_impl(worker: &Worker, params: CacheGetParams) -> Result<CallToolResult, McpError> {
    let origin = worker.config().origin_url().map_err(Error::from)?;
    let url = resolve(&origin, &params.url).map_err(HostError::from)?;
    let request = Request::new(&params.method, url, RequestMode::SameOrigin);

    let cache = worker.cache();
    let response = cache
        .get(&request)
        .await?
        .ok_or_else(|| Error::CacheMiss(request.to_string()))?;

    json_result(&CacheGetOutput { cache_name: cache.name().to_string(), response: ResponseView::from(&response) })
}
