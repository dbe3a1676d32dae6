//! cache_list tool implementation.
//!
//! Lists every store carrying the worker's prefix, oldest first.

use offcache_client::Worker;
use offcache_core::CacheSummary;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::tools::json_result;

/// Output from the cache_list tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheListOutput {
    /// Store this generation reads and writes.
    pub current: String,
    pub caches: Vec<CacheSummary>,
}

pub async fn list_impl(worker: &Worker) -> Result<CallToolResult, McpError> {
    let caches = worker.caches().await?;
    json_result(&CacheListOutput { current: worker.cache().name().to_string(), caches })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::{output, worker};

    #[tokio::test]
    async fn test_list_before_install_is_empty() {
        let (worker, _fetcher) = worker(true).await;

        let json = output(&list_impl(&worker).await.unwrap());

        assert_eq!(json["current"], "golf-pwa-test");
        assert_eq!(json["caches"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_list_after_register_shows_single_generation() {
        let (worker, _fetcher) = worker(true).await;
        worker.register().await.unwrap();

        let json = output(&list_impl(&worker).await.unwrap());

        assert_eq!(json["caches"].as_array().unwrap().len(), 1);
        assert_eq!(json["caches"][0]["name"], "golf-pwa-test");
        assert_eq!(json["caches"][0]["entries"], 2);
    }
}
