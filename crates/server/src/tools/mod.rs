//! MCP tool implementations.
//!
//! This module contains all tools exposed by the offcache worker host.

pub mod cache;
pub mod fetch;
pub mod lifecycle;
pub mod message;

use offcache_core::{Error, Response};
use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A response as reported to the host.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ResponseView {
    pub url: Option<String>,
    pub status: u16,
    pub status_text: String,
    pub content_type: Option<String>,
    pub headers: Vec<(String, String)>,
    /// Body as text, when it is valid UTF-8.
    pub body: Option<String>,
    pub body_bytes: usize,
}

impl From<&Response> for ResponseView {
    fn from(response: &Response) -> Self {
        Self {
            url: response.url.clone(),
            status: response.status,
            status_text: response.status_text.clone(),
            content_type: response.content_type().map(str::to_string),
            headers: response.headers.clone(),
            body: std::str::from_utf8(&response.body).ok().map(str::to_string),
            body_bytes: response.body.len(),
        }
    }
}

/// Serialize a tool output as the single text content of a successful result.
pub(crate) fn json_result<T: Serialize>(output: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize output: {e}")))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}
