//! Lifecycle tools: sw_register, sw_install, sw_activate, sw_status.

use offcache_client::Worker;
use rmcp::{ErrorData as McpError, model::CallToolResult};

use super::json_result;

/// Install, then activate if the worker asked to skip waiting.
pub async fn register_impl(worker: &Worker) -> Result<CallToolResult, McpError> {
    let registration = worker.register().await?;
    json_result(&registration)
}

pub async fn install_impl(worker: &Worker) -> Result<CallToolResult, McpError> {
    let report = worker.install().await?;
    json_result(&report)
}

pub async fn activate_impl(worker: &Worker) -> Result<CallToolResult, McpError> {
    let report = worker.activate().await?;
    json_result(&report)
}

pub async fn status_impl(worker: &Worker) -> Result<CallToolResult, McpError> {
    json_result(&worker.status().await)
}
