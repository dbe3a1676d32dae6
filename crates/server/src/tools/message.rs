//! sw_message tool implementation.
//!
//! Posts a control message to the worker. Delivery is fire-and-forget: the
//! result only says the message was posted, not what the worker did with it.

use offcache_client::ControlPoster;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::json_result;

/// Input parameters for the sw_message tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwMessageParams {
    /// Message payload. The string "SKIP_WAITING" activates a waiting worker.
    pub message: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwMessageOutput {
    pub posted: bool,
}

pub fn message_impl(control: &ControlPoster, params: SwMessageParams) -> Result<CallToolResult, McpError> {
    control.post(params.message);
    json_result(&SwMessageOutput { posted: true })
}
