//! Structured errors for tool parameters the worker never sees.

use rmcp::model::{ErrorCode, ErrorData as McpError};

/// Errors raised by the host before a call reaches the worker.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    /// Invalid input parameters (e.g., an empty method).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// The request target could not be resolved against the origin.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(#[from] offcache_client::UrlError),
}

impl From<HostError> for McpError {
    fn from(err: HostError) -> Self {
        let code = match &err {
            HostError::InvalidInput(_) => -32602,
            HostError::InvalidUrl(_) => -32003,
        };

        McpError { code: ErrorCode(code), message: err.to_string().into(), data: None }
    }
}
