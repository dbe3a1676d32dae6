//! Network transport abstraction.

use crate::Error;
use crate::http::{Request, Response};

/// Asynchronous network transport.
///
/// An HTTP error status is still a response; only a failure to obtain any
/// response is an `Err`. Implementations do not retry.
#[async_trait::async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(&self, request: &Request) -> Result<Response, Error>;
}
