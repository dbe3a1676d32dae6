//! Request and response values exchanged between the router, the stores and
//! the network transport.

use bytes::Bytes;
use url::Url;

use crate::cache::hash::compute_request_key;

/// How the requester initiated the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestMode {
    /// Top-level page load.
    Navigate,
    #[default]
    SameOrigin,
    Cors,
    NoCors,
}

/// An intercepted request.
///
/// Identity is method + URL. The fragment is never part of a request; the
/// query string is. A body only travels with passthrough requests and is
/// never part of the identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    method: String,
    url: Url,
    mode: RequestMode,
    body: Option<Bytes>,
}

impl Request {
    pub fn new(method: &str, mut url: Url, mode: RequestMode) -> Self {
        url.set_fragment(None);
        Self { method: method.trim().to_ascii_uppercase(), url, mode, body: None }
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Subresource GET request.
    pub fn get(url: Url) -> Self {
        Self::new("GET", url, RequestMode::SameOrigin)
    }

    /// Top-level navigation request.
    pub fn navigate(url: Url) -> Self {
        Self::new("GET", url, RequestMode::Navigate)
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn mode(&self) -> RequestMode {
        self.mode
    }

    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    pub fn is_get(&self) -> bool {
        self.method == "GET"
    }

    pub fn is_navigation(&self) -> bool {
        self.mode == RequestMode::Navigate
    }

    /// Store key for this request.
    pub fn cache_key(&self) -> String {
        compute_request_key(&self.method, self.url.as_str())
    }
}

impl std::fmt::Display for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

/// A response produced by the network or read back from a store.
///
/// The body is an immutable shared buffer, so a clone is an independent,
/// separately consumable snapshot of the same bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub url: Option<String>,
    pub status: u16,
    pub status_text: String,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl Response {
    /// A 200 response with the given body.
    pub fn ok_with(body: impl Into<Bytes>) -> Self {
        Self { url: None, status: 200, status_text: "OK".into(), headers: Vec::new(), body: body.into() }
    }

    pub fn with_status(mut self, status: u16, status_text: &str) -> Self {
        self.status = status;
        self.status_text = status_text.to_string();
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_ascii_lowercase(), value.to_string()));
        self
    }

    /// Whether the status is in the 2xx range.
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    /// Copy to hand to the store while the original goes to the requester.
    pub fn snapshot(&self) -> Self {
        self.clone()
    }
}
