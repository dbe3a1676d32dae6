//! Strategy selection for intercepted requests.

use offcache_core::Request;
use serde::{Deserialize, Serialize};

/// Fetch strategy applied to one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    /// Straight to the network; the store is never read or written.
    Passthrough,
    /// Network first, store as fallback.
    NetworkFirst,
    /// Store first, refreshed from the network in the background.
    StaleWhileRevalidate,
}

/// Pick the strategy for a request.
///
/// Precedence: non-GET, then the reserved API prefix, then navigations, then
/// every other GET.
pub fn classify(request: &Request, api_prefix: &str) -> Route {
    if !request.is_get() || request.url().path().starts_with(api_prefix) {
        Route::Passthrough
    } else if request.is_navigation() {
        Route::NetworkFirst
    } else {
        Route::StaleWhileRevalidate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use offcache_core::RequestMode;
    use url::Url;

    fn url(path: &str) -> Url {
        Url::parse("http://127.0.0.1:8000").unwrap().join(path).unwrap()
    }

    #[test]
    fn test_non_get_passthrough() {
        let req = Request::new("POST", url("/static/index.html"), RequestMode::Navigate);
        assert_eq!(classify(&req, "/api/"), Route::Passthrough);
    }

    #[test]
    fn test_api_passthrough_even_for_navigation() {
        assert_eq!(classify(&Request::navigate(url("/api/golf/probability")), "/api/"), Route::Passthrough);
        assert_eq!(classify(&Request::get(url("/api/health")), "/api/"), Route::Passthrough);
    }

    #[test]
    fn test_api_prefix_requires_segment_boundary() {
        assert_eq!(classify(&Request::get(url("/apix/data.json")), "/api/"), Route::StaleWhileRevalidate);
        assert_eq!(classify(&Request::get(url("/static/api/x.js")), "/api/"), Route::StaleWhileRevalidate);
    }

    #[test]
    fn test_navigation_network_first() {
        assert_eq!(classify(&Request::navigate(url("/")), "/api/"), Route::NetworkFirst);
    }

    #[test]
    fn test_subresource_stale_while_revalidate() {
        let req = Request::new("GET", url("/static/images/icon-72.png"), RequestMode::NoCors);
        assert_eq!(classify(&req, "/api/"), Route::StaleWhileRevalidate);
    }
}
