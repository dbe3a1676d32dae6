//! Request routing for a controlling worker.
//!
//! Every intercepted request is classified (see [`classify`]) and answered by
//! one of three strategies:
//!
//! - passthrough: network only, store untouched
//! - network-first: network, then the stored entry, then the offline document
//! - stale-while-revalidate: stored entry now, refreshed in the background
//!
//! Only 2xx responses are written to the store. Writes and revalidations run
//! as [`PendingWork`] so response delivery never waits on the store.

pub mod classify;
pub mod pending;

use std::sync::Arc;

use offcache_core::{CacheHandle, Error, Fetch, Request, Response};
use serde::{Deserialize, Serialize};
use url::Url;

pub use classify::{Route, classify};
pub use pending::PendingWork;

/// Where a routed response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ResponseSource {
    Network,
    Cache,
    Offline,
    Passthrough,
    /// The worker is not controlling clients yet; the request bypassed it.
    Uncontrolled,
}

/// A response together with how it was obtained.
#[derive(Debug, Clone)]
pub struct Routed {
    pub response: Response,
    pub source: ResponseSource,
}

impl Routed {
    fn new(response: Response, source: ResponseSource) -> Self {
        Self { response, source }
    }
}

/// Applies the routing policy against one generation's store.
#[derive(Clone)]
pub struct Router {
    cache: CacheHandle,
    fetcher: Arc<dyn Fetch>,
    api_prefix: String,
    offline: Request,
    pending: PendingWork,
}

impl Router {
    pub fn new(
        cache: CacheHandle, fetcher: Arc<dyn Fetch>, api_prefix: &str, offline_url: Url, pending: PendingWork,
    ) -> Self {
        Self { cache, fetcher, api_prefix: api_prefix.to_string(), offline: Request::get(offline_url), pending }
    }

    pub fn cache(&self) -> &CacheHandle {
        &self.cache
    }

    /// Answer one request.
    ///
    /// Errors are the network's own: a request is only failed when neither
    /// the network nor the store could answer it.
    pub async fn route(&self, request: Request) -> Result<Routed, Error> {
        let route = classify(&request, &self.api_prefix);
        tracing::debug!(
            url = %request.url(),
            method = request.method(),
            mode = ?request.mode(),
            ?route,
            "routing request"
        );

        match route {
            Route::Passthrough => self.passthrough(&request).await,
            Route::NetworkFirst => self.network_first(request).await,
            Route::StaleWhileRevalidate => self.stale_while_revalidate(request).await,
        }
    }

    async fn passthrough(&self, request: &Request) -> Result<Routed, Error> {
        let response = self.fetcher.fetch(request).await?;
        Ok(Routed::new(response, ResponseSource::Passthrough))
    }

    async fn network_first(&self, request: Request) -> Result<Routed, Error> {
        match self.fetcher.fetch(&request).await {
            Ok(response) => {
                self.store_in_background(request, &response);
                Ok(Routed::new(response, ResponseSource::Network))
            }
            Err(err) => {
                tracing::info!(url = %request.url(), error = %err, "network unavailable, falling back to store");
                if let Some(cached) = self.lookup(&request).await {
                    return Ok(Routed::new(cached, ResponseSource::Cache));
                }
                self.offline_or(err).await
            }
        }
    }

    async fn stale_while_revalidate(&self, request: Request) -> Result<Routed, Error> {
        if let Some(cached) = self.lookup(&request).await {
            self.revalidate_in_background(request);
            return Ok(Routed::new(cached, ResponseSource::Cache));
        }

        match self.fetcher.fetch(&request).await {
            Ok(response) => {
                self.store_in_background(request, &response);
                Ok(Routed::new(response, ResponseSource::Network))
            }
            Err(err) => {
                tracing::info!(url = %request.url(), error = %err, "nothing stored and network unavailable");
                self.offline_or(err).await
            }
        }
    }

    /// Stored entry for the request. A failing store read counts as a miss.
    async fn lookup(&self, request: &Request) -> Option<Response> {
        match self.cache.get(request).await {
            Ok(found) => found,
            Err(err) => {
                tracing::warn!(cache = %self.cache.name(), url = %request.url(), error = %err, "store read failed");
                None
            }
        }
    }

    async fn offline_or(&self, err: Error) -> Result<Routed, Error> {
        match self.lookup(&self.offline).await {
            Some(offline) => Ok(Routed::new(offline, ResponseSource::Offline)),
            None => Err(err),
        }
    }

    fn store_in_background(&self, request: Request, response: &Response) {
        if !response.ok() {
            tracing::debug!(url = %request.url(), status = response.status, "not storing unsuccessful response");
            return;
        }

        let cache = self.cache.clone();
        let snapshot = response.snapshot();
        self.pending.spawn(async move {
            if let Err(err) = cache.put(&request, &snapshot).await {
                tracing::warn!(cache = %cache.name(), url = %request.url(), error = %err, "store write failed");
            }
        });
    }

    fn revalidate_in_background(&self, request: Request) {
        let cache = self.cache.clone();
        let fetcher = self.fetcher.clone();
        self.pending.spawn(async move {
            match fetcher.fetch(&request).await {
                Ok(fresh) if fresh.ok() => {
                    if let Err(err) = cache.put(&request, &fresh).await {
                        tracing::warn!(cache = %cache.name(), url = %request.url(), error = %err, "store write failed");
                    }
                }
                Ok(fresh) => {
                    tracing::debug!(url = %request.url(), status = fresh.status, "revalidation kept stored entry");
                }
                Err(err) => {
                    tracing::warn!(url = %request.url(), error = %err, "revalidation failed");
                }
            }
        });
    }
}
