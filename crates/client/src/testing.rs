//! Scripted network transport for tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use offcache_core::{Error, Fetch, Request, Response};
use tokio::sync::watch;

/// Transport that answers from a map of URL → response.
///
/// Unknown or failing URLs produce a network error. While held, every fetch
/// waits until `release` is called.
pub struct StubFetcher {
    responses: Mutex<HashMap<String, Response>>,
    failing: Mutex<HashSet<String>>,
    open: watch::Sender<bool>,
    calls: AtomicUsize,
}

impl StubFetcher {
    pub fn new() -> Self {
        let (open, _) = watch::channel(true);
        Self {
            responses: Mutex::new(HashMap::new()),
            failing: Mutex::new(HashSet::new()),
            open,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn respond(&self, url: &str, response: Response) {
        self.failing.lock().unwrap().remove(url);
        self.responses.lock().unwrap().insert(url.to_string(), response);
    }

    pub fn fail(&self, url: &str) {
        self.failing.lock().unwrap().insert(url.to_string());
    }

    /// Make every subsequent fetch fail.
    pub fn go_offline(&self) {
        let urls: Vec<String> = self.responses.lock().unwrap().keys().cloned().collect();
        self.failing.lock().unwrap().extend(urls);
    }

    pub fn hold(&self) {
        self.open.send_replace(false);
    }

    pub fn release(&self) {
        self.open.send_replace(true);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Fetch for StubFetcher {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let mut open = self.open.subscribe();
        open.wait_for(|open| *open)
            .await
            .map_err(|_| Error::Network("transport dropped".into()))?;

        let url = request.url().as_str();
        if self.failing.lock().unwrap().contains(url) {
            return Err(Error::Network(format!("offline: {url}")));
        }
        self.responses
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| Error::Network(format!("unreachable: {url}")))
    }
}
