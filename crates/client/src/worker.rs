//! The worker: one generation's lifecycle plus its request router.
//!
//! Lifecycle events are serialized by a phase lock so install and activate
//! never overlap. Routing does not take the lock and runs concurrently with
//! everything else.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use offcache_core::{CacheDb, CacheHandle, CacheSummary, Error, Fetch, Request, WorkerConfig};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};

use crate::control::ControlMessage;
use crate::lifecycle::{
    ActivationReport, CacheLifecycle, Effect, InstallReport, LifecycleEvent, WorkerState, transition,
};
use crate::router::{PendingWork, ResponseSource, Routed, Router};

/// Snapshot of the worker for hosts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct WorkerStatus {
    pub state: WorkerState,
    pub generation: String,
    pub cache_name: String,
    /// Whether requests are routed through this worker.
    pub controlling: bool,
    pub skip_waiting_requested: bool,
    /// Background tasks not yet reaped.
    pub pending: usize,
}

/// Result of `register`: the install, and the activation if the worker took
/// over immediately.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct Registration {
    pub install: InstallReport,
    pub activation: Option<ActivationReport>,
}

#[derive(Default)]
struct Performed {
    install: Option<InstallReport>,
    activation: Option<ActivationReport>,
}

pub struct Worker {
    config: WorkerConfig,
    db: CacheDb,
    fetcher: Arc<dyn Fetch>,
    lifecycle: CacheLifecycle,
    router: Router,
    pending: PendingWork,
    state: RwLock<WorkerState>,
    phase: Mutex<()>,
    skip_waiting_requested: AtomicBool,
    controlling: AtomicBool,
}

impl Worker {
    /// Build a worker for the configured generation.
    ///
    /// Nothing is fetched or written until `install`.
    pub fn new(config: WorkerConfig, db: CacheDb, fetcher: Arc<dyn Fetch>) -> Result<Self, Error> {
        config.validate()?;

        let cache_name = config.cache_name();
        let pending = PendingWork::new();
        let lifecycle =
            CacheLifecycle::new(db.clone(), fetcher.clone(), &config.cache_prefix, &cache_name, config.manifest_urls()?);
        let router = Router::new(
            db.cache(&cache_name),
            fetcher.clone(),
            &config.api_prefix,
            config.offline_url()?,
            pending.clone(),
        );

        tracing::info!(generation = %config.generation, cache = %cache_name, "worker parsed");

        Ok(Self {
            config,
            db,
            fetcher,
            lifecycle,
            router,
            pending,
            state: RwLock::new(WorkerState::Parsed),
            phase: Mutex::new(()),
            skip_waiting_requested: AtomicBool::new(false),
            controlling: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub async fn state(&self) -> WorkerState {
        *self.state.read().await
    }

    pub fn is_controlling(&self) -> bool {
        self.controlling.load(Ordering::SeqCst)
    }

    pub fn pending(&self) -> &PendingWork {
        &self.pending
    }

    /// The current generation's store.
    pub fn cache(&self) -> &CacheHandle {
        self.router.cache()
    }

    /// Every store carrying this worker's prefix.
    pub async fn caches(&self) -> Result<Vec<CacheSummary>, Error> {
        let prefix = format!("{}-", self.config.cache_prefix);
        self.db.cache_summaries(&prefix).await
    }

    pub async fn status(&self) -> WorkerStatus {
        WorkerStatus {
            state: self.state().await,
            generation: self.config.generation.clone(),
            cache_name: self.lifecycle.cache_name().to_string(),
            controlling: self.is_controlling(),
            skip_waiting_requested: self.skip_waiting_requested.load(Ordering::SeqCst),
            pending: self.pending.len(),
        }
    }

    /// Install, then take over at once if the install asked to skip waiting.
    pub async fn register(&self) -> Result<Registration, Error> {
        let install = self.install().await?;
        let activation =
            if self.skip_waiting_requested.load(Ordering::SeqCst) { self.skip_waiting().await? } else { None };
        Ok(Registration { install, activation })
    }

    /// Populate this generation's store.
    pub async fn install(&self) -> Result<InstallReport, Error> {
        let _phase = self.phase.lock().await;

        let effects = self.dispatch(LifecycleEvent::Install).await?;
        match self.perform(&effects).await {
            Ok(done) => {
                let effects = self.dispatch(LifecycleEvent::InstallSucceeded).await?;
                self.perform(&effects).await?;
                Ok(done.install.unwrap_or_default())
            }
            Err(err) => {
                self.dispatch(LifecycleEvent::InstallFailed).await?;
                Err(err)
            }
        }
    }

    /// Purge stale generations and start controlling clients.
    pub async fn activate(&self) -> Result<ActivationReport, Error> {
        let _phase = self.phase.lock().await;
        let effects = self.dispatch(LifecycleEvent::Activate).await?;
        self.complete_activation(&effects).await
    }

    /// Force activation of a waiting worker. Returns `None` when the worker
    /// is not waiting.
    ///
    /// Waits for a lifecycle phase in progress, so a request made during
    /// install takes effect once the install leaves the worker waiting.
    pub async fn skip_waiting(&self) -> Result<Option<ActivationReport>, Error> {
        let _phase = self.phase.lock().await;
        let effects = self.dispatch(LifecycleEvent::SkipWaiting).await?;
        if effects.is_empty() {
            tracing::debug!("skip-waiting ignored outside the waiting state");
            return Ok(None);
        }
        self.complete_activation(&effects).await.map(Some)
    }

    /// Handle one control-channel payload. Unrecognized payloads are ignored.
    pub async fn handle_message(&self, payload: &serde_json::Value) -> Result<Option<ActivationReport>, Error> {
        match ControlMessage::parse(payload) {
            Some(ControlMessage::SkipWaiting) => self.skip_waiting().await,
            None => {
                tracing::debug!(%payload, "ignoring unrecognized control message");
                Ok(None)
            }
        }
    }

    /// Answer an intercepted request.
    ///
    /// Until the worker controls clients, requests go straight to the network.
    pub async fn fetch(&self, request: Request) -> Result<Routed, Error> {
        if !self.is_controlling() {
            let response = self.fetcher.fetch(&request).await?;
            return Ok(Routed { response, source: ResponseSource::Uncontrolled });
        }
        self.router.route(request).await
    }

    async fn complete_activation(&self, effects: &[Effect]) -> Result<ActivationReport, Error> {
        let done = self.perform(effects).await?;
        let effects = self.dispatch(LifecycleEvent::Activated).await?;
        self.perform(&effects).await?;
        Ok(done.activation.unwrap_or_else(|| ActivationReport {
            cache_name: self.lifecycle.cache_name().to_string(),
            ..Default::default()
        }))
    }

    async fn dispatch(&self, event: LifecycleEvent) -> Result<Vec<Effect>, Error> {
        let mut state = self.state.write().await;
        let next = transition(*state, event)?;
        if next.state != *state {
            tracing::info!(
                from = %*state,
                to = %next.state,
                %event,
                generation = %self.config.generation,
                "lifecycle transition"
            );
        }
        *state = next.state;
        Ok(next.effects)
    }

    async fn perform(&self, effects: &[Effect]) -> Result<Performed, Error> {
        let mut done = Performed::default();
        for effect in effects {
            match effect {
                Effect::PopulateCache => done.install = Some(self.lifecycle.install().await?),
                Effect::RequestSkipWaiting => {
                    if self.config.skip_waiting {
                        self.skip_waiting_requested.store(true, Ordering::SeqCst);
                    }
                }
                Effect::DeleteStaleCaches => done.activation = Some(self.lifecycle.activate().await?),
                Effect::ClaimClients => {
                    self.controlling.store(true, Ordering::SeqCst);
                    tracing::info!(cache = %self.lifecycle.cache_name(), "claimed clients");
                }
            }
        }
        Ok(done)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StubFetcher;
    use bytes::Bytes;
    use offcache_core::Response;
    use url::Url;

    const ORIGIN: &str = "http://127.0.0.1:8000";

    fn config(generation: &str, skip_waiting: bool) -> WorkerConfig {
        WorkerConfig {
            generation: generation.into(),
            origin: ORIGIN.into(),
            manifest: vec!["/".into(), "/static/offline.html".into()],
            skip_waiting,
            ..Default::default()
        }
    }

    fn url(path: &str) -> Url {
        Url::parse(ORIGIN).unwrap().join(path).unwrap()
    }

    fn serve_manifest(fetcher: &StubFetcher, tag: &str) {
        fetcher.respond(url("/").as_str(), Response::ok_with(format!("home {tag}")));
        fetcher.respond(url("/static/offline.html").as_str(), Response::ok_with(format!("offline {tag}")));
    }

    async fn setup(generation: &str, skip_waiting: bool) -> (CacheDb, Arc<StubFetcher>, Worker) {
        let db = CacheDb::open_in_memory().await.unwrap();
        let fetcher = Arc::new(StubFetcher::new());
        let worker = Worker::new(config(generation, skip_waiting), db.clone(), fetcher.clone()).unwrap();
        (db, fetcher, worker)
    }

    #[tokio::test]
    async fn test_register_takes_over_immediately() {
        let (db, fetcher, worker) = setup("v2", true).await;
        db.open_cache("golf-pwa-v1").await.unwrap();
        serve_manifest(&fetcher, "v2");

        let registration = worker.register().await.unwrap();

        assert_eq!(registration.install.entries, 2);
        let activation = registration.activation.unwrap();
        assert_eq!(activation.deleted, vec!["golf-pwa-v1".to_string()]);
        assert_eq!(worker.state().await, WorkerState::Active);
        assert!(worker.is_controlling());
        assert_eq!(db.cache_names().await.unwrap(), vec!["golf-pwa-v2".to_string()]);
    }

    #[tokio::test]
    async fn test_register_without_skip_waiting_stays_waiting() {
        let (_db, fetcher, worker) = setup("v2", false).await;
        serve_manifest(&fetcher, "v2");

        let registration = worker.register().await.unwrap();

        assert!(registration.activation.is_none());
        assert_eq!(worker.state().await, WorkerState::Waiting);
        assert!(!worker.is_controlling());
    }

    #[tokio::test]
    async fn test_skip_waiting_message_activates_waiting_worker() {
        let (_db, fetcher, worker) = setup("v2", false).await;
        serve_manifest(&fetcher, "v2");
        worker.install().await.unwrap();

        let report = worker.handle_message(&serde_json::json!("SKIP_WAITING")).await.unwrap();

        assert!(report.is_some());
        assert_eq!(worker.state().await, WorkerState::Active);
    }

    #[tokio::test]
    async fn test_skip_waiting_during_install_activates_after_install() {
        let (_db, fetcher, worker) = setup("v2", false).await;
        serve_manifest(&fetcher, "v2");
        fetcher.hold();

        let installing = async {
            while worker.state().await != WorkerState::Installing {
                tokio::task::yield_now().await;
            }
        };
        let message = async {
            installing.await;
            worker.handle_message(&serde_json::json!("SKIP_WAITING")).await
        };
        let release = async {
            while worker.state().await != WorkerState::Installing {
                tokio::task::yield_now().await;
            }
            tokio::task::yield_now().await;
            fetcher.release();
        };

        let (installed, activation, ()) = tokio::join!(worker.install(), message, release);

        assert!(installed.is_ok());
        assert!(activation.unwrap().is_some());
        assert_eq!(worker.state().await, WorkerState::Active);
        assert!(worker.is_controlling());
    }

    #[tokio::test]
    async fn test_unrecognized_messages_ignored() {
        let (_db, fetcher, worker) = setup("v2", false).await;
        serve_manifest(&fetcher, "v2");
        worker.install().await.unwrap();

        let payloads =
            [serde_json::json!("skip_waiting"), serde_json::json!({"type": "SKIP_WAITING"}), serde_json::json!(42)];
        for payload in payloads {
            assert!(worker.handle_message(&payload).await.unwrap().is_none());
        }
        assert_eq!(worker.state().await, WorkerState::Waiting);
    }

    #[tokio::test]
    async fn test_failed_install_is_redundant_and_keeps_previous_generation() {
        let (db, fetcher, worker) = setup("v2", true).await;
        let v1 = db.open_cache("golf-pwa-v1").await.unwrap();
        v1.put(&Request::get(url("/")), &Response::ok_with("home v1")).await.unwrap();
        fetcher.respond(url("/").as_str(), Response::ok_with("home v2"));

        let result = worker.register().await;

        assert!(matches!(result, Err(Error::PopulationFailed { .. })));
        assert_eq!(worker.state().await, WorkerState::Redundant);
        assert!(!worker.is_controlling());
        assert_eq!(db.cache_names().await.unwrap(), vec!["golf-pwa-v1".to_string()]);
        assert_eq!(v1.len().await.unwrap(), 1);

        serve_manifest(&fetcher, "v2");
        worker.register().await.unwrap();
        assert_eq!(worker.state().await, WorkerState::Active);
    }

    #[tokio::test]
    async fn test_activate_before_install_rejected() {
        let (_db, _fetcher, worker) = setup("v2", true).await;
        let result = worker.activate().await;
        assert!(matches!(result, Err(Error::InvalidTransition { .. })));
        assert_eq!(worker.state().await, WorkerState::Parsed);
    }

    #[tokio::test]
    async fn test_concurrent_installs_do_not_overlap() {
        let (_db, fetcher, worker) = setup("v2", false).await;
        serve_manifest(&fetcher, "v2");

        let (a, b) = tokio::join!(worker.install(), worker.install());

        assert!(a.is_ok() != b.is_ok());
        assert_eq!(worker.state().await, WorkerState::Waiting);
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test]
    async fn test_uncontrolled_requests_bypass_store() {
        let (_db, fetcher, worker) = setup("v2", false).await;
        serve_manifest(&fetcher, "v2");
        worker.install().await.unwrap();

        let routed = worker.fetch(Request::navigate(url("/"))).await.unwrap();
        assert_eq!(routed.source, ResponseSource::Uncontrolled);

        fetcher.go_offline();
        assert!(worker.fetch(Request::navigate(url("/"))).await.is_err());
    }

    #[tokio::test]
    async fn test_active_worker_serves_offline_document() {
        let (_db, fetcher, worker) = setup("v2", true).await;
        serve_manifest(&fetcher, "v2");
        worker.register().await.unwrap();
        fetcher.go_offline();

        let routed = worker.fetch(Request::navigate(url("/scorecard"))).await.unwrap();

        assert_eq!(routed.source, ResponseSource::Offline);
        assert_eq!(routed.response.body, Bytes::from("offline v2"));
    }

    #[tokio::test]
    async fn test_status_reports_generation() {
        let (_db, _fetcher, worker) = setup("v2", true).await;
        let status = worker.status().await;
        assert_eq!(status.state, WorkerState::Parsed);
        assert_eq!(status.generation, "v2");
        assert_eq!(status.cache_name, "golf-pwa-v2");
        assert!(!status.controlling);
        assert_eq!(status.pending, 0);
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let config = WorkerConfig { offline_path: "/missing.html".into(), ..config("v2", true) };
        let result = Worker::new(config, db, Arc::new(StubFetcher::new()));
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
