//! Generation populate and purge.

use std::sync::Arc;

use offcache_core::{CacheDb, Error, Fetch, Request};
use serde::{Deserialize, Serialize};
use url::Url;

/// Outcome of a successful install.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct InstallReport {
    pub cache_name: String,
    pub entries: usize,
}

/// Outcome of an activation's purge pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct ActivationReport {
    pub cache_name: String,
    /// Stale stores removed.
    pub deleted: Vec<String>,
    /// Stale stores whose deletion failed; retried on the next activation.
    pub failed: Vec<String>,
}

/// Owns one generation's store: populates it from the manifest and purges
/// every other generation sharing the prefix.
pub struct CacheLifecycle {
    db: CacheDb,
    fetcher: Arc<dyn Fetch>,
    cache_prefix: String,
    cache_name: String,
    manifest: Vec<Url>,
}

impl CacheLifecycle {
    pub fn new(
        db: CacheDb, fetcher: Arc<dyn Fetch>, cache_prefix: &str, cache_name: &str, manifest: Vec<Url>,
    ) -> Self {
        Self { db, fetcher, cache_prefix: cache_prefix.to_string(), cache_name: cache_name.to_string(), manifest }
    }

    pub fn cache_name(&self) -> &str {
        &self.cache_name
    }

    fn owns(&self, name: &str) -> bool {
        name.strip_prefix(&self.cache_prefix)
            .is_some_and(|rest| rest.starts_with('-'))
    }

    /// Populate the current generation's store with every manifest entry.
    ///
    /// All-or-nothing: if any entry fails, nothing from this attempt is kept,
    /// and a store created by this attempt is removed again.
    pub async fn install(&self) -> Result<InstallReport, Error> {
        let existed = self.db.has_cache(&self.cache_name).await?;
        let cache = self.db.open_cache(&self.cache_name).await?;
        let requests: Vec<Request> = self.manifest.iter().cloned().map(Request::get).collect();

        match cache.add_all(self.fetcher.as_ref(), &requests).await {
            Ok(entries) => {
                tracing::info!(cache = %self.cache_name, entries, "generation populated");
                Ok(InstallReport { cache_name: self.cache_name.clone(), entries })
            }
            Err(err) => {
                tracing::error!(cache = %self.cache_name, error = %err, "install failed");
                if !existed && let Err(cleanup) = self.db.delete_cache(&self.cache_name).await {
                    tracing::warn!(cache = %self.cache_name, error = %cleanup, "failed to remove unfinished store");
                }
                Err(err)
            }
        }
    }

    /// Delete every store sharing the prefix except the current generation's.
    ///
    /// Deletions are independent: a failure is logged and recorded, and the
    /// remaining stale stores are still attempted.
    pub async fn activate(&self) -> Result<ActivationReport, Error> {
        let names = self.db.cache_names().await?;
        let mut report = ActivationReport { cache_name: self.cache_name.clone(), ..Default::default() };

        for name in names.into_iter().filter(|n| self.owns(n) && *n != self.cache_name) {
            match self.db.delete_cache(&name).await {
                Ok(true) => {
                    tracing::info!(cache = %name, "deleted stale generation");
                    report.deleted.push(name);
                }
                Ok(false) => tracing::debug!(cache = %name, "stale generation already gone"),
                Err(err) => {
                    tracing::warn!(cache = %name, error = %err, "failed to delete stale generation");
                    report.failed.push(name);
                }
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StubFetcher;
    use bytes::Bytes;
    use offcache_core::Response;

    const ORIGIN: &str = "https://golf.example";

    fn manifest(paths: &[&str]) -> Vec<Url> {
        let origin = Url::parse(ORIGIN).unwrap();
        paths.iter().map(|p| origin.join(p).unwrap()).collect()
    }

    fn lifecycle(db: &CacheDb, fetcher: &Arc<StubFetcher>, generation: &str) -> CacheLifecycle {
        CacheLifecycle::new(
            db.clone(),
            fetcher.clone(),
            "golf-pwa",
            &format!("golf-pwa-{generation}"),
            manifest(&["/a", "/b"]),
        )
    }

    #[tokio::test]
    async fn test_install_populates_every_entry_byte_for_byte() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let fetcher = Arc::new(StubFetcher::new());
        fetcher.respond(&format!("{ORIGIN}/a"), Response::ok_with(vec![0xde, 0xad, 0xbe, 0xef]));
        fetcher.respond(&format!("{ORIGIN}/b"), Response::ok_with("b1"));

        let report = lifecycle(&db, &fetcher, "v1").install().await.unwrap();

        assert_eq!(report, InstallReport { cache_name: "golf-pwa-v1".into(), entries: 2 });
        let cache = db.open_cache("golf-pwa-v1").await.unwrap();
        let a = cache.get(&Request::get(manifest(&["/a"]).remove(0))).await.unwrap().unwrap();
        assert_eq!(a.body, Bytes::from(vec![0xde, 0xad, 0xbe, 0xef]));
        let b = cache.get(&Request::get(manifest(&["/b"]).remove(0))).await.unwrap().unwrap();
        assert_eq!(b.body, Bytes::from("b1"));
    }

    #[tokio::test]
    async fn test_failed_install_leaves_no_store() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let fetcher = Arc::new(StubFetcher::new());
        fetcher.respond(&format!("{ORIGIN}/a"), Response::ok_with("a1"));

        let result = lifecycle(&db, &fetcher, "v1").install().await;

        assert!(matches!(result, Err(Error::PopulationFailed { .. })));
        assert!(!db.has_cache("golf-pwa-v1").await.unwrap());
    }

    #[tokio::test]
    async fn test_failed_reinstall_keeps_existing_store() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let fetcher = Arc::new(StubFetcher::new());
        fetcher.respond(&format!("{ORIGIN}/a"), Response::ok_with("a1"));
        fetcher.respond(&format!("{ORIGIN}/b"), Response::ok_with("b1"));
        let v1 = lifecycle(&db, &fetcher, "v1");
        v1.install().await.unwrap();

        fetcher.fail(&format!("{ORIGIN}/b"));
        assert!(v1.install().await.is_err());

        let cache = db.open_cache("golf-pwa-v1").await.unwrap();
        assert_eq!(cache.len().await.unwrap(), 2);
        let b = cache.get(&Request::get(manifest(&["/b"]).remove(0))).await.unwrap().unwrap();
        assert_eq!(b.body, Bytes::from("b1"));
    }

    #[tokio::test]
    async fn test_activate_leaves_exactly_current_generation() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let fetcher = Arc::new(StubFetcher::new());
        fetcher.respond(&format!("{ORIGIN}/a"), Response::ok_with("a1"));
        fetcher.respond(&format!("{ORIGIN}/b"), Response::ok_with("b1"));
        lifecycle(&db, &fetcher, "v1").install().await.unwrap();

        fetcher.respond(&format!("{ORIGIN}/a"), Response::ok_with("a2"));
        fetcher.respond(&format!("{ORIGIN}/b"), Response::ok_with("b2"));
        let v2 = lifecycle(&db, &fetcher, "v2");
        v2.install().await.unwrap();
        db.open_cache("unrelated-store").await.unwrap();

        let report = v2.activate().await.unwrap();

        assert_eq!(report.deleted, vec!["golf-pwa-v1".to_string()]);
        assert!(report.failed.is_empty());
        let owned: Vec<String> =
            db.cache_names().await.unwrap().into_iter().filter(|n| n.starts_with("golf-pwa-")).collect();
        assert_eq!(owned, vec!["golf-pwa-v2".to_string()]);
        assert!(db.has_cache("unrelated-store").await.unwrap());

        let cache = db.open_cache("golf-pwa-v2").await.unwrap();
        let a = cache.get(&Request::get(manifest(&["/a"]).remove(0))).await.unwrap().unwrap();
        assert_eq!(a.body, Bytes::from("a2"));
    }

    #[tokio::test]
    async fn test_activate_continues_past_failed_deletion() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let fetcher = Arc::new(StubFetcher::new());
        db.open_cache("golf-pwa-v0").await.unwrap();
        db.open_cache("golf-pwa-v1").await.unwrap();
        db.open_cache("golf-pwa-v3").await.unwrap();
        db.execute_batch(
            "CREATE TRIGGER keep_v1 BEFORE DELETE ON caches WHEN old.name = 'golf-pwa-v1'
             BEGIN SELECT RAISE(ABORT, 'store locked'); END;",
        )
        .await
        .unwrap();

        let report = lifecycle(&db, &fetcher, "v3").activate().await.unwrap();

        assert_eq!(report.deleted, vec!["golf-pwa-v0".to_string()]);
        assert_eq!(report.failed, vec!["golf-pwa-v1".to_string()]);
        assert_eq!(db.cache_names().await.unwrap(), vec!["golf-pwa-v1".to_string(), "golf-pwa-v3".to_string()]);
    }

    #[tokio::test]
    async fn test_activate_without_stale_stores_is_noop() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let fetcher = Arc::new(StubFetcher::new());

        let report = lifecycle(&db, &fetcher, "v1").activate().await.unwrap();

        assert!(report.deleted.is_empty());
        assert!(report.failed.is_empty());
    }

    #[tokio::test]
    async fn test_activate_ignores_lookalike_prefix() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let fetcher = Arc::new(StubFetcher::new());
        db.open_cache("golf-pwax-v0").await.unwrap();
        db.open_cache("golf-pwa-v0").await.unwrap();

        let report = lifecycle(&db, &fetcher, "v1").activate().await.unwrap();

        assert_eq!(report.deleted, vec!["golf-pwa-v0".to_string()]);
        assert!(db.has_cache("golf-pwax-v0").await.unwrap());
    }
}
