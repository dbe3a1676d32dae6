//! Worker configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (OFFCACHE_*)
//! 2. TOML config file (if OFFCACHE_CONFIG_FILE set)
//! 3. Built-in defaults
//!
//! A loaded configuration is immutable. Each deploy produces a new one, and
//! with it a new generation identifier.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use url::Url;

mod validation;

pub use validation::ConfigError;

/// Generation identifier baked in at build time by the crate's build script.
pub const BUILD_GENERATION: &str = env!("OFFCACHE_BUILD_VERSION");

/// Assets every generation is populated with before it becomes ready.
pub const DEFAULT_MANIFEST: &[&str] = &[
    "/",
    "/static/index.html",
    "/static/offline.html",
    "/manifest.json",
    "/static/manifest.json",
    "/static/images/icon-72.png",
    "/static/images/icon-96.png",
    "/static/images/icon-144.png",
    "/static/images/icon-192.png",
    "/static/images/icon-512.png",
];

/// Worker configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (OFFCACHE_*)
/// 2. TOML config file (if OFFCACHE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Prefix shared by every store this worker owns.
    ///
    /// Set via OFFCACHE_CACHE_PREFIX environment variable.
    #[serde(default = "default_cache_prefix")]
    pub cache_prefix: String,

    /// Generation identifier of this deploy.
    ///
    /// Set via OFFCACHE_GENERATION; defaults to the build version.
    #[serde(default = "default_generation")]
    pub generation: String,

    /// Origin that root-relative paths resolve against.
    ///
    /// Set via OFFCACHE_ORIGIN environment variable.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Requests under this path prefix are never intercepted.
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,

    /// Document served when neither the network nor the store can answer.
    #[serde(default = "default_offline_path")]
    pub offline_path: String,

    /// Root-relative paths pre-populated on install, in order.
    #[serde(default = "default_manifest")]
    pub manifest: Vec<String>,

    /// Path to SQLite cache database.
    ///
    /// Set via OFFCACHE_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// User-Agent string for HTTP requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum bytes to fetch per request.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// HTTP request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum number of redirects the transport follows.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,

    /// Take over open clients right after install instead of waiting for a
    /// control message.
    #[serde(default = "default_true")]
    pub skip_waiting: bool,
}

fn default_cache_prefix() -> String {
    "golf-pwa".into()
}

fn default_generation() -> String {
    BUILD_GENERATION.into()
}

fn default_origin() -> String {
    "http://127.0.0.1:8000".into()
}

fn default_api_prefix() -> String {
    "/api/".into()
}

fn default_offline_path() -> String {
    "/static/offline.html".into()
}

fn default_manifest() -> Vec<String> {
    DEFAULT_MANIFEST.iter().map(|p| p.to_string()).collect()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./offcache.sqlite")
}

fn default_user_agent() -> String {
    "offcache/0.1".into()
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_max_redirects() -> usize {
    5
}

fn default_true() -> bool {
    true
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            cache_prefix: default_cache_prefix(),
            generation: default_generation(),
            origin: default_origin(),
            api_prefix: default_api_prefix(),
            offline_path: default_offline_path(),
            manifest: default_manifest(),
            db_path: default_db_path(),
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            timeout_ms: default_timeout_ms(),
            max_redirects: default_max_redirects(),
            skip_waiting: true,
        }
    }
}

impl WorkerConfig {
    /// Name of the store owned by this generation: `<prefix>-<generation>`.
    pub fn cache_name(&self) -> String {
        format!("{}-{}", self.cache_prefix, self.generation)
    }

    /// Whether a store name belongs to this worker (any generation).
    pub fn owns_cache(&self, name: &str) -> bool {
        name.strip_prefix(&self.cache_prefix)
            .is_some_and(|rest| rest.starts_with('-'))
    }

    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Parsed origin URL.
    pub fn origin_url(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.origin).map_err(|e| ConfigError::Invalid { field: "origin".into(), reason: e.to_string() })
    }

    /// Resolve a root-relative path against the origin.
    pub fn resolve(&self, path: &str) -> Result<Url, ConfigError> {
        self.origin_url()?
            .join(path)
            .map_err(|e| ConfigError::Invalid { field: "path".into(), reason: format!("{path}: {e}") })
    }

    /// Manifest entries as absolute URLs, in manifest order.
    pub fn manifest_urls(&self) -> Result<Vec<Url>, ConfigError> {
        self.manifest.iter().map(|path| self.resolve(path)).collect()
    }

    /// Absolute URL of the offline fallback document.
    pub fn offline_url(&self) -> Result<Url, ConfigError> {
        self.resolve(&self.offline_path)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `OFFCACHE_`
    /// 2. TOML file from `OFFCACHE_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("OFFCACHE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("OFFCACHE_")
                .ignore(&["config_file", "build_version"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
