//! Configuration validation rules.
//!
//! This module provides validation logic for `WorkerConfig` values
//! after they have been loaded from environment, files, or defaults.

use std::collections::HashSet;

use crate::config::WorkerConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid { field: field.into(), reason: reason.into() }
}

impl WorkerConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `cache_prefix` or `generation` is empty or contains whitespace
    /// - `origin` is not an http(s) URL
    /// - `api_prefix` does not start and end with `/`
    /// - a manifest entry is not root-relative, or the manifest is empty
    /// - `offline_path` is missing from the manifest
    /// - `max_bytes` is 0 or exceeds 50MB
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `user_agent` is empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [("cache_prefix", &self.cache_prefix), ("generation", &self.generation)] {
            if value.is_empty() {
                return Err(ConfigError::Missing {
                    field: field.into(),
                    hint: format!("Set OFFCACHE_{} environment variable", field.to_uppercase()),
                });
            }
            if value.chars().any(char::is_whitespace) {
                return Err(invalid(field, "must not contain whitespace"));
            }
        }

        let origin = self.origin_url()?;
        if !matches!(origin.scheme(), "http" | "https") {
            return Err(invalid("origin", "must be an http or https URL"));
        }

        if !self.api_prefix.starts_with('/') || !self.api_prefix.ends_with('/') {
            return Err(invalid("api_prefix", "must start and end with '/'"));
        }

        if self.manifest.is_empty() {
            return Err(invalid("manifest", "must list at least one asset"));
        }
        if let Some(path) = self.manifest.iter().find(|p| !p.starts_with('/')) {
            return Err(invalid("manifest", &format!("'{path}' is not root-relative")));
        }
        if !self.offline_path.starts_with('/') {
            return Err(invalid("offline_path", "must be root-relative"));
        }
        if !self.manifest.contains(&self.offline_path) {
            return Err(invalid("offline_path", "must be part of the manifest"));
        }

        if self.max_bytes == 0 {
            return Err(invalid("max_bytes", "must be greater than 0"));
        }
        if self.max_bytes > 50 * 1024 * 1024 {
            return Err(invalid("max_bytes", "must not exceed 50MB"));
        }

        if self.timeout_ms < 100 {
            return Err(invalid("timeout_ms", "must be at least 100ms"));
        }
        if self.timeout_ms > 300_000 {
            return Err(invalid("timeout_ms", "must not exceed 5 minutes (300000ms)"));
        }

        if self.user_agent.is_empty() {
            return Err(invalid("user_agent", "must not be empty"));
        }

        let unique: HashSet<&String> = self.manifest.iter().collect();
        if unique.len() != self.manifest.len() {
            tracing::warn!(
                entries = self.manifest.len(),
                unique = unique.len(),
                "manifest lists some assets more than once; duplicates are fetched once per entry"
            );
        }

        Ok(())
    }
}
