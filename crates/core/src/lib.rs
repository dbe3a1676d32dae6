//! Core types and shared functionality for offcache.
//!
//! This crate provides:
//! - Cache storage with SQLite backend
//! - Request/response values and the network transport trait
//! - Unified error types
//! - Worker configuration

pub mod cache;
pub mod config;
pub mod error;
pub mod http;
pub mod transport;

pub use cache::{CacheDb, CacheHandle, CacheSummary};
pub use config::{ConfigError, WorkerConfig};
pub use error::Error;
pub use http::{Request, RequestMode, Response};
pub use transport::Fetch;
