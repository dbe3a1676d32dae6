//! Client code for offcache.
//!
//! This crate provides the worker itself: the HTTP transport, the generation
//! lifecycle, the request router and the control channel. Hosts embed a
//! [`Worker`] and feed it lifecycle events, requests and control messages.

pub mod control;
pub mod fetch;
pub mod lifecycle;
pub mod router;
pub mod worker;

#[cfg(test)]
pub(crate) mod testing;

pub use control::{ControlChannel, ControlMessage, ControlPoster, SKIP_WAITING};
pub use fetch::{FetchConfig, HttpFetcher, UrlError, resolve};
pub use lifecycle::{ActivationReport, InstallReport, WorkerState};
pub use router::{PendingWork, ResponseSource, Route, Routed, Router};
pub use worker::{Registration, Worker, WorkerStatus};
