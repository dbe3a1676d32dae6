//! offcache worker host entry point.
//!
//! Boots one worker for the configured generation and serves its lifecycle
//! events over MCP on stdio. Logging goes to stderr to avoid interfering with
//! the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::Result;
use offcache_client::{ControlChannel, FetchConfig, HttpFetcher, Worker};
use offcache_core::{CacheDb, WorkerConfig};
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use tracing_subscriber::EnvFilter;

mod error;
mod handler;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = WorkerConfig::load()?;
    tracing::info!(
        generation = %config.generation,
        cache = %config.cache_name(),
        db = %config.db_path.display(),
        "Starting offcache worker on stdio transport"
    );

    let db = CacheDb::open(&config.db_path).await?;
    let fetcher = Arc::new(HttpFetcher::new(FetchConfig::from(&config))?);
    let worker = Arc::new(Worker::new(config, db, fetcher)?);
    let control = ControlChannel::spawn(worker.clone());

    let handler = handler::WorkerHost::new(worker.clone(), control.poster());
    let server = serve_server(handler, stdio()).await?;
    let reason = server.waiting().await?;
    tracing::info!(?reason, "transport closed");

    control.close().await;
    let drained = worker.pending().drain().await;
    tracing::info!(drained, "pending work finished, shutting down");

    Ok(())
}
