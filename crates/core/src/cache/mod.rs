//! SQLite-backed cache storage: named stores of request → response entries.
//!
//! This module provides the persistent store the worker populates and serves
//! from, using SQLite with async access via tokio-rusqlite. It supports:
//!
//! - One named store per cache generation
//! - Request identity keys using SHA-256 hashing of method and URL
//! - Atomic bulk population
//! - Automatic schema migrations
//! - WAL mode for concurrent access

pub mod connection;
pub mod entries;
pub mod hash;
pub mod migrations;
pub mod stores;

pub use crate::Error;

pub use connection::CacheDb;
pub use stores::{CacheHandle, CacheSummary};
