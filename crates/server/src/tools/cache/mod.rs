//! Cache-related MCP tools.
//!
//! This module provides read-only tools for inspecting the worker's stores.

pub mod get;
pub mod list;

pub use get::{CacheGetParams, get_impl};
pub use list::list_impl;
