//! Layered Cache - A multi-layer cache server
//!
//! Composes an in-process memory layer, an edge HTTP response cache and a
//! durable KV layer behind one async API, with TTL expiry, tag-based
//! invalidation and a cache-aside helper.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod stores;
pub mod tasks;

pub use api::AppState;
pub use config::Config;
pub use tasks::spawn_cleanup_task;
