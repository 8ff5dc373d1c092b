//! Stores Module
//!
//! Contracts for the external stores the edge and durable layers sit on,
//! with in-process implementations used by the server and the tests.

mod kv;
mod response;

pub use kv::{InMemoryKvStore, KvStore};
pub use response::{CachedResponse, InMemoryResponseCache, ResponseCache, CACHE_CONTROL};
