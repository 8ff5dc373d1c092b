//! Cache Module
//!
//! Multi-layer caching: an in-process memory layer, an edge layer over an HTTP
//! response cache, and a durable layer over a KV store, composed by
//! [`MultiLayerCache`] with a [`CacheAside`] helper on top.

mod aside;
mod clock;
mod durable;
mod edge;
mod entry;
mod eviction;
mod layer;
mod memory;
mod multi;
mod stats;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use aside::CacheAside;
pub use clock::{Clock, ManualClock, SystemClock};
pub use durable::{DurableCache, DEFAULT_MIN_EXPIRATION_TTL};
pub use edge::{EdgeCache, EdgeExpiry, TAGS_HEADER, TIMESTAMP_HEADER, TTL_HEADER};
pub use entry::CacheEntry;
pub use eviction::{EvictionPolicy, EvictionTracker};
pub use layer::{CacheKey, CacheLayer, SetOptions};
pub use memory::MemoryCache;
pub use multi::MultiLayerCache;
pub use stats::{CacheStats, LayerHits, MultiLayerStats};

// == Public Constants ==
/// Maximum allowed key length in bytes
pub const MAX_KEY_LENGTH: usize = 256;
