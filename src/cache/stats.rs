//! Cache Statistics Module
//!
//! Tracks cache performance metrics including hits, misses, evictions and
//! expirations. Counters belong to the cache instance that records them.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

// == Cache Stats ==
/// Tracks performance metrics for a single layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    /// Number of successful cache retrievals
    pub hits: u64,
    /// Number of failed cache retrievals (key not found or expired)
    pub misses: u64,
    /// Number of entries evicted to make room
    pub evictions: u64,
    /// Number of entries dropped because their TTL elapsed
    pub expirations: u64,
    /// Current number of entries in the cache
    pub total_entries: usize,
}

impl CacheStats {
    // == Constructor ==
    /// Creates a new CacheStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Calculates the cache hit rate.
    ///
    /// Returns hits / (hits + misses), or 0.0 if no requests have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }

    pub fn record_expirations(&mut self, count: usize) {
        self.expirations += count as u64;
    }

    pub fn set_total_entries(&mut self, count: usize) {
        self.total_entries = count;
    }
}

// == Multi-Layer Stats ==
/// Snapshot of where multi-layer reads were served from.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MultiLayerStats {
    /// Hits per layer, in priority order
    pub layers: Vec<LayerHits>,
    /// Reads that no layer could serve
    pub misses: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayerHits {
    pub name: String,
    pub hits: u64,
}

impl MultiLayerStats {
    /// Hits recorded for the named layer, 0 if unknown.
    pub fn hits_for(&self, name: &str) -> u64 {
        self.layers
            .iter()
            .find(|l| l.name == name)
            .map_or(0, |l| l.hits)
    }
}

/// Lock-free counters behind [`MultiLayerStats`].
#[derive(Debug)]
pub(crate) struct LayerCounters {
    hits: Vec<AtomicU64>,
    misses: AtomicU64,
}

impl LayerCounters {
    pub(crate) fn new(layers: usize) -> Self {
        Self {
            hits: (0..layers).map(|_| AtomicU64::new(0)).collect(),
            misses: AtomicU64::new(0),
        }
    }

    pub(crate) fn record_hit(&self, layer: usize) {
        if let Some(counter) = self.hits.get(layer) {
            counter.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot<'a>(&self, names: impl Iterator<Item = &'a str>) -> MultiLayerStats {
        MultiLayerStats {
            layers: names
                .zip(&self.hits)
                .map(|(name, hits)| LayerHits {
                    name: name.to_string(),
                    hits: hits.load(Ordering::Relaxed),
                })
                .collect(),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}
