//! Multi-Layer Cache Module
//!
//! Composes cache layers in priority order (fastest first). Reads go top-down
//! and backfill faster layers on a lower hit; writes and deletes fan out to
//! every layer in parallel.
//!
//! Backfills and other fire-and-forget writes run on a tracked task set;
//! [`MultiLayerCache::settle`] waits for them.

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;

use futures::future::join_all;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tokio_util::task::TaskTracker;
use tracing::{debug, warn};

use crate::cache::stats::LayerCounters;
use crate::cache::{CacheEntry, CacheKey, CacheLayer, Clock, MultiLayerStats, SetOptions};
use crate::error::{CacheError, Result};

// == Multi-Layer Cache ==
pub struct MultiLayerCache {
    layers: Vec<Arc<dyn CacheLayer>>,
    clock: Arc<dyn Clock>,
    /// TTL in seconds for writes that do not name one
    default_ttl: u64,
    background: TaskTracker,
    /// Serializes `settle` so one caller's reopen cannot strand another
    settle_lock: tokio::sync::Mutex<()>,
    counters: LayerCounters,
}

impl MultiLayerCache {
    /// Creates a cache over `layers`, fastest first.
    pub fn new(layers: Vec<Arc<dyn CacheLayer>>, clock: Arc<dyn Clock>, default_ttl: u64) -> Self {
        let counters = LayerCounters::new(layers.len());
        Self {
            layers,
            clock,
            default_ttl,
            background: TaskTracker::new(),
            settle_lock: tokio::sync::Mutex::new(()),
            counters,
        }
    }

    pub fn layers(&self) -> &[Arc<dyn CacheLayer>] {
        &self.layers
    }

    pub fn default_ttl(&self) -> u64 {
        self.default_ttl
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    // == Get ==
    /// Reads `key` and decodes it as `T`.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get_entry(key).await? {
            Some(entry) => Ok(Some(serde_json::from_value(entry.data)?)),
            None => Ok(None),
        }
    }

    /// Reads `key` from the first layer that has it.
    ///
    /// A layer that fails to read is logged and skipped as if it missed. On a
    /// hit below the top layer, the entry is copied into every faster layer
    /// in the background.
    pub async fn get_entry(&self, key: &str) -> Result<Option<CacheEntry<Value>>> {
        for (index, layer) in self.layers.iter().enumerate() {
            match layer.get(key).await {
                Ok(Some(entry)) => {
                    debug!(key, layer = layer.name(), "cache hit");
                    self.counters.record_hit(index);
                    self.backfill(key, &entry, index);
                    return Ok(Some(entry));
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(key, layer = layer.name(), error = %e, "layer read failed, treating as miss");
                }
            }
        }

        debug!(key, "cache miss");
        self.counters.record_miss();
        Ok(None)
    }

    fn backfill(&self, key: &str, entry: &CacheEntry<Value>, hit_index: usize) {
        for upper in &self.layers[..hit_index] {
            let upper = Arc::clone(upper);
            let key = key.to_string();
            let entry = entry.clone();
            self.background.spawn(async move {
                if let Err(e) = upper.set(&key, entry).await {
                    warn!(key = %key, layer = upper.name(), error = %e, "backfill failed");
                }
            });
        }
    }

    // == Set ==
    /// Encodes `value` and writes it to every layer.
    pub async fn set<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        options: SetOptions,
    ) -> Result<()> {
        let value = serde_json::to_value(value)?;
        let entry = self.build_entry(key, value, options)?;
        self.set_entry(key, entry).await
    }

    /// Validates the key, TTL and tags and stamps a new entry.
    pub fn build_entry(
        &self,
        key: &str,
        value: Value,
        options: SetOptions,
    ) -> Result<CacheEntry<Value>> {
        CacheKey::validate(key)?;
        options.validate()?;
        let ttl = options.ttl.unwrap_or(self.default_ttl);
        CacheEntry::new(value, ttl, options.tags, self.clock.now_ms())
    }

    /// Writes a prepared entry to every layer in parallel.
    ///
    /// Every layer is attempted. Layers that succeed keep the value even if
    /// others fail; the failures are reported together.
    pub async fn set_entry(&self, key: &str, entry: CacheEntry<Value>) -> Result<()> {
        let results = join_all(self.layers.iter().map(|layer| {
            let entry = entry.clone();
            async move { layer.set(key, entry).await }
        }))
        .await;

        self.collect_failures("set", key, results).map(|_| ())
    }

    // == Delete ==
    /// Deletes `key` from every layer. Returns whether any layer held it.
    pub async fn delete(&self, key: &str) -> Result<bool> {
        let results = join_all(self.layers.iter().map(|layer| layer.delete(key))).await;

        let removed = self.collect_failures("delete", key, results)?;
        Ok(removed.into_iter().any(|r| r))
    }

    /// True if any layer holds a live entry for `key`.
    pub async fn has(&self, key: &str) -> Result<bool> {
        for layer in &self.layers {
            match layer.has(key).await {
                Ok(true) => return Ok(true),
                Ok(false) => {}
                Err(e) => warn!(key, layer = layer.name(), error = %e, "layer check failed"),
            }
        }
        Ok(false)
    }

    // == Invalidate By Tag ==
    /// Drops every entry tagged `tag`.
    ///
    /// Each layer reports the keys it invalidated; those keys are then
    /// deleted from every layer, so layers without a tag index are cleared
    /// too. Returns the number of distinct keys invalidated.
    pub async fn invalidate_by_tag(&self, tag: &str) -> Result<usize> {
        let results =
            join_all(self.layers.iter().map(|layer| layer.invalidate_by_tag(tag))).await;

        let mut failed = Vec::new();
        let mut keys = BTreeSet::new();
        for (layer, result) in self.layers.iter().zip(results) {
            match result {
                Ok(found) => keys.extend(found),
                Err(e) => {
                    warn!(tag, layer = layer.name(), error = %e, "tag invalidation failed");
                    failed.push(layer.name().to_string());
                }
            }
        }

        for key in &keys {
            if let Err(CacheError::LayerFailures { layers, .. }) = self.delete(key).await {
                failed.extend(layers);
            }
        }

        if failed.is_empty() {
            debug!(tag, count = keys.len(), "tag invalidated");
            Ok(keys.len())
        } else {
            failed.sort();
            failed.dedup();
            Err(CacheError::LayerFailures {
                operation: "invalidate_by_tag",
                layers: failed,
            })
        }
    }

    // == Background Work ==
    /// Runs `task` on the cache's tracked task set.
    pub fn spawn_background<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.background.spawn(task);
    }

    /// Number of background tasks still running.
    pub fn pending_background(&self) -> usize {
        self.background.len()
    }

    /// Waits until every background task spawned so far has finished.
    ///
    /// Safe to call from several tasks at once; callers take turns.
    pub async fn settle(&self) {
        let _guard = self.settle_lock.lock().await;
        self.background.close();
        self.background.wait().await;
        self.background.reopen();
    }

    // == Stats ==
    pub fn stats(&self) -> MultiLayerStats {
        self.counters
            .snapshot(self.layers.iter().map(|layer| layer.name()))
    }

    fn collect_failures<R>(
        &self,
        operation: &'static str,
        key: &str,
        results: Vec<Result<R>>,
    ) -> Result<Vec<R>> {
        let mut failed = Vec::new();
        let mut values = Vec::with_capacity(results.len());

        for (layer, result) in self.layers.iter().zip(results) {
            match result {
                Ok(value) => values.push(value),
                Err(e) => {
                    warn!(key, layer = layer.name(), error = %e, "{operation} failed");
                    failed.push(layer.name().to_string());
                }
            }
        }

        if failed.is_empty() {
            Ok(values)
        } else {
            Err(CacheError::LayerFailures {
                operation,
                layers: failed,
            })
        }
    }
}
