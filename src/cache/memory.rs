//! Memory Cache Module
//!
//! Process-local layer combining HashMap storage with capacity eviction and
//! lazy TTL expiration.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::cache::{
    CacheEntry, CacheLayer, CacheStats, Clock, EvictionPolicy, EvictionTracker,
};
use crate::error::{CacheError, Result};

#[derive(Debug)]
struct Inner {
    /// Key-value storage
    entries: HashMap<String, CacheEntry<Value>>,
    /// Eviction order
    order: EvictionTracker,
    /// Performance statistics
    stats: CacheStats,
}

impl Inner {
    fn remove(&mut self, key: &str) -> bool {
        let removed = self.entries.remove(key).is_some();
        if removed {
            self.order.remove(key);
            self.stats.set_total_entries(self.entries.len());
        }
        removed
    }
}

// == Memory Cache ==
/// Size-bounded in-process cache layer.
#[derive(Debug)]
pub struct MemoryCache {
    inner: Mutex<Inner>,
    /// Maximum number of entries allowed
    max_entries: usize,
    clock: Arc<dyn Clock>,
}

impl MemoryCache {
    pub const NAME: &'static str = "memory";

    // == Constructor ==
    /// Creates a new MemoryCache.
    ///
    /// # Arguments
    /// * `max_entries` - Maximum number of entries the cache can hold (at least 1)
    /// * `policy` - Which entry to evict when full
    /// * `clock` - Time source for expiry checks
    pub fn new(max_entries: usize, policy: EvictionPolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                order: EvictionTracker::new(policy),
                stats: CacheStats::new(),
            }),
            max_entries: max_entries.max(1),
            clock,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|e| CacheError::Internal(e.to_string()))
    }

    // == Lookup ==
    /// Returns the live entry for `key`.
    ///
    /// Expired entries are removed and counted as misses.
    pub fn lookup(&self, key: &str) -> Result<Option<CacheEntry<Value>>> {
        let now = self.clock.now_ms();
        let mut inner = self.lock()?;

        let Some(entry) = inner.entries.get(key) else {
            inner.stats.record_miss();
            return Ok(None);
        };

        if entry.is_expired_at(now) {
            inner.remove(key);
            inner.stats.record_expirations(1);
            inner.stats.record_miss();
            debug!(key, "memory entry expired on read");
            return Ok(None);
        }

        let entry = entry.clone();
        inner.stats.record_hit();
        inner.order.record_access(key);
        Ok(Some(entry))
    }

    // == Insert ==
    /// Stores an entry, evicting one first if a new key would exceed capacity.
    ///
    /// Overwriting an existing key never evicts. An entry that has already
    /// expired is not stored; it only replaces what the key held.
    pub fn insert(&self, key: &str, entry: CacheEntry<Value>) -> Result<()> {
        let now = self.clock.now_ms();
        let mut inner = self.lock()?;

        if entry.is_expired_at(now) {
            inner.remove(key);
            debug!(key, "skipping memory write of an expired entry");
            return Ok(());
        }

        let is_overwrite = inner.entries.contains_key(key);
        if !is_overwrite && inner.entries.len() >= self.max_entries {
            match inner.order.evict_next() {
                Some(evicted) => {
                    inner.entries.remove(&evicted);
                    inner.stats.record_eviction();
                    debug!(key = %evicted, "memory entry evicted");
                }
                None => {
                    return Err(CacheError::Internal(
                        "memory cache is full and has nothing to evict".to_string(),
                    ))
                }
            }
        }

        inner.entries.insert(key.to_string(), entry);
        inner.order.record_insert(key);
        let len = inner.entries.len();
        inner.stats.set_total_entries(len);
        Ok(())
    }

    /// Removes `key`. Returns whether it was present.
    pub fn remove(&self, key: &str) -> Result<bool> {
        Ok(self.lock()?.remove(key))
    }

    /// True if a live entry exists. Does not touch stats or eviction order.
    pub fn contains(&self, key: &str) -> Result<bool> {
        let now = self.clock.now_ms();
        let inner = self.lock()?;
        Ok(inner
            .entries
            .get(key)
            .is_some_and(|entry| !entry.is_expired_at(now)))
    }

    /// Removes every entry tagged `tag`, returning the removed keys.
    pub fn remove_tagged(&self, tag: &str) -> Result<Vec<String>> {
        let mut inner = self.lock()?;
        let mut keys: Vec<String> = inner
            .entries
            .iter()
            .filter(|(_, entry)| entry.has_tag(tag))
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();

        for key in &keys {
            inner.remove(key);
        }
        Ok(keys)
    }

    // == Purge Expired ==
    /// Removes all expired entries from the cache.
    ///
    /// Returns the number of entries removed.
    pub fn purge_expired(&self) -> Result<usize> {
        let now = self.clock.now_ms();
        let mut inner = self.lock()?;

        let expired: Vec<String> = inner
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired_at(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            inner.remove(key);
        }
        inner.stats.record_expirations(expired.len());
        Ok(expired.len())
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn get_stats(&self) -> Result<CacheStats> {
        let inner = self.lock()?;
        let mut stats = inner.stats.clone();
        stats.set_total_entries(inner.entries.len());
        Ok(stats)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|i| i.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.max_entries
    }
}

#[async_trait]
impl CacheLayer for MemoryCache {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn get(&self, key: &str) -> Result<Option<CacheEntry<Value>>> {
        self.lookup(key)
    }

    async fn set(&self, key: &str, entry: CacheEntry<Value>) -> Result<()> {
        self.insert(key, entry)
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        self.remove(key)
    }

    async fn has(&self, key: &str) -> Result<bool> {
        self.contains(key)
    }

    async fn invalidate_by_tag(&self, tag: &str) -> Result<Vec<String>> {
        self.remove_tagged(tag)
    }
}
