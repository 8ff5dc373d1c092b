//! Durable Cache Module
//!
//! Layer over a global KV store. Entries are stored as JSON under
//! `<prefix>entry:<key>`; for every tag a record `<prefix>tag:<tag>` holds the
//! JSON array of keys carrying it.
//!
//! Tag records are maintained by read-modify-write with no concurrency
//! control. Two writers updating the same tag at once can lose one of the
//! updates; the entry itself is still written and still expires.
//!
//! Entry records are given a provider expiration of the remaining TTL plus
//! the provider's minimum, so they outlive their logical expiry and an
//! expired read can still clean the tag index.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use crate::cache::{CacheEntry, CacheLayer, Clock};
use crate::error::{CacheError, Result};
use crate::stores::KvStore;

/// Smallest expiration the KV provider accepts, in seconds.
pub const DEFAULT_MIN_EXPIRATION_TTL: u64 = 60;

// == Durable Cache ==
pub struct DurableCache {
    store: Arc<dyn KvStore>,
    prefix: String,
    min_expiration_ttl: u64,
    clock: Arc<dyn Clock>,
}

impl DurableCache {
    pub const NAME: &'static str = "durable";

    pub fn new(store: Arc<dyn KvStore>, prefix: impl Into<String>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
            min_expiration_ttl: DEFAULT_MIN_EXPIRATION_TTL,
            clock,
        }
    }

    /// Overrides the margin added to provider expirations. The logical TTL
    /// check on read is exact either way.
    pub fn with_min_expiration_ttl(mut self, secs: u64) -> Self {
        self.min_expiration_ttl = secs;
        self
    }

    pub fn entry_key(&self, key: &str) -> String {
        format!("{}entry:{}", self.prefix, key)
    }

    pub fn tag_key(&self, tag: &str) -> String {
        format!("{}tag:{}", self.prefix, tag)
    }

    async fn read_entry(&self, key: &str) -> Result<Option<CacheEntry<Value>>> {
        match self.store.get(&self.entry_key(key)).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    // == Tag Index ==
    /// Keys currently recorded for `tag`.
    pub async fn tagged_keys(&self, tag: &str) -> Result<BTreeSet<String>> {
        match self.store.get(&self.tag_key(tag)).await? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(BTreeSet::new()),
        }
    }

    async fn write_tag(&self, tag: &str, keys: &BTreeSet<String>) -> Result<()> {
        if keys.is_empty() {
            self.store.delete(&self.tag_key(tag)).await
        } else {
            self.store
                .put(&self.tag_key(tag), serde_json::to_string(keys)?, None)
                .await
        }
    }

    async fn add_to_tag(&self, tag: &str, key: &str) -> Result<()> {
        let mut keys = self.tagged_keys(tag).await?;
        if keys.insert(key.to_string()) {
            self.write_tag(tag, &keys).await?;
        }
        Ok(())
    }

    async fn remove_from_tag(&self, tag: &str, key: &str) -> Result<()> {
        let mut keys = self.tagged_keys(tag).await?;
        if keys.remove(key) {
            self.write_tag(tag, &keys).await?;
        }
        Ok(())
    }

    /// Deletes the entry record and its index memberships.
    async fn remove_entry(&self, key: &str, tags: &BTreeSet<String>) -> Result<()> {
        self.store.delete(&self.entry_key(key)).await?;
        for tag in tags {
            self.remove_from_tag(tag, key).await?;
        }
        Ok(())
    }

    // == Purge Expired ==
    /// Deletes every logically expired entry still held by the store.
    ///
    /// Returns the number of entries removed.
    pub async fn purge_expired(&self) -> Result<usize> {
        let now = self.clock.now_ms();
        let entry_prefix = self.entry_key("");
        let mut removed = 0;

        for record in self.store.list(&entry_prefix).await? {
            let Some(key) = record.strip_prefix(&entry_prefix) else {
                continue;
            };
            let entry = match self.read_entry(key).await {
                Ok(Some(entry)) => entry,
                Ok(None) => continue,
                Err(e) => {
                    warn!(key, error = %e, "skipping unreadable durable entry");
                    continue;
                }
            };
            if entry.is_expired_at(now) {
                self.remove_entry(key, &entry.tags).await?;
                removed += 1;
            }
        }

        let pruned = self.prune_tag_index().await?;
        if pruned > 0 {
            debug!(pruned, "dropped tag memberships of vanished entries");
        }

        Ok(removed)
    }

    /// Removes tag memberships whose entry record no longer exists.
    ///
    /// Covers records the provider dropped before any read saw them expire.
    async fn prune_tag_index(&self) -> Result<usize> {
        let tag_prefix = self.tag_key("");
        let mut pruned = 0;

        for record in self.store.list(&tag_prefix).await? {
            let Some(tag) = record.strip_prefix(&tag_prefix) else {
                continue;
            };
            let keys = self.tagged_keys(tag).await?;
            let mut live = BTreeSet::new();
            for key in &keys {
                if self.store.get(&self.entry_key(key)).await?.is_some() {
                    live.insert(key.clone());
                }
            }
            if live.len() != keys.len() {
                pruned += keys.len() - live.len();
                self.write_tag(tag, &live).await?;
            }
        }

        Ok(pruned)
    }
}

#[async_trait]
impl CacheLayer for DurableCache {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn get(&self, key: &str) -> Result<Option<CacheEntry<Value>>> {
        let Some(entry) = self.read_entry(key).await? else {
            return Ok(None);
        };

        if entry.is_expired_at(self.clock.now_ms()) {
            debug!(key, "durable entry expired on read");
            self.remove_entry(key, &entry.tags).await?;
            return Ok(None);
        }

        Ok(Some(entry))
    }

    async fn set(&self, key: &str, entry: CacheEntry<Value>) -> Result<()> {
        let remaining = entry.remaining_ttl(self.clock.now_ms());
        if remaining == 0 {
            debug!(key, "skipping durable write of an expired entry");
            return Ok(());
        }

        let previous_tags = match self.read_entry(key).await {
            Ok(previous) => previous.map(|e| e.tags).unwrap_or_default(),
            Err(CacheError::Serialization(e)) => {
                warn!(key, error = %e, "overwriting unreadable durable entry");
                BTreeSet::new()
            }
            Err(e) => return Err(e),
        };

        let raw = serde_json::to_string(&entry)?;
        // Outlive the logical TTL so an expired read still finds the record
        // and can clean its tag memberships.
        let expiration_ttl = remaining.saturating_add(self.min_expiration_ttl);
        self.store
            .put(&self.entry_key(key), raw, Some(expiration_ttl))
            .await?;

        for tag in previous_tags.difference(&entry.tags) {
            self.remove_from_tag(tag, key).await?;
        }
        for tag in &entry.tags {
            self.add_to_tag(tag, key).await?;
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let existing = match self.read_entry(key).await {
            Ok(existing) => existing,
            Err(CacheError::Serialization(_)) => {
                self.store.delete(&self.entry_key(key)).await?;
                return Ok(true);
            }
            Err(e) => return Err(e),
        };

        match existing {
            Some(entry) => {
                self.remove_entry(key, &entry.tags).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn invalidate_by_tag(&self, tag: &str) -> Result<Vec<String>> {
        let keys = self.tagged_keys(tag).await?;
        for key in &keys {
            self.delete(key).await?;
        }
        self.store.delete(&self.tag_key(tag)).await?;

        debug!(tag, count = keys.len(), "durable tag invalidated");
        Ok(keys.into_iter().collect())
    }
}
