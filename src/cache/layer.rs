//! Cache Layer Trait
//!
//! The contract shared by the memory, edge and durable layers.

use std::collections::BTreeSet;

use async_trait::async_trait;
use serde_json::Value;

use crate::cache::{CacheEntry, MAX_KEY_LENGTH};
use crate::error::{CacheError, Result};

/// Trait for a single cache layer.
///
/// Values travel between layers as JSON so one entry can be copied from a
/// slow layer into a fast one unchanged.
#[async_trait]
pub trait CacheLayer: Send + Sync {
    /// Name used in logs, stats and errors.
    fn name(&self) -> &str;

    /// Get a live entry. Expired entries are treated as absent.
    async fn get(&self, key: &str) -> Result<Option<CacheEntry<Value>>>;

    /// Store an entry built by the caller. The entry's timestamp is kept, so
    /// a copied entry expires when the original does.
    async fn set(&self, key: &str, entry: CacheEntry<Value>) -> Result<()>;

    /// Remove a key. Returns whether anything was removed.
    async fn delete(&self, key: &str) -> Result<bool>;

    /// Check for a live entry.
    async fn has(&self, key: &str) -> Result<bool> {
        Ok(self.get(key).await?.is_some())
    }

    /// Remove every entry carrying `tag`, returning the affected keys.
    ///
    /// Layers that cannot enumerate their contents return nothing.
    async fn invalidate_by_tag(&self, _tag: &str) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
}

// == Set Options ==
/// Per-write options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetOptions {
    /// TTL in seconds. None uses the cache's default.
    pub ttl: Option<u64>,
    pub tags: BTreeSet<String>,
}

impl SetOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ttl(mut self, ttl: u64) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Rejects blank tags and tags containing commas, which could not
    /// survive the edge layer's comma-joined header.
    pub fn validate(&self) -> Result<()> {
        if self.ttl == Some(0) {
            return Err(CacheError::InvalidTtl(0));
        }
        if let Some(tag) = self
            .tags
            .iter()
            .find(|t| t.trim().is_empty() || t.contains(','))
        {
            return Err(CacheError::InvalidRequest(format!(
                "invalid tag '{tag}': tags must be non-empty and must not contain commas"
            )));
        }
        Ok(())
    }
}

// == Cache Key ==
/// Helpers for building and checking cache keys.
pub struct CacheKey;

impl CacheKey {
    /// Builds `"<prefix>:<id>"`.
    pub fn namespaced(prefix: &str, id: impl std::fmt::Display) -> String {
        format!("{prefix}:{id}")
    }

    /// Rejects empty keys and keys longer than [`MAX_KEY_LENGTH`] bytes.
    pub fn validate(key: &str) -> Result<()> {
        if key.is_empty() {
            return Err(CacheError::InvalidKey("key cannot be empty".to_string()));
        }
        if key.len() > MAX_KEY_LENGTH {
            return Err(CacheError::InvalidKey(format!(
                "key exceeds maximum length of {} bytes",
                MAX_KEY_LENGTH
            )));
        }
        Ok(())
    }
}
