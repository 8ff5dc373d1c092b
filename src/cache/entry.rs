//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with TTL and tag support.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{CacheError, Result};

// == Cache Entry ==
/// A single cached value with the metadata every layer shares.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    /// The stored value
    pub data: T,
    /// Creation timestamp (Unix milliseconds)
    pub timestamp: u64,
    /// Time-to-live in seconds, always > 0
    pub ttl: u64,
    /// Labels used for bulk invalidation
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub tags: BTreeSet<String>,
}

impl<T> CacheEntry<T> {
    // == Constructor ==
    /// Creates a new entry stamped at `now_ms`.
    ///
    /// Fails with [`CacheError::InvalidTtl`] when `ttl` is zero.
    pub fn new(data: T, ttl: u64, tags: BTreeSet<String>, now_ms: u64) -> Result<Self> {
        if ttl == 0 {
            return Err(CacheError::InvalidTtl(ttl));
        }

        Ok(Self {
            data,
            timestamp: now_ms,
            ttl,
            tags,
        })
    }

    // == Expiry ==
    /// Unix millisecond at which the entry stops being live.
    pub fn expires_at(&self) -> u64 {
        self.timestamp.saturating_add(self.ttl.saturating_mul(1000))
    }

    /// Checks if the entry has expired.
    ///
    /// Boundary condition: the entry is still live at exactly
    /// `timestamp + ttl * 1000` and expired one millisecond later.
    pub fn is_expired_at(&self, now_ms: u64) -> bool {
        now_ms > self.expires_at()
    }

    // == Time To Live ==
    /// Remaining TTL in whole seconds, rounded up. Zero once expired.
    pub fn remaining_ttl(&self, now_ms: u64) -> u64 {
        let expires = self.expires_at();
        if now_ms >= expires {
            0
        } else {
            (expires - now_ms).div_ceil(1000)
        }
    }

    /// Returns true if the entry carries `tag`.
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    /// Applies `f` to the payload, keeping the metadata.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> CacheEntry<U> {
        CacheEntry {
            data: f(self.data),
            timestamp: self.timestamp,
            ttl: self.ttl,
            tags: self.tags,
        }
    }
}
