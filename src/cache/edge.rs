//! Edge Cache Module
//!
//! Layer over a platform HTTP response cache. Each key maps to a synthetic
//! request URL `https://cache/<prefix><key>`; the value is the JSON response
//! body and the entry metadata rides in headers.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::cache::{CacheEntry, CacheLayer, Clock};
use crate::error::{CacheError, Result};
use crate::stores::{CachedResponse, ResponseCache, CACHE_CONTROL};

pub const TIMESTAMP_HEADER: &str = "x-cache-timestamp";
pub const TTL_HEADER: &str = "x-cache-ttl";
pub const TAGS_HEADER: &str = "x-cache-tags";
const CONTENT_TYPE: &str = "content-type";
const URL_BASE: &str = "https://cache/";

// == Edge Expiry ==
/// How reads treat the stored TTL.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeExpiry {
    /// Trust the platform cache's own expiry. A response the platform still
    /// serves is returned even if its logical TTL has passed.
    #[default]
    Delegate,
    /// Also check `timestamp + ttl` on read and drop stale responses.
    Enforce,
}

impl EdgeExpiry {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "delegate" => Some(Self::Delegate),
            "enforce" => Some(Self::Enforce),
            _ => None,
        }
    }
}

// == Edge Cache ==
pub struct EdgeCache {
    store: Arc<dyn ResponseCache>,
    prefix: String,
    expiry: EdgeExpiry,
    clock: Arc<dyn Clock>,
}

impl EdgeCache {
    pub const NAME: &'static str = "edge";

    pub fn new(
        store: Arc<dyn ResponseCache>,
        prefix: impl Into<String>,
        expiry: EdgeExpiry,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            prefix: prefix.into(),
            expiry,
            clock,
        }
    }

    /// The synthetic request URL for `key`.
    pub fn url_for(&self, key: &str) -> String {
        format!("{URL_BASE}{}{}", self.prefix, key)
    }

    fn encode(entry: &CacheEntry<Value>, max_age: u64) -> Result<CachedResponse> {
        let tags = entry.tags.iter().cloned().collect::<Vec<_>>().join(",");

        Ok(CachedResponse::new(serde_json::to_string(&entry.data)?)
            .with_header(CONTENT_TYPE, "application/json")
            .with_header(CACHE_CONTROL, format!("max-age={max_age}"))
            .with_header(TIMESTAMP_HEADER, entry.timestamp.to_string())
            .with_header(TTL_HEADER, entry.ttl.to_string())
            .with_header(TAGS_HEADER, tags))
    }

    fn decode(response: &CachedResponse, now_ms: u64) -> Result<CacheEntry<Value>> {
        let data: Value = serde_json::from_str(&response.body)?;
        let timestamp = response
            .header(TIMESTAMP_HEADER)
            .and_then(|v| v.parse().ok())
            .unwrap_or(now_ms);
        // Older responses without our ttl header fall back to max-age
        let ttl = response
            .header(TTL_HEADER)
            .and_then(|v| v.parse().ok())
            .or_else(|| response.max_age())
            .filter(|ttl| *ttl > 0)
            .ok_or_else(|| CacheError::backend(Self::NAME, "response carries no TTL"))?;
        let tags: BTreeSet<String> = response
            .header(TAGS_HEADER)
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(String::from)
            .collect();

        CacheEntry::new(data, ttl, tags, timestamp)
    }
}

#[async_trait]
impl CacheLayer for EdgeCache {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn get(&self, key: &str) -> Result<Option<CacheEntry<Value>>> {
        let url = self.url_for(key);
        let Some(response) = self.store.lookup(&url).await? else {
            return Ok(None);
        };

        let now = self.clock.now_ms();
        let entry = Self::decode(&response, now)?;

        if self.expiry == EdgeExpiry::Enforce && entry.is_expired_at(now) {
            debug!(key, "edge response past its ttl, dropping");
            self.store.delete(&url).await?;
            return Ok(None);
        }

        Ok(Some(entry))
    }

    async fn set(&self, key: &str, entry: CacheEntry<Value>) -> Result<()> {
        let max_age = entry.remaining_ttl(self.clock.now_ms());
        if max_age == 0 {
            debug!(key, "skipping edge write of an expired entry");
            return Ok(());
        }

        let response = Self::encode(&entry, max_age)?;
        self.store.put(&self.url_for(key), response).await
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        self.store.delete(&self.url_for(key)).await
    }
}
