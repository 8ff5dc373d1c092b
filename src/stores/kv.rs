//! Key/Value Store
//!
//! The string-keyed global store behind the durable layer, and an
//! in-process implementation of it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::cache::Clock;
use crate::error::{CacheError, Result};

/// Global key/value store with provider-side expiry.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Read a value as text.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a value. `expiration_ttl` is in seconds; the provider drops the
    /// record some time after it elapses.
    async fn put(&self, key: &str, value: String, expiration_ttl: Option<u64>) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<()>;

    /// Keys starting with `prefix`, in lexical order.
    async fn list(&self, prefix: &str) -> Result<Vec<String>>;
}

#[derive(Debug)]
struct StoredValue {
    value: String,
    expires_at: Option<u64>,
}

// == In-Memory KV Store ==
/// Process-local [`KvStore`] honouring `expiration_ttl` against a clock.
#[derive(Debug)]
pub struct InMemoryKvStore {
    records: Mutex<HashMap<String, StoredValue>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryKvStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            clock,
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, StoredValue>>> {
        self.records
            .lock()
            .map_err(|e| CacheError::Internal(e.to_string()))
    }

    /// Number of records physically held, expired or not.
    pub fn raw_len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    /// Provider-side expiry of a record, if any.
    pub fn expires_at(&self, key: &str) -> Option<u64> {
        self.records
            .lock()
            .ok()
            .and_then(|r| r.get(key).and_then(|v| v.expires_at))
    }

    fn is_live(record: &StoredValue, now: u64) -> bool {
        record.expires_at.map_or(true, |at| now <= at)
    }
}

#[async_trait]
impl KvStore for InMemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let now = self.clock.now_ms();
        let mut records = self.lock()?;
        let Some(record) = records.get(key) else {
            return Ok(None);
        };

        if Self::is_live(record, now) {
            return Ok(Some(record.value.clone()));
        }
        records.remove(key);
        Ok(None)
    }

    async fn put(&self, key: &str, value: String, expiration_ttl: Option<u64>) -> Result<()> {
        let now = self.clock.now_ms();
        let expires_at = expiration_ttl.map(|ttl| now.saturating_add(ttl.saturating_mul(1000)));
        self.lock()?
            .insert(key.to_string(), StoredValue { value, expires_at });
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.lock()?.remove(key);
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let now = self.clock.now_ms();
        let records = self.lock()?;
        let mut keys: Vec<String> = records
            .iter()
            .filter(|(key, record)| key.starts_with(prefix) && Self::is_live(record, now))
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        Ok(keys)
    }
}
