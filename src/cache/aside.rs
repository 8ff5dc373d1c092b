//! Cache-Aside Module
//!
//! Compute-on-miss helper over [`MultiLayerCache`].

use std::future::Future;
use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use crate::cache::{MultiLayerCache, SetOptions};
use crate::error::{CacheError, Result};

/// Reads through the cache, computing and storing values on a miss.
#[derive(Clone)]
pub struct CacheAside {
    cache: Arc<MultiLayerCache>,
}

impl CacheAside {
    pub fn new(cache: Arc<MultiLayerCache>) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &Arc<MultiLayerCache> {
        &self.cache
    }

    // == Get ==
    /// Returns the cached value for `key`, or fetches it.
    ///
    /// On a miss the fetched value is returned right away; the write into the
    /// cache runs in the background. A cached value that does not decode as
    /// `T` counts as a miss. Fetch errors are returned and nothing is stored.
    pub async fn get<T, F, Fut>(&self, key: &str, fetcher: F, options: SetOptions) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        match self.cache.get::<T>(key).await {
            Ok(Some(value)) => return Ok(value),
            Ok(None) => {}
            Err(e) => warn!(key, error = %e, "cached value unusable, refetching"),
        }

        debug!(key, "cache-aside miss, fetching");
        let value = fetcher().await.map_err(CacheError::Fetch)?;
        self.store_in_background(key, &value, options)?;
        Ok(value)
    }

    fn store_in_background<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        options: SetOptions,
    ) -> Result<()> {
        let entry = self
            .cache
            .build_entry(key, serde_json::to_value(value)?, options)?;
        let cache = Arc::clone(&self.cache);
        let key = key.to_string();

        self.cache.spawn_background(async move {
            if let Err(e) = cache.set_entry(&key, entry).await {
                warn!(key = %key, error = %e, "cache-aside store failed");
            }
        });
        Ok(())
    }

    // == Invalidate ==
    /// Deletes `key` from every layer.
    pub async fn invalidate(&self, key: &str) -> Result<bool> {
        self.cache.delete(key).await
    }

    // == Refresh ==
    /// Fetches `key` regardless of what is cached and stores the result.
    ///
    /// The store is awaited, so the cache holds the new value on return.
    pub async fn refresh<T, F, Fut>(&self, key: &str, fetcher: F, options: SetOptions) -> Result<T>
    where
        T: Serialize,
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let value = fetcher().await.map_err(CacheError::Fetch)?;
        self.cache.set(key, &value, options).await?;
        Ok(value)
    }
}
