//! HTTP Response Cache
//!
//! The URL-keyed response cache behind the edge layer, and an in-process
//! implementation of it.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::cache::Clock;
use crate::error::{CacheError, Result};

pub const CACHE_CONTROL: &str = "cache-control";

/// A cached HTTP response: lower-cased headers plus a text body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CachedResponse {
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

impl CachedResponse {
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            headers: BTreeMap::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// `max-age` from the `cache-control` header, in seconds.
    pub fn max_age(&self) -> Option<u64> {
        self.header(CACHE_CONTROL)?
            .split(',')
            .filter_map(|directive| directive.trim().strip_prefix("max-age="))
            .find_map(|secs| secs.trim().parse().ok())
    }
}

/// URL-keyed HTTP response cache.
#[async_trait]
pub trait ResponseCache: Send + Sync {
    /// Find a stored response for `url`.
    async fn lookup(&self, url: &str) -> Result<Option<CachedResponse>>;

    async fn put(&self, url: &str, response: CachedResponse) -> Result<()>;

    /// Returns whether a response was removed.
    async fn delete(&self, url: &str) -> Result<bool>;
}

#[derive(Debug)]
struct StoredResponse {
    response: CachedResponse,
    stored_at: u64,
}

// == In-Memory Response Cache ==
/// Process-local [`ResponseCache`].
///
/// By default a response stops matching once its `max-age` elapses. A cache
/// built with [`InMemoryResponseCache::retaining`] keeps serving responses
/// past `max-age`, the way a platform cache may hold content longer than
/// asked.
#[derive(Debug)]
pub struct InMemoryResponseCache {
    responses: Mutex<HashMap<String, StoredResponse>>,
    clock: Arc<dyn Clock>,
    honor_max_age: bool,
}

impl InMemoryResponseCache {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            responses: Mutex::new(HashMap::new()),
            clock,
            honor_max_age: true,
        }
    }

    /// A cache that ignores `max-age` on lookup.
    pub fn retaining(clock: Arc<dyn Clock>) -> Self {
        Self {
            honor_max_age: false,
            ..Self::new(clock)
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, StoredResponse>>> {
        self.responses
            .lock()
            .map_err(|e| CacheError::Internal(e.to_string()))
    }

    pub fn len(&self) -> usize {
        self.responses.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ResponseCache for InMemoryResponseCache {
    async fn lookup(&self, url: &str) -> Result<Option<CachedResponse>> {
        let now = self.clock.now_ms();
        let mut responses = self.lock()?;
        let Some(stored) = responses.get(url) else {
            return Ok(None);
        };

        let fresh = match (self.honor_max_age, stored.response.max_age()) {
            (true, Some(max_age)) => now <= stored.stored_at.saturating_add(max_age * 1000),
            _ => true,
        };

        if fresh {
            Ok(Some(stored.response.clone()))
        } else {
            responses.remove(url);
            Ok(None)
        }
    }

    async fn put(&self, url: &str, response: CachedResponse) -> Result<()> {
        let stored_at = self.clock.now_ms();
        self.lock()?.insert(
            url.to_string(),
            StoredResponse {
                response,
                stored_at,
            },
        );
        Ok(())
    }

    async fn delete(&self, url: &str) -> Result<bool> {
        Ok(self.lock()?.remove(url).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ManualClock;
    use std::time::Duration;

    #[test]
    fn test_max_age_parsing() {
        let response = CachedResponse::new("{}").with_header("Cache-Control", "public, max-age=120");
        assert_eq!(response.max_age(), Some(120));
        assert_eq!(response.header("CACHE-CONTROL"), Some("public, max-age=120"));

        assert_eq!(CachedResponse::new("{}").max_age(), None);
    }

    #[tokio::test]
    async fn test_lookup_honours_max_age() {
        let clock = Arc::new(ManualClock::new(0));
        let cache = InMemoryResponseCache::new(clock.clone());
        let response = CachedResponse::new("1").with_header(CACHE_CONTROL, "max-age=10");

        cache.put("https://cache/a", response.clone()).await.unwrap();
        assert_eq!(cache.lookup("https://cache/a").await.unwrap(), Some(response));

        clock.advance(Duration::from_secs(10));
        assert!(cache.lookup("https://cache/a").await.unwrap().is_some());

        clock.advance(Duration::from_millis(1));
        assert_eq!(cache.lookup("https://cache/a").await.unwrap(), None);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_retaining_cache_ignores_max_age() {
        let clock = Arc::new(ManualClock::new(0));
        let cache = InMemoryResponseCache::retaining(clock.clone());

        cache
            .put(
                "https://cache/a",
                CachedResponse::new("1").with_header(CACHE_CONTROL, "max-age=10"),
            )
            .await
            .unwrap();

        clock.advance(Duration::from_secs(3600));
        assert!(cache.lookup("https://cache/a").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_delete_reports_presence() {
        let cache = InMemoryResponseCache::new(Arc::new(ManualClock::new(0)));
        cache.put("u", CachedResponse::new("1")).await.unwrap();

        assert!(cache.delete("u").await.unwrap());
        assert!(!cache.delete("u").await.unwrap());
    }
}
