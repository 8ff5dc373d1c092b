//! API Handlers
//!
//! HTTP request handlers for each cache server endpoint.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::Value;
use tracing::debug;

use crate::cache::{
    CacheLayer, Clock, DurableCache, EdgeCache, MemoryCache, MultiLayerCache, SystemClock,
};
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::models::{
    DeleteResponse, GetResponse, HealthResponse, InvalidateResponse, SetRequest, SetResponse,
    StatsResponse,
};
use crate::stores::{InMemoryKvStore, InMemoryResponseCache};

/// Application state shared across all handlers.
///
/// The memory and durable layers are also held directly so the stats
/// endpoint and the cleanup task can reach them.
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<MultiLayerCache>,
    pub memory: Arc<MemoryCache>,
    pub durable: Arc<DurableCache>,
}

impl AppState {
    pub fn new(
        cache: Arc<MultiLayerCache>,
        memory: Arc<MemoryCache>,
        durable: Arc<DurableCache>,
    ) -> Self {
        Self {
            cache,
            memory,
            durable,
        }
    }

    /// Creates a new AppState from configuration, on wall-clock time.
    pub fn from_config(config: &Config) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Builds the memory -> edge -> durable stack over in-process stores.
    pub fn with_clock(config: &Config, clock: Arc<dyn Clock>) -> Self {
        let memory = Arc::new(MemoryCache::new(
            config.max_entries,
            config.eviction_policy,
            clock.clone(),
        ));
        let edge = Arc::new(EdgeCache::new(
            Arc::new(InMemoryResponseCache::new(clock.clone())),
            config.cache_prefix.clone(),
            config.edge_expiry,
            clock.clone(),
        ));
        let durable = Arc::new(
            DurableCache::new(
                Arc::new(InMemoryKvStore::new(clock.clone())),
                config.cache_prefix.clone(),
                clock.clone(),
            )
            .with_min_expiration_ttl(config.durable_min_ttl),
        );

        let layers: Vec<Arc<dyn CacheLayer>> = vec![memory.clone(), edge, durable.clone()];
        let cache = Arc::new(MultiLayerCache::new(layers, clock, config.default_ttl));

        Self::new(cache, memory, durable)
    }
}

/// Handler for PUT /set
///
/// Stores a JSON value in every layer with optional TTL and tags.
pub async fn set_handler(
    State(state): State<AppState>,
    Json(req): Json<SetRequest>,
) -> Result<Json<SetResponse>> {
    req.validate()?;

    let options = req.options();
    state.cache.set(&req.key, &req.value, options).await?;
    debug!(key = %req.key, "set");

    Ok(Json(SetResponse::new(req.key)))
}

/// Handler for GET /get/:key
pub async fn get_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<GetResponse>> {
    let value = state
        .cache
        .get::<Value>(&key)
        .await?
        .ok_or_else(|| CacheError::NotFound(key.clone()))?;

    Ok(Json(GetResponse::new(key, value)))
}

/// Handler for DELETE /del/:key
///
/// Deleting an absent key succeeds with `deleted: false`.
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<DeleteResponse>> {
    let deleted = state.cache.delete(&key).await?;
    Ok(Json(DeleteResponse::new(key, deleted)))
}

/// Handler for POST /invalidate/:tag
pub async fn invalidate_handler(
    State(state): State<AppState>,
    Path(tag): Path<String>,
) -> Result<Json<InvalidateResponse>> {
    let invalidated = state.cache.invalidate_by_tag(&tag).await?;
    Ok(Json(InvalidateResponse::new(tag, invalidated)))
}

/// Handler for GET /stats
///
/// Memory layer counters plus which layer served each multi-layer read.
pub async fn stats_handler(State(state): State<AppState>) -> Result<Json<StatsResponse>> {
    let memory = state.memory.get_stats()?;
    Ok(Json(StatsResponse::new(&memory, state.cache.stats())))
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ManualClock;
    use serde_json::json;
    use std::time::Duration;

    fn test_state() -> (AppState, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(1_000_000));
        let config = Config {
            max_entries: 100,
            ..Config::default()
        };
        (AppState::with_clock(&config, clock.clone()), clock)
    }

    fn set_request(key: &str, value: Value, ttl: Option<u64>, tags: &[&str]) -> SetRequest {
        SetRequest {
            key: key.to_string(),
            value,
            ttl,
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn test_set_and_get_handler() {
        let (state, _) = test_state();

        let req = set_request("test_key", json!({"name": "Ann"}), None, &[]);
        let result = set_handler(State(state.clone()), Json(req)).await;
        assert!(result.is_ok());

        let response = get_handler(State(state.clone()), Path("test_key".to_string()))
            .await
            .unwrap();
        assert_eq!(response.value, json!({"name": "Ann"}));
    }

    #[tokio::test]
    async fn test_get_nonexistent_key() {
        let (state, _) = test_state();

        let result = get_handler(State(state), Path("nonexistent".to_string())).await;
        assert!(matches!(result, Err(CacheError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_get_after_ttl_expires() {
        let (state, clock) = test_state();

        let req = set_request("short", json!(1), Some(60), &[]);
        set_handler(State(state.clone()), Json(req)).await.unwrap();

        clock.advance(Duration::from_secs(61));
        assert!(!state.memory.has("short").await.unwrap());
        assert!(!state.durable.has("short").await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_handler() {
        let (state, _) = test_state();

        let req = set_request("to_delete", json!("value"), None, &[]);
        set_handler(State(state.clone()), Json(req)).await.unwrap();

        let response = delete_handler(State(state.clone()), Path("to_delete".to_string()))
            .await
            .unwrap();
        assert!(response.deleted);

        let result = get_handler(State(state.clone()), Path("to_delete".to_string())).await;
        assert!(result.is_err());

        // Second delete is a no-op
        let response = delete_handler(State(state), Path("to_delete".to_string()))
            .await
            .unwrap();
        assert!(!response.deleted);
    }

    #[tokio::test]
    async fn test_invalidate_handler() {
        let (state, _) = test_state();

        for key in ["user:1", "user:2"] {
            let req = set_request(key, json!(key), None, &["users"]);
            set_handler(State(state.clone()), Json(req)).await.unwrap();
        }
        let req = set_request("post:1", json!("p"), None, &["posts"]);
        set_handler(State(state.clone()), Json(req)).await.unwrap();

        let response = invalidate_handler(State(state.clone()), Path("users".to_string()))
            .await
            .unwrap();
        assert_eq!(response.invalidated, 2);

        assert!(get_handler(State(state.clone()), Path("user:1".to_string()))
            .await
            .is_err());
        assert!(get_handler(State(state), Path("post:1".to_string()))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_stats_handler() {
        let (state, _) = test_state();

        let response = stats_handler(State(state.clone())).await.unwrap();
        assert_eq!(response.hits, 0);
        assert_eq!(response.misses, 0);
        assert_eq!(response.layers.len(), 3);

        let _ = get_handler(State(state.clone()), Path("missing".to_string())).await;
        let response = stats_handler(State(state)).await.unwrap();
        assert_eq!(response.misses, 1);
        assert_eq!(response.layer_misses, 1);
    }

    #[tokio::test]
    async fn test_health_handler() {
        let response = health_handler().await;
        assert_eq!(response.status, "healthy");
    }

    #[tokio::test]
    async fn test_set_invalid_request() {
        let (state, _) = test_state();

        let req = set_request("", json!("value"), None, &[]);
        let result = set_handler(State(state.clone()), Json(req)).await;
        assert!(matches!(result, Err(CacheError::InvalidKey(_))));

        let req = set_request("k", json!("value"), Some(0), &[]);
        let result = set_handler(State(state), Json(req)).await;
        assert!(matches!(result, Err(CacheError::InvalidTtl(0))));
    }
}
