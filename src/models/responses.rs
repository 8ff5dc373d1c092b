//! Response DTOs for the cache server API
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;
use serde_json::Value;

use crate::cache::{CacheStats, LayerHits, MultiLayerStats};

/// Response body for the GET operation (GET /get/:key)
#[derive(Debug, Clone, Serialize)]
pub struct GetResponse {
    pub key: String,
    pub value: Value,
}

impl GetResponse {
    pub fn new(key: impl Into<String>, value: Value) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}

/// Response body for the SET operation (PUT /set)
#[derive(Debug, Clone, Serialize)]
pub struct SetResponse {
    /// Success message
    pub message: String,
    /// The key that was set
    pub key: String,
}

impl SetResponse {
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            message: format!("Key '{}' set successfully", key),
            key,
        }
    }
}

/// Response body for the DELETE operation (DELETE /del/:key)
#[derive(Debug, Clone, Serialize)]
pub struct DeleteResponse {
    pub message: String,
    pub key: String,
    /// Whether any layer held the key
    pub deleted: bool,
}

impl DeleteResponse {
    pub fn new(key: impl Into<String>, deleted: bool) -> Self {
        let key = key.into();
        let message = if deleted {
            format!("Key '{}' deleted successfully", key)
        } else {
            format!("Key '{}' was not cached", key)
        };
        Self {
            message,
            key,
            deleted,
        }
    }
}

/// Response body for tag invalidation (POST /invalidate/:tag)
#[derive(Debug, Clone, Serialize)]
pub struct InvalidateResponse {
    pub tag: String,
    /// Number of distinct keys dropped
    pub invalidated: usize,
}

impl InvalidateResponse {
    pub fn new(tag: impl Into<String>, invalidated: usize) -> Self {
        Self {
            tag: tag.into(),
            invalidated,
        }
    }
}

/// Response body for the stats endpoint (GET /stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    /// Memory layer hits
    pub hits: u64,
    /// Memory layer misses
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
    /// Current number of entries in the memory layer
    pub total_entries: usize,
    /// Memory layer hit rate (hits / (hits + misses))
    pub hit_rate: f64,
    /// Where multi-layer reads were served from
    pub layers: Vec<LayerHits>,
    /// Reads no layer could serve
    pub layer_misses: u64,
}

impl StatsResponse {
    pub fn new(memory: &CacheStats, layers: MultiLayerStats) -> Self {
        Self {
            hits: memory.hits,
            misses: memory.misses,
            evictions: memory.evictions,
            expirations: memory.expirations,
            total_entries: memory.total_entries,
            hit_rate: memory.hit_rate(),
            layers: layers.layers,
            layer_misses: layers.misses,
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_get_response_serialize() {
        let resp = GetResponse::new("user:1", json!({"name": "Ann"}));
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json, json!({"key": "user:1", "value": {"name": "Ann"}}));
    }

    #[test]
    fn test_set_response_serialize() {
        let resp = SetResponse::new("my_key");
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("my_key"));
        assert!(json.contains("successfully"));
    }

    #[test]
    fn test_delete_response_messages() {
        assert!(DeleteResponse::new("k", true).message.contains("deleted"));
        let missing = DeleteResponse::new("k", false);
        assert!(!missing.deleted);
        assert!(missing.message.contains("not cached"));
    }

    #[test]
    fn test_stats_response_hit_rate() {
        let memory = CacheStats {
            hits: 80,
            misses: 20,
            evictions: 5,
            expirations: 2,
            total_entries: 100,
        };
        let layers = MultiLayerStats {
            layers: vec![LayerHits {
                name: "memory".to_string(),
                hits: 80,
            }],
            misses: 3,
        };

        let resp = StatsResponse::new(&memory, layers);
        assert!((resp.hit_rate - 0.8).abs() < 0.001);
        assert_eq!(resp.layer_misses, 3);
        assert_eq!(resp.layers[0].name, "memory");
    }

    #[test]
    fn test_health_response_serialize() {
        let resp = HealthResponse::healthy();
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("healthy"));
        assert!(json.contains("timestamp"));
    }
}
