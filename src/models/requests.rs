//! Request DTOs for the cache server API
//!
//! Defines the structure of incoming HTTP request bodies.

use serde::Deserialize;
use serde_json::Value;

use crate::cache::{CacheKey, SetOptions};
use crate::error::Result;

/// Request body for the SET operation (PUT /set)
///
/// # Fields
/// - `key`: The cache key to store the value under
/// - `value`: Any JSON value
/// - `ttl`: Optional TTL in seconds (uses default if not specified)
/// - `tags`: Optional labels for bulk invalidation
#[derive(Debug, Clone, Deserialize)]
pub struct SetRequest {
    pub key: String,
    pub value: Value,
    #[serde(default)]
    pub ttl: Option<u64>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl SetRequest {
    /// Validates the request data
    pub fn validate(&self) -> Result<()> {
        CacheKey::validate(&self.key)?;
        self.options().validate()
    }

    /// Write options carried by the request.
    pub fn options(&self) -> SetOptions {
        SetOptions {
            ttl: self.ttl,
            tags: self.tags.iter().cloned().collect(),
        }
    }
}
