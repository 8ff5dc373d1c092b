//! Error types for the layered cache
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for cache layers, the multi-layer cache and the server.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Key is empty or too long
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// TTL must be greater than zero
    #[error("Invalid TTL: {0} seconds (must be > 0)")]
    InvalidTtl(u64),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Key not found in any layer
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Value could not be encoded or decoded as JSON
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An underlying store failed
    #[error("Layer '{layer}' failed: {message}")]
    Backend { layer: String, message: String },

    /// One or more layers failed during a fan-out write or delete.
    /// The remaining layers were still attempted and are not rolled back.
    #[error("{operation} failed on layers: {}", .layers.join(", "))]
    LayerFailures {
        operation: &'static str,
        layers: Vec<String>,
    },

    /// The cache-aside fetcher failed
    #[error("Fetch failed: {0}")]
    Fetch(#[from] anyhow::Error),

    /// Internal error (poisoned lock and the like)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CacheError {
    /// Shorthand for a store failure attributed to a layer.
    pub fn backend(layer: impl Into<String>, message: impl ToString) -> Self {
        CacheError::Backend {
            layer: layer.into(),
            message: message.to_string(),
        }
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::InvalidKey(_)
            | CacheError::InvalidTtl(_)
            | CacheError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            CacheError::NotFound(_) => StatusCode::NOT_FOUND,
            CacheError::Backend { .. } | CacheError::LayerFailures { .. } | CacheError::Fetch(_) => {
                StatusCode::BAD_GATEWAY
            }
            CacheError::Serialization(_) | CacheError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache.
pub type Result<T> = std::result::Result<T, CacheError>;
