//! Configuration Module
//!
//! Handles loading and managing server configuration from environment variables.

use std::env;
use std::str::FromStr;

use crate::cache::{EdgeExpiry, EvictionPolicy, DEFAULT_MIN_EXPIRATION_TTL};

/// Server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Maximum number of entries the memory layer can hold
    pub max_entries: usize,
    /// Default TTL in seconds for writes without explicit TTL
    pub default_ttl: u64,
    /// HTTP server port
    pub server_port: u16,
    /// Background expiry sweep interval in seconds
    pub cleanup_interval: u64,
    /// Prefix for edge URLs and durable records
    pub cache_prefix: String,
    /// Memory layer eviction policy
    pub eviction_policy: EvictionPolicy,
    /// Whether the edge layer re-checks TTLs on read
    pub edge_expiry: EdgeExpiry,
    /// Margin added to provider-side expirations of durable records
    pub durable_min_ttl: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `MAX_ENTRIES` - Memory layer capacity (default: 1000)
    /// - `DEFAULT_TTL` - Default TTL in seconds (default: 300)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `CLEANUP_INTERVAL` - Expiry sweep frequency in seconds (default: 60)
    /// - `CACHE_PREFIX` - Edge URL / durable record prefix (default: `cache:`)
    /// - `EVICTION_POLICY` - `insertion` or `lru` (default: `insertion`)
    /// - `EDGE_EXPIRY` - `delegate` or `enforce` (default: `delegate`)
    /// - `DURABLE_MIN_TTL` - Provider expiration margin in seconds (default: 60)
    ///
    /// Values that fail to parse fall back to the default.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            max_entries: parse_var("MAX_ENTRIES").unwrap_or(defaults.max_entries),
            default_ttl: parse_var("DEFAULT_TTL")
                .filter(|ttl| *ttl > 0)
                .unwrap_or(defaults.default_ttl),
            server_port: parse_var("SERVER_PORT").unwrap_or(defaults.server_port),
            cleanup_interval: parse_var("CLEANUP_INTERVAL")
                .filter(|secs| *secs > 0)
                .unwrap_or(defaults.cleanup_interval),
            cache_prefix: env::var("CACHE_PREFIX").unwrap_or(defaults.cache_prefix),
            eviction_policy: env::var("EVICTION_POLICY")
                .ok()
                .and_then(|v| EvictionPolicy::parse(&v))
                .unwrap_or(defaults.eviction_policy),
            edge_expiry: env::var("EDGE_EXPIRY")
                .ok()
                .and_then(|v| EdgeExpiry::parse(&v))
                .unwrap_or(defaults.edge_expiry),
            durable_min_ttl: parse_var("DURABLE_MIN_TTL").unwrap_or(defaults.durable_min_ttl),
        }
    }
}

fn parse_var<T: FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_entries: 1000,
            default_ttl: 300,
            server_port: 3000,
            cleanup_interval: 60,
            cache_prefix: "cache:".to_string(),
            eviction_policy: EvictionPolicy::InsertionOrder,
            edge_expiry: EdgeExpiry::Delegate,
            durable_min_ttl: DEFAULT_MIN_EXPIRATION_TTL,
        }
    }
}
