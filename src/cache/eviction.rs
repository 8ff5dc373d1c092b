//! Eviction Module
//!
//! Tracks key order for the memory layer's capacity eviction.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

// == Eviction Policy ==
/// Which key the memory layer gives up when it is full.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvictionPolicy {
    /// Evict the oldest-inserted key. Reads never reorder, and overwriting a
    /// key keeps its original position.
    #[default]
    InsertionOrder,
    /// Evict the least recently read or written key.
    LeastRecentlyUsed,
}

impl EvictionPolicy {
    /// Parses `insertion`/`fifo` or `lru`.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "insertion" | "insertion_order" | "fifo" => Some(Self::InsertionOrder),
            "lru" | "least_recently_used" => Some(Self::LeastRecentlyUsed),
            _ => None,
        }
    }
}

// == Eviction Tracker ==
/// Keeps keys in eviction order.
///
/// - Front = next to keep (most recent)
/// - Back = next to evict
#[derive(Debug, Default)]
pub struct EvictionTracker {
    policy: EvictionPolicy,
    order: VecDeque<String>,
}

impl EvictionTracker {
    pub fn new(policy: EvictionPolicy) -> Self {
        Self {
            policy,
            order: VecDeque::new(),
        }
    }

    pub fn policy(&self) -> EvictionPolicy {
        self.policy
    }

    // == Record Insert ==
    /// Registers a write of `key`.
    pub fn record_insert(&mut self, key: &str) {
        match self.policy {
            EvictionPolicy::InsertionOrder => {
                if !self.contains(key) {
                    self.order.push_front(key.to_string());
                }
            }
            EvictionPolicy::LeastRecentlyUsed => self.move_to_front(key),
        }
    }

    // == Record Access ==
    /// Registers a read of `key`. Only reorders under LRU.
    pub fn record_access(&mut self, key: &str) {
        if self.policy == EvictionPolicy::LeastRecentlyUsed {
            self.move_to_front(key);
        }
    }

    fn move_to_front(&mut self, key: &str) {
        self.remove(key);
        self.order.push_front(key.to_string());
    }

    pub fn remove(&mut self, key: &str) {
        self.order.retain(|k| k != key);
    }

    // == Evict Next ==
    /// Returns and removes the next key to evict, None if empty.
    pub fn evict_next(&mut self) -> Option<String> {
        self.order.pop_back()
    }

    pub fn peek_next(&self) -> Option<&String> {
        self.order.back()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.order.iter().any(|k| k == key)
    }
}
