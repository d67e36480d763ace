//! Response Cache
//!
//! TTL-keyed cache shared by resilient reads (balances, prices, token
//! metadata). Entries are overwritten on every fresh fetch. Stale entries are
//! only reachable through the explicit degraded-mode accessor so callers can
//! tell the two apart.

use std::collections::HashMap;
use std::sync::RwLock;

use serde_json::Value;

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Value,
    stored_at: u64,
    ttl_ms: u64,
}

impl CacheEntry {
    fn is_fresh(&self, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.stored_at) < self.ttl_ms
    }
}

/// Process-wide TTL cache with per-key atomic updates
#[derive(Debug, Default)]
pub struct ResponseCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fresh value for a key, if its TTL has not elapsed
    pub fn get(&self, key: &str, now_ms: u64) -> Option<Value> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries
            .get(key)
            .filter(|entry| entry.is_fresh(now_ms))
            .map(|entry| entry.value.clone())
    }

    /// Value for a key regardless of TTL, with its age in ms.
    ///
    /// Degraded-mode accessor: used only when every endpoint has failed and a
    /// plausibly-stale answer beats stalling the caller.
    pub fn get_stale(&self, key: &str, now_ms: u64) -> Option<(Value, u64)> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries
            .get(key)
            .map(|entry| (entry.value.clone(), now_ms.saturating_sub(entry.stored_at)))
    }

    /// Store a freshly fetched value, replacing any previous entry
    pub fn insert(&self, key: impl Into<String>, value: Value, ttl_ms: u64, now_ms: u64) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.insert(
            key.into(),
            CacheEntry {
                value,
                stored_at: now_ms,
                ttl_ms,
            },
        );
    }

    /// Drop entries older than `max_age_ms`, returning how many were removed.
    ///
    /// Housekeeping hook so stale fallback data does not outlive its
    /// usefulness across long outages.
    pub fn evict_older_than(&self, max_age_ms: u64, now_ms: u64) -> usize {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let before = entries.len();
        entries.retain(|_, entry| now_ms.saturating_sub(entry.stored_at) <= max_age_ms);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
