//! Attribute-value cache (§4.10): a background refresher periodically loads
//! the distinct value set for cardinality-safe attributes. `attributeValues`
//! consults this first and falls back to a prefix-bounded `LIKE` query.
//! Stale entries are served while a refresh is in flight; at most one
//! concurrent refresh runs per attribute.

use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

struct Entry {
    values: Vec<String>,
    last_refreshed: Instant,
    ttl: Duration,
    refreshing: AtomicBool,
}

pub struct AttributeValueCache {
    entries: DashMap<String, Arc<Entry>>,
}

impl Default for AttributeValueCache {
    fn default() -> Self {
        Self::new()
    }
}

impl AttributeValueCache {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Returns the cached values for `key` if present, regardless of
    /// staleness — callers that want a refresh call `begin_refresh` first.
    pub fn get(&self, key: &str) -> Option<Vec<String>> {
        self.entries.get(key).map(|e| e.values.clone())
    }

    pub fn is_stale(&self, key: &str) -> bool {
        match self.entries.get(key) {
            Some(e) => e.last_refreshed.elapsed() >= e.ttl,
            None => true,
        }
    }

    /// Claims the right to refresh `key`; returns `true` at most once per
    /// outstanding refresh. A second caller observing `true` already held
    /// gets `false` and should just serve the (possibly stale) cached value.
    pub fn begin_refresh(&self, key: &str, ttl: Duration) -> bool {
        let entry = self.entries.entry(key.to_string()).or_insert_with(|| {
            Arc::new(Entry {
                values: Vec::new(),
                last_refreshed: Instant::now() - ttl - Duration::from_secs(1),
                ttl,
                refreshing: AtomicBool::new(false),
            })
        });
        entry
            .refreshing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    pub fn finish_refresh(&self, key: &str, values: Vec<String>, ttl: Duration) {
        self.entries.insert(
            key.to_string(),
            Arc::new(Entry {
                values,
                last_refreshed: Instant::now(),
                ttl,
                refreshing: AtomicBool::new(false),
            }),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_key_is_stale_and_uncached() {
        let cache = AttributeValueCache::new();
        assert!(cache.get("k").is_none());
        assert!(cache.is_stale("k"));
    }

    #[test]
    fn finish_refresh_makes_entry_fresh_and_readable() {
        let cache = AttributeValueCache::new();
        cache.finish_refresh("k", vec!["a".into(), "b".into()], Duration::from_secs(60));
        assert_eq!(cache.get("k"), Some(vec!["a".to_string(), "b".to_string()]));
        assert!(!cache.is_stale("k"));
    }

    #[test]
    fn only_one_caller_may_hold_a_refresh_at_a_time() {
        let cache = AttributeValueCache::new();
        assert!(cache.begin_refresh("k", Duration::from_secs(60)));
        assert!(!cache.begin_refresh("k", Duration::from_secs(60)));
        cache.finish_refresh("k", vec![], Duration::from_secs(60));
        assert!(cache.begin_refresh("k", Duration::from_secs(60)));
    }

    #[test]
    fn entry_becomes_stale_after_ttl_elapses() {
        let cache = AttributeValueCache::new();
        cache.finish_refresh("k", vec!["a".into()], Duration::from_millis(1));
        std::thread::sleep(Duration::from_millis(20));
        assert!(cache.is_stale("k"));
    }
}
