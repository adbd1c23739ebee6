//! TTL-aware result cache keyed by deterministic request fingerprints.
//!
//! Entries are lazily evicted: an expired entry behaves exactly like a
//! missing one and is overwritten by the next `set`. There is no
//! background sweep. Concurrent misses for the same fingerprint may both
//! recompute; that race is tolerated because recomputation is idempotent.

use crate::core::config::CacheConfig;
use dashmap::DashMap;
use serde_json::Value;
use std::time::Duration;

/// A memoized tool result with its expiry instant
#[derive(Debug, Clone)]
struct CacheEntry {
    value: Value,
    expires_at_ms: i64,
}

/// Generic expiring key/value store shared by all tool resolvers.
pub struct CacheStore {
    entries: DashMap<String, CacheEntry>,
    max_entries: usize,
    enabled: bool,
}

impl CacheStore {
    /// Create a cache store from its configuration section
    pub fn new(config: &CacheConfig) -> Self {
        CacheStore {
            entries: DashMap::new(),
            max_entries: config.max_entries,
            enabled: config.enabled,
        }
    }

    /// Look up a live entry; expired entries are removed and reported as misses
    pub fn get(&self, key: &str) -> Option<Value> {
        self.get_at(key, now_ms())
    }

    /// Store a value with the given TTL, overwriting any previous entry
    pub fn set(&self, key: &str, value: Value, ttl: Duration) {
        self.set_at(key, value, ttl, now_ms());
    }

    /// Number of entries currently held (live and not-yet-evicted expired)
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the cache holds no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn get_at(&self, key: &str, now_ms: i64) -> Option<Value> {
        if !self.enabled {
            return None;
        }
        let expired = match self.entries.get(key) {
            Some(entry) if now_ms < entry.expires_at_ms => {
                tracing::debug!(key, "cache hit");
                return Some(entry.value.clone());
            },
            Some(_) => true,
            None => false,
        };
        // The read guard is released before touching the map again.
        if expired {
            self.entries.remove(key);
        }
        None
    }

    fn set_at(&self, key: &str, value: Value, ttl: Duration, now_ms: i64) {
        if !self.enabled {
            return;
        }
        if self.entries.len() >= self.max_entries && !self.entries.contains_key(key) {
            self.entries
                .retain(|_, entry| now_ms < entry.expires_at_ms);
            if self.entries.len() >= self.max_entries {
                tracing::debug!(key, "cache full, skipping insert");
                return;
            }
        }
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                expires_at_ms: now_ms + ttl.as_millis() as i64,
            },
        );
    }
}

/// Deterministic cache key for a tool invocation.
///
/// Parameters are sorted by field name and rendered as `name=JSON(value)`
/// pairs, so two logically identical requests with differently-ordered
/// fields collapse to the same entry. `null` fields are treated as absent.
pub fn fingerprint(operation: &str, params: &Value) -> String {
    let mut key = String::with_capacity(64);
    key.push_str(operation);

    match params {
        Value::Object(map) => {
            let mut names: Vec<&String> = map
                .iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, _)| k)
                .collect();
            names.sort();
            for name in names {
                key.push(':');
                key.push_str(name);
                key.push('=');
                // Map values serialize with sorted keys as well.
                key.push_str(&map[name].to_string());
            }
        },
        Value::Null => {},
        other => {
            key.push(':');
            key.push_str(&other.to_string());
        },
    }

    key
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store() -> CacheStore {
        CacheStore::new(&CacheConfig::default())
    }

    #[test]
    fn test_fingerprint_is_order_independent() {
        let mut first = serde_json::Map::new();
        first.insert("service".to_string(), json!("checkout"));
        first.insert("environment".to_string(), json!("prod"));
        first.insert("limit".to_string(), json!(25));

        let mut second = serde_json::Map::new();
        second.insert("limit".to_string(), json!(25));
        second.insert("environment".to_string(), json!("prod"));
        second.insert("service".to_string(), json!("checkout"));

        assert_eq!(
            fingerprint("search_logs", &Value::Object(first)),
            fingerprint("search_logs", &Value::Object(second))
        );
    }

    #[test]
    fn test_fingerprint_treats_null_as_absent() {
        let with_null = json!({"service": "checkout", "environment": null});
        let without = json!({"service": "checkout"});
        assert_eq!(
            fingerprint("get_service_health", &with_null),
            fingerprint("get_service_health", &without)
        );
    }

    #[test]
    fn test_fingerprint_distinguishes_operations_and_values() {
        let params = json!({"service": "checkout"});
        assert_ne!(fingerprint("get_monitors", &params), fingerprint("search_logs", &params));
        assert_ne!(
            fingerprint("get_monitors", &json!({"service": "checkout"})),
            fingerprint("get_monitors", &json!({"service": "billing"}))
        );
    }

    #[test]
    fn test_entry_expires_at_ttl_boundary() {
        let cache = store();
        let t0 = 1_700_000_000_000;
        cache.set_at("k", json!({"v": 1}), Duration::from_millis(100), t0);

        assert!(cache.get_at("k", t0 + 99).is_some());
        // now >= expires_at reads as a miss.
        assert!(cache.get_at("k", t0 + 100).is_none());
        assert!(cache.get_at("k", t0 + 5_000).is_none());
    }

    #[test]
    fn test_expired_entry_overwritten_by_set() {
        let cache = store();
        let t0 = 1_700_000_000_000;
        cache.set_at("k", json!(1), Duration::from_millis(50), t0);
        assert!(cache.get_at("k", t0 + 60).is_none());

        cache.set_at("k", json!(2), Duration::from_millis(50), t0 + 60);
        assert_eq!(cache.get_at("k", t0 + 70), Some(json!(2)));
    }

    #[test]
    fn test_disabled_cache_never_hits() {
        let mut config = CacheConfig::default();
        config.enabled = false;
        let cache = CacheStore::new(&config);

        cache.set("k", json!(1), Duration::from_secs(60));
        assert!(cache.get("k").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_full_cache_purges_expired_before_refusing() {
        let mut config = CacheConfig::default();
        config.max_entries = 2;
        let cache = CacheStore::new(&config);
        let t0 = 1_700_000_000_000;

        cache.set_at("a", json!(1), Duration::from_millis(10), t0);
        cache.set_at("b", json!(2), Duration::from_secs(60), t0);
        // "a" is expired by now, so there is room for "c".
        cache.set_at("c", json!(3), Duration::from_secs(60), t0 + 20);

        assert!(cache.get_at("c", t0 + 30).is_some());
        assert!(cache.get_at("a", t0 + 30).is_none());
    }
}
