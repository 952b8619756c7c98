//! Caching utilities for vidhop

use crate::utils::clock::{Clock, SystemClock};
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// In-memory cache with per-entry TTL and an injectable clock
pub struct TtlCache<K, V, C = SystemClock> {
    entries: Arc<Mutex<HashMap<K, CachedValue<V>>>>,
    clock: C,
    default_ttl: Duration,
}

#[derive(Clone)]
struct CachedValue<V> {
    value: V,
    expires_at: Instant,
}

impl<K, V> TtlCache<K, V, SystemClock>
where
    K: Hash + Eq + Clone + Send + 'static,
    V: Clone + Send + 'static,
{
    pub fn new(default_ttl: Duration) -> Self {
        Self::with_clock(default_ttl, SystemClock)
    }
}

impl<K, V, C> TtlCache<K, V, C>
where
    K: Hash + Eq + Clone + Send + 'static,
    V: Clone + Send + 'static,
    C: Clock,
{
    pub fn with_clock(default_ttl: Duration, clock: C) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            clock,
            default_ttl,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<K, CachedValue<V>>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get(&self, key: &K) -> Option<V> {
        let now = self.clock.now();
        let mut entries = self.lock();
        if let Some(cached_value) = entries.get(key) {
            if cached_value.expires_at > now {
                return Some(cached_value.value.clone());
            }
            entries.remove(key);
        }
        None
    }

    /// Insert with the cache's default TTL
    pub fn insert(&self, key: K, value: V) {
        self.insert_with_ttl(key, value, self.default_ttl);
    }

    pub fn insert_with_ttl(&self, key: K, value: V, ttl: Duration) {
        let expires_at = self.clock.now() + ttl;
        self.lock().insert(key, CachedValue { value, expires_at });
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        self.lock().remove(key).map(|cached_value| cached_value.value)
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn cleanup_expired(&self) {
        let now = self.clock.now();
        self.lock().retain(|_, cached_value| cached_value.expires_at > now);
    }

    /// Number of entries, including ones that expired but were not yet evicted
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::clock::ManualClock;

    #[test]
    fn test_ttl_cache_expiry() {
        let clock = ManualClock::new();
        let cache = TtlCache::with_clock(Duration::from_secs(1), clock.clone());

        cache.insert("key1", "value1");
        assert_eq!(cache.get(&"key1"), Some("value1"));

        clock.advance(Duration::from_millis(999));
        assert_eq!(cache.get(&"key1"), Some("value1"));

        clock.advance(Duration::from_millis(1));
        assert_eq!(cache.get(&"key1"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_remove_and_clear() {
        let cache = TtlCache::with_clock(Duration::from_secs(10), ManualClock::new());

        cache.insert("key2", "value2");
        assert_eq!(cache.remove(&"key2"), Some("value2"));
        assert_eq!(cache.get(&"key2"), None);

        cache.insert("key3", "value3");
        cache.clear();
        assert_eq!(cache.get(&"key3"), None);
    }

    #[test]
    fn test_cleanup_expired() {
        let clock = ManualClock::new();
        let cache = TtlCache::with_clock(Duration::from_secs(10), clock.clone());

        cache.insert_with_ttl("key1", "value1", Duration::from_millis(100));
        cache.insert("key2", "value2");

        clock.advance(Duration::from_millis(150));
        cache.cleanup_expired();

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&"key1"), None);
        assert_eq!(cache.get(&"key2"), Some("value2"));
    }

    #[test]
    fn test_system_clock_cache() {
        let cache: TtlCache<String, u32> = TtlCache::new(Duration::from_secs(60));
        cache.insert("a".to_string(), 1);
        assert_eq!(cache.get(&"a".to_string()), Some(1));
        assert_eq!(cache.default_ttl(), Duration::from_secs(60));
    }
}
