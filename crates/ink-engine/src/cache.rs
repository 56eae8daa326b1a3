//! A time-boxed cache with explicit TTL and explicit invalidation.
//!
//! Used for values that are safe to serve slightly stale — engagement
//! snapshots, externally fetched configuration — without hiding the caching
//! behind an opaque memoization layer.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Duration, Utc};

type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

struct CacheEntry<V> {
    value: V,
    expires_at: DateTime<Utc>,
}

/// Key-value cache whose entries expire after a fixed TTL.
pub struct TtlCache<K, V> {
    entries: Mutex<HashMap<K, CacheEntry<V>>>,
    ttl: Duration,
    clock: Clock,
}

impl<K: Eq + Hash, V: Clone> TtlCache<K, V> {
    /// Create a cache whose entries live for `ttl`.
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
            clock: Arc::new(Utc::now),
        }
    }

    /// Create a cache with an injected clock. Keeps expiry deterministic in
    /// tests.
    pub fn with_clock(
        ttl: Duration,
        clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static,
    ) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
            clock: Arc::new(clock),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<K, CacheEntry<V>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert a value, replacing any previous entry for the key.
    pub fn insert(&self, key: K, value: V) {
        let expires_at = (self.clock)() + self.ttl;
        self.lock().insert(key, CacheEntry { value, expires_at });
    }

    /// Fetch a value. Expired entries are removed and reported as absent.
    pub fn get(&self, key: &K) -> Option<V> {
        let now = (self.clock)();
        let mut entries = self.lock();
        match entries.get(key) {
            Some(entry) if entry.expires_at > now => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Explicitly drop an entry before its TTL elapses.
    pub fn invalidate(&self, key: &K) -> Option<V> {
        self.lock().remove(key).map(|entry| entry.value)
    }

    /// Drop every expired entry.
    pub fn purge_expired(&self) {
        let now = (self.clock)();
        self.lock().retain(|_, entry| entry.expires_at > now);
    }

    /// Number of entries, including not-yet-purged expired ones.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI64, Ordering};

    /// A cache whose clock is advanced manually.
    fn test_cache(ttl_secs: i64) -> (TtlCache<&'static str, u32>, Arc<AtomicI64>) {
        let now = Arc::new(AtomicI64::new(0));
        let clock_now = Arc::clone(&now);
        let cache = TtlCache::with_clock(Duration::seconds(ttl_secs), move || {
            DateTime::from_timestamp(clock_now.load(Ordering::SeqCst), 0).unwrap_or_default()
        });
        (cache, now)
    }

    #[test]
    fn hit_within_ttl() {
        let (cache, _) = test_cache(60);
        cache.insert("snapshot", 42);
        assert_eq!(cache.get(&"snapshot"), Some(42));
    }

    #[test]
    fn miss_after_expiry() {
        let (cache, now) = test_cache(60);
        cache.insert("snapshot", 42);
        now.store(61, Ordering::SeqCst);
        assert_eq!(cache.get(&"snapshot"), None);
        // The expired entry was removed on read.
        assert!(cache.is_empty());
    }

    #[test]
    fn explicit_invalidation() {
        let (cache, _) = test_cache(60);
        cache.insert("snapshot", 42);
        assert_eq!(cache.invalidate(&"snapshot"), Some(42));
        assert_eq!(cache.get(&"snapshot"), None);
    }

    #[test]
    fn purge_removes_only_expired_entries() {
        let (cache, now) = test_cache(60);
        cache.insert("old", 1);
        now.store(30, Ordering::SeqCst);
        cache.insert("new", 2);
        now.store(61, Ordering::SeqCst);

        cache.purge_expired();
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&"new"), Some(2));
    }
}
