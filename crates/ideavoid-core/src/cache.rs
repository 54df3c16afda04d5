//! A small thread-safe TTL cache keyed by string.
//!
//! Expired entries are dropped lazily on lookup and swept on insert once
//! the map grows past [`SWEEP_THRESHOLD`].

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use serde::Serialize;

const SWEEP_THRESHOLD: usize = 1024;

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

struct Inner<V> {
    entries: HashMap<String, Entry<V>>,
    hits: u64,
    misses: u64,
}

/// Hit/miss counters and current size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

pub struct TtlCache<V> {
    ttl: Duration,
    inner: Mutex<Inner<V>>,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                hits: 0,
                misses: 0,
            }),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn lock(&self) -> MutexGuard<'_, Inner<V>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get(&self, key: &str) -> Option<V> {
        let mut inner = self.lock();
        let now = Instant::now();
        let fresh = match inner.entries.get(key) {
            Some(entry) if entry.expires_at > now => Some(entry.value.clone()),
            Some(_) => {
                inner.entries.remove(key);
                None
            }
            None => None,
        };
        if fresh.is_some() {
            inner.hits += 1;
        } else {
            inner.misses += 1;
        }
        fresh
    }

    pub fn insert(&self, key: impl Into<String>, value: V) {
        let ttl = self.ttl;
        self.insert_with_ttl(key, value, ttl);
    }

    pub fn insert_with_ttl(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let mut inner = self.lock();
        let now = Instant::now();
        if inner.entries.len() >= SWEEP_THRESHOLD {
            inner.entries.retain(|_, e| e.expires_at > now);
        }
        inner.entries.insert(
            key.into(),
            Entry {
                value,
                expires_at: now + ttl,
            },
        );
    }

    pub fn remove(&self, key: &str) -> Option<V> {
        self.lock().entries.remove(key).map(|e| e.value)
    }

    pub fn clear(&self) {
        self.lock().entries.clear();
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.lock();
        CacheStats {
            entries: inner.entries.len(),
            hits: inner.hits,
            misses: inner.misses,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_after_insert() {
        let cache = TtlCache::new(Duration::from_secs(60));
        cache.insert("a", 1);
        assert_eq!(cache.get("a"), Some(1));
        assert_eq!(cache.get("b"), None);
        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 1);
    }

    #[test]
    fn test_entries_expire() {
        let cache = TtlCache::new(Duration::from_millis(10));
        cache.insert("a", "value".to_string());
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.stats().entries, 0);
    }

    #[test]
    fn test_remove_and_clear() {
        let cache = TtlCache::new(Duration::from_secs(60));
        cache.insert("a", 1);
        cache.insert("b", 2);
        assert_eq!(cache.remove("a"), Some(1));
        assert_eq!(cache.get("a"), None);
        cache.clear();
        assert_eq!(cache.get("b"), None);
    }

    #[test]
    fn test_per_entry_ttl() {
        let cache = TtlCache::new(Duration::from_secs(60));
        cache.insert_with_ttl("short", 1, Duration::from_millis(5));
        cache.insert("long", 2);
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(cache.get("short"), None);
        assert_eq!(cache.get("long"), Some(2));
    }
}
