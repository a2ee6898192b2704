//! Resolved-handle cache.
//!
//! Maps exact resource strings to handles so repeated resolution returns
//! the same instance. Entries expire after a period without access, and
//! the least recently used entry is evicted when the cache is full.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::trace;

use crate::{CacheConfig, ResourceHandle};

struct CachedHandle {
    handle: ResourceHandle,
    last_access: Instant,
}

/// Bounded, time-expiring map from resource string to handle.
pub struct HandleCache {
    entries: Mutex<HashMap<String, CachedHandle>>,
    capacity: usize,
    ttl: Duration,
}

impl HandleCache {
    /// Create a cache from its settings.
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            capacity: config.capacity.max(1),
            ttl: config.ttl,
        }
    }

    /// Look up `key`, refreshing its access time. Expired entries are dropped.
    pub fn get(&self, key: &str) -> Option<ResourceHandle> {
        let mut entries = self.entries.lock();
        let now = Instant::now();
        match entries.get_mut(key) {
            Some(entry) if now.duration_since(entry.last_access) < self.ttl => {
                entry.last_access = now;
                Some(Arc::clone(&entry.handle))
            }
            Some(_) => {
                trace!(key, "cache entry expired");
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Insert `handle` under every key in `keys`, unless one of them already
    /// maps to a live handle, in which case that handle wins and is
    /// returned instead.
    ///
    /// Lookup and insert happen under one lock, so two threads resolving
    /// the same string concurrently end up with the same instance.
    pub fn insert_or_get(&self, keys: &[&str], handle: ResourceHandle) -> ResourceHandle {
        let mut entries = self.entries.lock();
        let now = Instant::now();

        let existing = keys.iter().find_map(|key| {
            entries
                .get(*key)
                .filter(|e| now.duration_since(e.last_access) < self.ttl)
                .map(|e| Arc::clone(&e.handle))
        });
        let winner = existing.unwrap_or(handle);

        for key in keys {
            if !entries.contains_key(*key) {
                self.evict_if_needed(&mut entries);
            }
            entries.insert(
                (*key).to_string(),
                CachedHandle {
                    handle: Arc::clone(&winner),
                    last_access: now,
                },
            );
        }
        winner
    }

    /// Number of entries, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Drop expired entries and return how many were removed.
    pub fn purge_expired(&self) -> usize {
        let mut entries = self.entries.lock();
        let now = Instant::now();
        let before = entries.len();
        entries.retain(|_, e| now.duration_since(e.last_access) < self.ttl);
        before - entries.len()
    }

    fn evict_if_needed(&self, entries: &mut HashMap<String, CachedHandle>) {
        while entries.len() >= self.capacity {
            let oldest = entries
                .iter()
                .min_by_key(|(_, e)| e.last_access)
                .map(|(k, _)| k.clone());

            if let Some(key) = oldest {
                trace!(key = %key, "evicting least recently used handle");
                entries.remove(&key);
            } else {
                break;
            }
        }
    }
}

impl std::fmt::Debug for HandleCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandleCache")
            .field("len", &self.len())
            .field("capacity", &self.capacity)
            .field("ttl", &self.ttl)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ResourceFactory;

    fn cache(capacity: usize, ttl: Duration) -> HandleCache {
        HandleCache::new(&CacheConfig::default().with_capacity(capacity).with_ttl(ttl))
    }

    #[test]
    fn first_insert_wins() {
        let factory = ResourceFactory::default();
        let cache = cache(8, Duration::from_secs(60));
        let a = factory.from_bytes("a", Vec::new());
        let b = factory.from_bytes("b", Vec::new());

        let first = cache.insert_or_get(&["/x"], Arc::clone(&a));
        let second = cache.insert_or_get(&["/x"], b);
        assert!(Arc::ptr_eq(&first, &a));
        assert!(Arc::ptr_eq(&second, &a));
    }

    #[test]
    fn aliases_share_an_instance() {
        let factory = ResourceFactory::default();
        let cache = cache(8, Duration::from_secs(60));
        let handle = factory.from_bytes("dir", Vec::new());
        cache.insert_or_get(&["/d", "/d/"], Arc::clone(&handle));
        assert!(Arc::ptr_eq(&cache.get("/d").unwrap(), &cache.get("/d/").unwrap()));
    }

    #[test]
    fn least_recently_used_is_evicted() {
        let factory = ResourceFactory::default();
        let cache = cache(2, Duration::from_secs(60));
        cache.insert_or_get(&["a"], factory.from_bytes("a", Vec::new()));
        std::thread::sleep(Duration::from_millis(2));
        cache.insert_or_get(&["b"], factory.from_bytes("b", Vec::new()));
        std::thread::sleep(Duration::from_millis(2));
        cache.get("a");
        cache.insert_or_get(&["c"], factory.from_bytes("c", Vec::new()));

        assert_eq!(cache.len(), 2);
        assert!(cache.get("a").is_some());
        assert!(cache.get("b").is_none());
    }

    #[test]
    fn expired_entries_are_dropped() {
        let factory = ResourceFactory::default();
        let cache = cache(8, Duration::from_millis(1));
        cache.insert_or_get(&["a"], factory.from_bytes("a", Vec::new()));
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(cache.purge_expired(), 1);
        assert!(cache.is_empty());
    }
}
