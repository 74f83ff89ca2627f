//! Explicit, dependency-injected replacement for the donor's implicit global mutable
//! chunker cache: an LRU keyed by the content hash of the effective config (spec §9).

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;

struct LruEntry<V> {
    value: Arc<V>,
    last_used: u64,
}

/// A small LRU cache mapping `EffectiveConfig` content hashes to constructed splitter
/// instances, so repeated documents sharing a configuration reuse the same splitter
/// rather than rebuilding it (e.g. compiled regexes, tiktoken encoders) per document.
pub struct SplitterCache<V> {
    entries: Mutex<HashMap<u64, LruEntry<V>>>,
    capacity: usize,
    clock: std::sync::atomic::AtomicU64,
}

impl<V> SplitterCache<V> {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            capacity,
            clock: std::sync::atomic::AtomicU64::new(0),
        }
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, std::sync::atomic::Ordering::Relaxed)
    }

    /// Return the cached instance for `key`, or construct it with `build` and cache it.
    pub fn get_or_insert_with(&self, key: u64, build: impl FnOnce() -> V) -> Arc<V> {
        let mut entries = self.entries.lock().expect("cache mutex poisoned");
        if let Some(entry) = entries.get_mut(&key) {
            entry.last_used = self.tick();
            return entry.value.clone();
        }

        let value = Arc::new(build());
        if entries.len() >= self.capacity {
            if let Some(oldest_key) = entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_used)
                .map(|(k, _)| *k)
            {
                entries.remove(&oldest_key);
            }
        }
        entries.insert(
            key,
            LruEntry {
                value: value.clone(),
                last_used: self.tick(),
            },
        );
        value
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("cache mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reuses_instance_for_same_key() {
        let cache: SplitterCache<String> = SplitterCache::new(2);
        let mut builds = 0;
        let a = cache.get_or_insert_with(1, || {
            builds += 1;
            "a".to_string()
        });
        let b = cache.get_or_insert_with(1, || {
            builds += 1;
            "a-rebuilt".to_string()
        });
        assert_eq!(*a, *b);
        assert_eq!(builds, 1);
    }

    #[test]
    fn evicts_least_recently_used_beyond_capacity() {
        let cache: SplitterCache<u32> = SplitterCache::new(2);
        cache.get_or_insert_with(1, || 100);
        cache.get_or_insert_with(2, || 200);
        // touch key 1 so key 2 becomes the least recently used
        cache.get_or_insert_with(1, || 999);
        cache.get_or_insert_with(3, || 300);

        assert_eq!(cache.len(), 2);
        let mut rebuilt_two = false;
        cache.get_or_insert_with(2, || {
            rebuilt_two = true;
            200
        });
        assert!(rebuilt_two, "key 2 should have been evicted");
    }
}
