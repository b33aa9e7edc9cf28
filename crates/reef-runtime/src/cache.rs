//! Compiled-module cache with LRU eviction.
//!
//! Maps an endpoint id to its compiled [`wasmtime::Module`]. Compilation
//! is the expensive step; instantiation from a cached module is cheap, so
//! every runtime worker consults this cache before compiling.
//!
//! Two concurrent misses on the same endpoint may both compile; the last
//! `put` wins. That is sound because compilation is pure over the blob
//! bytes. Entries are evicted least-recently-used once the configured
//! capacity is reached; callers must tolerate absence at any time.
//!
//! Cache statistics (hits, misses, evictions) are surfaced as debug logs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use parking_lot::Mutex;
use tracing::debug;
use uuid::Uuid;
use wasmtime::Module;

/// A cached compiled module with its last-used stamp.
struct CacheEntry {
    module: Module,
    last_used: Instant,
}

/// Thread-safe bounded cache of compiled modules, keyed by endpoint id.
///
/// `Module` is internally reference-counted, so `get` hands out cheap
/// clones; a returned module stays valid even if the entry is evicted
/// while a worker is still using it.
pub struct ModuleCache {
    entries: Mutex<HashMap<Uuid, CacheEntry>>,
    max_entries: usize,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl ModuleCache {
    /// Create a cache holding at most `max_entries` compiled modules.
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            max_entries: max_entries.max(1),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Look up the compiled module for an endpoint, refreshing its
    /// LRU stamp on hit.
    pub fn get(&self, endpoint_id: Uuid) -> Option<Module> {
        let mut entries = self.entries.lock();
        match entries.get_mut(&endpoint_id) {
            Some(entry) => {
                entry.last_used = Instant::now();
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.module.clone())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Store (or replace) the compiled module for an endpoint, evicting
    /// the least-recently-used entry if the cache is full.
    pub fn put(&self, endpoint_id: Uuid, module: Module) {
        let mut entries = self.entries.lock();
        if !entries.contains_key(&endpoint_id) && entries.len() >= self.max_entries {
            if let Some(victim) = entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_used)
                .map(|(id, _)| *id)
            {
                entries.remove(&victim);
                self.evictions.fetch_add(1, Ordering::Relaxed);
                debug!(endpoint = %victim, "evicted compiled module");
            }
        }
        entries.insert(
            endpoint_id,
            CacheEntry {
                module,
                last_used: Instant::now(),
            },
        );
    }

    /// Number of cached modules.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Accumulated (hits, misses, evictions) counters.
    pub fn stats(&self) -> (u64, u64, u64) {
        (
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
            self.evictions.load(Ordering::Relaxed),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use wasmtime::Engine;

    fn test_module(engine: &Engine) -> Module {
        Module::new(engine, "(module)").unwrap()
    }

    #[test]
    fn miss_then_hit() {
        let engine = Engine::default();
        let cache = ModuleCache::new(8);
        let id = Uuid::new_v4();

        assert!(cache.get(id).is_none());
        cache.put(id, test_module(&engine));
        assert!(cache.get(id).is_some());

        let (hits, misses, _) = cache.stats();
        assert_eq!((hits, misses), (1, 1));
    }

    #[test]
    fn replace_does_not_grow_cache() {
        let engine = Engine::default();
        let cache = ModuleCache::new(8);
        let id = Uuid::new_v4();

        cache.put(id, test_module(&engine));
        cache.put(id, test_module(&engine));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn lru_eviction_at_capacity() {
        let engine = Engine::default();
        let cache = ModuleCache::new(2);
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

        cache.put(a, test_module(&engine));
        cache.put(b, test_module(&engine));
        // Touch `a` so `b` becomes the LRU victim.
        cache.get(a);
        cache.put(c, test_module(&engine));

        assert_eq!(cache.len(), 2);
        assert!(cache.get(a).is_some());
        assert!(cache.get(b).is_none());
        assert!(cache.get(c).is_some());

        let (_, _, evictions) = cache.stats();
        assert_eq!(evictions, 1);
    }

    #[test]
    fn concurrent_misses_both_succeed() {
        let engine = Engine::default();
        let cache = Arc::new(ModuleCache::new(8));
        let id = Uuid::new_v4();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let cache = cache.clone();
                let engine = engine.clone();
                std::thread::spawn(move || {
                    // Simulate the miss-compile-put path of a worker.
                    if cache.get(id).is_none() {
                        cache.put(id, test_module(&engine));
                    }
                    cache.get(id).is_some()
                })
            })
            .collect();

        for handle in handles {
            assert!(handle.join().unwrap());
        }
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn evicted_module_stays_usable() {
        let engine = Engine::default();
        let cache = ModuleCache::new(1);
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

        cache.put(a, test_module(&engine));
        let held = cache.get(a).unwrap();
        cache.put(b, test_module(&engine));

        assert!(cache.get(a).is_none());
        // The clone handed out before eviction is still a valid module.
        assert!(held.name().is_none());
    }
}
