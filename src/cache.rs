use crate::persistence::DataRecord;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Cache statistics for monitoring.
#[derive(Debug, Default)]
pub struct CacheStats {
    pub hits: AtomicU64,
    pub misses: AtomicU64,
    pub evictions: AtomicU64,
    pub invalidations: AtomicU64,
}

impl CacheStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_invalidation(&self) {
        self.invalidations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn get_misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn get_evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    pub fn get_invalidations(&self) -> u64 {
        self.invalidations.load(Ordering::Relaxed)
    }

    pub fn hit_rate(&self) -> f64 {
        let hits = self.get_hits();
        let total = hits + self.get_misses();
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }
}

/// Process-local cache of completed idempotency records.
///
/// Fixed capacity with least-recently-used eviction; `get` and `set` both
/// refresh recency. Mutations are synchronized internally so concurrent
/// workflow instances in one process may share an instance. The cache has no
/// TTL awareness of its own: the engine compares `expiry_timestamp` against
/// "now" at read time and removes stale entries through `remove`.
pub struct LocalCache {
    entries: Mutex<LruCache<String, DataRecord>>,
    stats: Arc<CacheStats>,
}

impl LocalCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            stats: Arc::new(CacheStats::new()),
        }
    }

    /// Returns cache statistics.
    pub fn stats(&self) -> Arc<CacheStats> {
        self.stats.clone()
    }

    /// Looks up a record, refreshing its recency on a hit.
    pub fn get(&self, key: &str) -> Option<DataRecord> {
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        match entries.get(key) {
            Some(record) => {
                self.stats.record_hit();
                Some(record.clone())
            }
            None => {
                self.stats.record_miss();
                None
            }
        }
    }

    /// Inserts or refreshes a record, evicting the least-recently-used entry
    /// when at capacity.
    pub fn set(&self, record: DataRecord) {
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        let key = record.idempotency_key.clone();
        if let Some((evicted_key, _)) = entries.push(key.clone(), record) {
            if evicted_key != key {
                self.stats.record_eviction();
            }
        }
    }

    pub fn remove(&self, key: &str) {
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        if entries.pop(key).is_some() {
            self.stats.record_invalidation();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("cache lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
