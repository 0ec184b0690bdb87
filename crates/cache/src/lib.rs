//! Read-through response cache for dispatch results.
//!
//! Memoizes successful adapter outputs by `(agent id, canonical input)`
//! key. Failures are never stored — `put` accepts only the success payload
//! type, so the invariant holds by construction and transient upstream
//! recovery is never masked.
//!
//! Eviction: TTL expiry checked lazily on `get`, plus a bounded-capacity
//! LRU fallback. Concurrency: a `std::sync::Mutex` held only for the map
//! operation itself (never across an await), which gives last-write-wins
//! on key collision and no torn reads.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::debug;

/// The cached portion of a successful invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedResponse {
    /// The normalized output exactly as produced by the adapter.
    pub output: serde_json::Value,
    /// Latency of the upstream call that produced the output.
    pub latency_ms: u64,
}

struct Entry {
    response: CachedResponse,
    inserted_at: Instant,
    ttl: Duration,
    /// Monotonic touch counter for LRU ordering.
    last_used: u64,
}

impl Entry {
    fn expired(&self, now: Instant) -> bool {
        now.duration_since(self.inserted_at) >= self.ttl
    }
}

struct CacheInner {
    entries: HashMap<String, Entry>,
    tick: u64,
}

/// Bounded, TTL-aware response cache.
pub struct ResponseCache {
    inner: Mutex<CacheInner>,
    capacity: usize,
}

impl ResponseCache {
    /// Create a cache holding at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                entries: HashMap::new(),
                tick: 0,
            }),
            capacity: capacity.max(1),
        }
    }

    /// Fetch a live entry, refreshing its LRU position. An expired entry is
    /// removed on the spot and reported as a miss.
    pub fn get(&self, key: &str) -> Option<CachedResponse> {
        let now = Instant::now();
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());

        if inner.entries.get(key).is_some_and(|e| e.expired(now)) {
            inner.entries.remove(key);
            debug!(key, "cache entry expired");
            return None;
        }

        inner.tick += 1;
        let tick = inner.tick;
        inner.entries.get_mut(key).map(|entry| {
            entry.last_used = tick;
            entry.response.clone()
        })
    }

    /// Insert a successful response. The write is atomic under the lock:
    /// either the full entry and TTL land, or nothing does. Re-inserting an
    /// existing key replaces it (last write wins).
    pub fn put(&self, key: impl Into<String>, response: CachedResponse, ttl: Duration) {
        let key = key.into();
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());

        inner.tick += 1;
        let entry = Entry {
            response,
            inserted_at: Instant::now(),
            ttl,
            last_used: inner.tick,
        };
        inner.entries.insert(key, entry);

        // Capacity pressure: drop the least recently used entry.
        while inner.entries.len() > self.capacity {
            if let Some(lru_key) = inner
                .entries
                .iter()
                .min_by_key(|(_, e)| e.last_used)
                .map(|(k, _)| k.clone())
            {
                debug!(key = %lru_key, "evicting LRU cache entry");
                inner.entries.remove(&lru_key);
            } else {
                break;
            }
        }
    }

    /// Number of entries currently held (expired entries included until
    /// their lazy removal).
    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entries
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(n: u64) -> CachedResponse {
        CachedResponse {
            output: serde_json::json!({ "n": n }),
            latency_ms: n,
        }
    }

    #[test]
    fn put_then_get() {
        let cache = ResponseCache::new(8);
        cache.put("k1", response(1), Duration::from_secs(60));

        let hit = cache.get("k1").unwrap();
        assert_eq!(hit.output["n"], 1);
        assert_eq!(hit.latency_ms, 1);
    }

    #[test]
    fn miss_on_unknown_key() {
        let cache = ResponseCache::new(8);
        assert!(cache.get("absent").is_none());
    }

    #[test]
    fn ttl_expiry_is_lazy() {
        let cache = ResponseCache::new(8);
        cache.put("k1", response(1), Duration::from_millis(20));
        assert!(cache.get("k1").is_some());

        std::thread::sleep(Duration::from_millis(40));
        assert!(cache.get("k1").is_none());
        // The expired entry was removed by the failed get.
        assert!(cache.is_empty());
    }

    #[test]
    fn last_write_wins_on_collision() {
        let cache = ResponseCache::new(8);
        cache.put("k1", response(1), Duration::from_secs(60));
        cache.put("k1", response(2), Duration::from_secs(60));

        assert_eq!(cache.get("k1").unwrap().output["n"], 2);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn lru_eviction_at_capacity() {
        let cache = ResponseCache::new(2);
        cache.put("a", response(1), Duration::from_secs(60));
        cache.put("b", response(2), Duration::from_secs(60));

        // Touch "a" so "b" becomes the eviction candidate.
        cache.get("a");
        cache.put("c", response(3), Duration::from_secs(60));

        assert_eq!(cache.len(), 2);
        assert!(cache.get("a").is_some());
        assert!(cache.get("b").is_none());
        assert!(cache.get("c").is_some());
    }

    #[test]
    fn stored_output_is_returned_byte_identical() {
        let cache = ResponseCache::new(8);
        let output = serde_json::json!({"translated": "bonjour", "detected_source": "en"});
        cache.put(
            "k1",
            CachedResponse {
                output: output.clone(),
                latency_ms: 17,
            },
            Duration::from_secs(60),
        );

        let first = cache.get("k1").unwrap();
        let second = cache.get("k1").unwrap();
        assert_eq!(
            serde_json::to_vec(&first.output).unwrap(),
            serde_json::to_vec(&second.output).unwrap()
        );
        assert_eq!(first.output, output);
    }

    #[test]
    fn concurrent_access_is_consistent() {
        use std::sync::Arc;

        let cache = Arc::new(ResponseCache::new(64));
        let mut handles = Vec::new();
        for t in 0..8u64 {
            let cache = cache.clone();
            handles.push(std::thread::spawn(move || {
                for i in 0..100u64 {
                    let key = format!("k{}", i % 16);
                    cache.put(&key, response(t * 1000 + i), Duration::from_secs(60));
                    if let Some(hit) = cache.get(&key) {
                        // Never a torn read: output and latency always agree.
                        assert_eq!(hit.output["n"], hit.latency_ms);
                    }
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert!(cache.len() <= 16);
    }
}
