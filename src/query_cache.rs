//! read-side query cache, mirroring the original server's `cache.py`.
//!
//! caching only ever applies when the caller pins an explicit commit hash:
//! if no commit is given (the caller wants "whatever master points to right
//! now"), the cache is bypassed entirely rather than risk serving a stale
//! read against a moving branch.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use clru::CLruCache;
use parking_lot::Mutex;
use serde_json::Value;

use crate::hash::Hash;

/// pluggable storage for cached query results. `TtlMapBackend` is the
/// in-process, TTL-bounded extension point analogous to the original's
/// networked cache backend; callers needing a shared/remote cache implement
/// this trait against whatever store they have.
pub trait CacheBackend: Send + Sync {
    fn get(&self, key: &str) -> Option<Value>;
    fn set(&self, key: &str, value: Value);
    fn len(&self) -> usize;
}

/// simple bounded LRU, process-local
pub struct LruBackend {
    inner: Mutex<CLruCache<String, Value>>,
}

impl LruBackend {
    pub fn new(capacity: usize) -> Self {
        let capacity = std::num::NonZeroUsize::new(capacity.max(1)).expect("capacity > 0");
        Self {
            inner: Mutex::new(CLruCache::new(capacity)),
        }
    }
}

impl CacheBackend for LruBackend {
    fn get(&self, key: &str) -> Option<Value> {
        self.inner.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: Value) {
        self.inner.lock().put(key.to_string(), value);
    }

    fn len(&self) -> usize {
        self.inner.lock().len()
    }
}

/// TTL-bounded map backend: the extension point for a shared cache (e.g. one
/// backed by an external key-value service) without fabricating a dependency
/// on a specific one. Entries older than `ttl` are treated as misses and
/// evicted lazily on access.
pub struct TtlMapBackend {
    entries: dashmap::DashMap<String, (Value, Instant)>,
    ttl: Duration,
}

impl TtlMapBackend {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: dashmap::DashMap::new(),
            ttl,
        }
    }
}

impl CacheBackend for TtlMapBackend {
    fn get(&self, key: &str) -> Option<Value> {
        let hit = self
            .entries
            .get(key)
            .filter(|entry| entry.1.elapsed() < self.ttl)
            .map(|entry| entry.0.clone());
        if hit.is_none() {
            self.entries.remove(key);
        }
        hit
    }

    fn set(&self, key: &str, value: Value) {
        self.entries.insert(key.to_string(), (value, Instant::now()));
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

#[derive(Default)]
pub struct CacheStats {
    pub requests: AtomicU64,
    pub hits: AtomicU64,
    pub misses: AtomicU64,
}

impl CacheStats {
    pub fn snapshot(&self) -> (u64, u64, u64) {
        (
            self.requests.load(Ordering::Relaxed),
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
        )
    }

    pub fn reset(&self) {
        self.requests.store(0, Ordering::Relaxed);
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }
}

/// key identifying a cacheable read: the operation name plus its arguments,
/// serialized to a stable string.
fn cache_key<A: serde::Serialize + ?Sized>(operation: &str, args: &A) -> String {
    let args_json = serde_json::to_string(args).unwrap_or_default();
    format!("{operation}:{args_json}")
}

pub struct QueryCache {
    backend: Box<dyn CacheBackend>,
    stats: CacheStats,
    enabled: bool,
}

impl QueryCache {
    pub fn new(backend: Box<dyn CacheBackend>) -> Self {
        Self {
            backend,
            stats: CacheStats::default(),
            enabled: true,
        }
    }

    pub fn disabled() -> Self {
        Self {
            backend: Box::new(LruBackend::new(1)),
            stats: CacheStats::default(),
            enabled: false,
        }
    }

    pub fn stats(&self) -> (u64, u64, u64) {
        self.stats.snapshot()
    }

    pub fn reset_stats(&self) {
        self.stats.reset();
    }

    pub fn size(&self) -> usize {
        self.backend.len()
    }

    /// run `compute` unless a cached result exists for `(operation, args)`
    /// under `commit`. A `None` commit always bypasses the cache (mirrors
    /// the original: `if not self.enabled or not commit_sha: return cb()`).
    pub fn get_or_compute<A, F>(
        &self,
        operation: &str,
        commit: Option<&Hash>,
        args: &A,
        compute: F,
    ) -> crate::error::Result<Value>
    where
        A: serde::Serialize + ?Sized,
        F: FnOnce() -> crate::error::Result<Value>,
    {
        self.stats.requests.fetch_add(1, Ordering::Relaxed);

        let Some(commit) = commit.filter(|_| self.enabled) else {
            return compute();
        };

        let key = format!("{}:{}", commit, cache_key(operation, args));
        if let Some(hit) = self.backend.get(&key) {
            self.stats.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(hit);
        }

        self.stats.misses.fetch_add(1, Ordering::Relaxed);
        let value = compute()?;
        self.backend.set(&key, value.clone());
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bypasses_cache_without_commit() {
        let cache = QueryCache::new(Box::new(LruBackend::new(8)));
        let calls = std::cell::Cell::new(0);
        for _ in 0..3 {
            cache
                .get_or_compute("get", None, &"key", || {
                    calls.set(calls.get() + 1);
                    Ok(Value::from(1))
                })
                .unwrap();
        }
        assert_eq!(calls.get(), 3);
        let (requests, hits, misses) = cache.stats();
        assert_eq!(requests, 3);
        assert_eq!(hits, 0);
        assert_eq!(misses, 0);
    }

    #[test]
    fn test_hits_with_commit() {
        let cache = QueryCache::new(Box::new(LruBackend::new(8)));
        let calls = std::cell::Cell::new(0);
        let commit = Hash::ZERO;
        for _ in 0..3 {
            cache
                .get_or_compute("get", Some(&commit), &"key", || {
                    calls.set(calls.get() + 1);
                    Ok(Value::from(1))
                })
                .unwrap();
        }
        assert_eq!(calls.get(), 1);
        let (requests, hits, misses) = cache.stats();
        assert_eq!(requests, 3);
        assert_eq!(hits, 2);
        assert_eq!(misses, 1);
    }

    #[test]
    fn test_ttl_backend_expires() {
        let backend = TtlMapBackend::new(Duration::from_millis(1));
        backend.set("k", Value::from(1));
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(backend.get("k"), None);
    }
}
