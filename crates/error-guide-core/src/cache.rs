//! Bounded, TTL-expiring cache of generated answers.
//!
//! Keys are normalized single-turn queries (see [`normalize_query`]);
//! values are answer texts. Entries expire lazily: a read that finds an
//! entry older than the TTL removes it and reports a miss. When the cache
//! is full, inserting a new key evicts the earliest-inserted entry. Reads
//! never refresh an entry's position, so eviction is FIFO, not LRU.
//! Overwriting an existing key keeps its original position.
//!
//! The cache is internally synchronized and meant to be constructed once
//! per process and shared by reference (e.g. behind an `Arc`).

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Default time-to-live for cached answers (one hour).
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);
/// Default maximum number of cached answers.
pub const DEFAULT_CAPACITY: usize = 500;

/// Normalize a query into a cache key.
///
/// Lowercases, trims, and collapses internal whitespace runs to a single
/// space. Idempotent.
pub fn normalize_query(query: &str) -> String {
    query
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    created_at: Instant,
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<String, CacheEntry>,
    /// Keys in insertion order; always the same key set as `entries`.
    order: VecDeque<String>,
}

impl Inner {
    fn remove(&mut self, key: &str) {
        if self.entries.remove(key).is_some() {
            self.order.retain(|k| k != key);
        }
    }
}

/// Counters describing cache activity since construction.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub expirations: u64,
    pub evictions: u64,
}

/// In-memory answer cache with TTL expiry and FIFO eviction.
#[derive(Debug)]
pub struct ResponseCache {
    inner: Mutex<Inner>,
    stats: Mutex<CacheStats>,
    ttl: Duration,
    capacity: usize,
}

impl ResponseCache {
    /// Create a cache. A `capacity` of zero is treated as one.
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            stats: Mutex::new(CacheStats::default()),
            ttl,
            capacity: capacity.max(1),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Look up `key`, dropping it if it has expired.
    pub fn get(&self, key: &str) -> Option<String> {
        self.get_at(key, Instant::now())
    }

    /// Insert or overwrite `key`, evicting the oldest entry when full.
    pub fn put(&self, key: &str, value: &str) {
        self.put_at(key, value, Instant::now())
    }

    /// [`get`](Self::get) evaluated at an explicit instant.
    pub fn get_at(&self, key: &str, now: Instant) -> Option<String> {
        let mut inner = self.lock_inner();
        let lookup = inner.entries.get(key).map(|e| {
            let expired = now.saturating_duration_since(e.created_at) > self.ttl;
            (expired, e.value.clone())
        });

        match lookup {
            None => {
                drop(inner);
                self.bump(|s| s.misses += 1);
                None
            }
            Some((true, _)) => {
                inner.remove(key);
                drop(inner);
                self.bump(|s| {
                    s.misses += 1;
                    s.expirations += 1;
                });
                None
            }
            Some((false, value)) => {
                drop(inner);
                self.bump(|s| s.hits += 1);
                Some(value)
            }
        }
    }

    /// [`put`](Self::put) evaluated at an explicit instant.
    pub fn put_at(&self, key: &str, value: &str, now: Instant) {
        let mut inner = self.lock_inner();
        let entry = CacheEntry {
            value: value.to_string(),
            created_at: now,
        };

        if let Some(existing) = inner.entries.get_mut(key) {
            *existing = entry;
            return;
        }

        let mut evicted = 0;
        while inner.entries.len() >= self.capacity {
            match inner.order.pop_front() {
                Some(oldest) => {
                    inner.entries.remove(&oldest);
                    evicted += 1;
                }
                None => break,
            }
        }

        inner.entries.insert(key.to_string(), entry);
        inner.order.push_back(key.to_string());
        drop(inner);

        if evicted > 0 {
            self.bump(|s| s.evictions += evicted);
        }
    }

    /// Remove every entry.
    pub fn clear(&self) {
        let mut inner = self.lock_inner();
        inner.entries.clear();
        inner.order.clear();
    }

    pub fn len(&self) -> usize {
        self.lock_inner().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.lock_inner().entries.contains_key(key)
    }

    pub fn stats(&self) -> CacheStats {
        *self.stats.lock().unwrap_or_else(|e| e.into_inner())
    }

    // A poisoned lock only means another request panicked mid-update;
    // the map itself is still usable for a best-effort cache.
    fn lock_inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn bump(&self, f: impl FnOnce(&mut CacheStats)) {
        let mut stats = self.stats.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut stats);
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL, DEFAULT_CAPACITY)
    }
}
