//! Time-bounded memoization
//!
//! Entries expire after their own TTL and are evicted lazily, on the access
//! that finds them stale. There is no capacity bound and no background sweep:
//! the cache is meant for small, short-lived per-session metadata.

use dashmap::DashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    fetched_at: Instant,
    ttl: Duration,
}

impl<V> CacheEntry<V> {
    /// An entry is fresh while its age is at most its TTL.
    fn is_fresh(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.fetched_at) <= self.ttl
    }
}

/// Cache whose entries expire after a per-entry TTL
///
/// Cloning yields a handle to the same entries.
pub struct TtlCache<K, V> {
    entries: Arc<DashMap<K, CacheEntry<V>>>,
}

impl<K, V> Clone for TtlCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
        }
    }
}

impl<K: Eq + Hash, V> Default for TtlCache<K, V> {
    fn default() -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
        }
    }
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a fresh value.
    ///
    /// A stale entry is removed by this call and reported as a miss.
    pub fn get(&self, key: &K) -> Option<V> {
        let now = Instant::now();
        match self.entries.get(key) {
            Some(entry) if entry.is_fresh(now) => return Some(entry.value.clone()),
            Some(_) => {}
            None => return None,
        }

        // Only evict if nobody re-set the key in the meantime
        self.entries.remove_if(key, |_, entry| !entry.is_fresh(now));
        None
    }

    /// Store `value`, replacing both the value and the freshness clock.
    pub fn set(&self, key: K, value: V, ttl: Duration) {
        self.entries.insert(
            key,
            CacheEntry {
                value,
                fetched_at: Instant::now(),
                ttl,
            },
        );
    }

    /// Drop the entry for `key`, returning whether one existed.
    pub fn invalidate(&self, key: &K) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Number of stored entries, including stale ones not yet evicted
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no entries are stored
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
