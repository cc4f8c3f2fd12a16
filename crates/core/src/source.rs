//! Cache + single-flight + pool, composed for one data source
//!
//! A lookup first consults the TTL cache. On a miss it joins (or starts) the
//! single in-flight execution for the key, which re-checks the cache, runs
//! the fetch through the concurrency pool when one is configured, and stores
//! successful values. Failures are never cached, so a retry always refetches.
//!
//! Every key carries a generation. `invalidate` and `clear` move it on, so a
//! later lookup never joins an execution that started before the
//! invalidation, and such an execution no longer writes to the cache.

use crate::inflight::InFlightDeduplicator;
use crate::pool::ConcurrencyPool;
use crate::ttl::TtlCache;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Point in a key's invalidation history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct Generation {
    /// Bumped by `clear`
    epoch: u64,
    /// Bumped by `invalidate` of this key
    key: u64,
}

/// Invalidation history; also serializes cache writes against invalidation
struct Generations<K> {
    epoch: u64,
    keys: HashMap<K, u64>,
}

impl<K: Eq + Hash> Generations<K> {
    fn current(&self, key: &K) -> Generation {
        Generation {
            epoch: self.epoch,
            key: self.keys.get(key).copied().unwrap_or(0),
        }
    }
}

/// Handle to one cached, deduplicated data source
pub struct CachedSource<K, V, E> {
    /// Label used in log lines
    name: &'static str,
    ttl: Duration,
    cache: TtlCache<K, V>,
    generations: Arc<Mutex<Generations<K>>>,
    inflight: InFlightDeduplicator<(K, Generation), Result<V, E>>,
    pool: Option<ConcurrencyPool>,
}

impl<K, V, E> Clone for CachedSource<K, V, E> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            ttl: self.ttl,
            cache: self.cache.clone(),
            generations: Arc::clone(&self.generations),
            inflight: self.inflight.clone(),
            pool: self.pool.clone(),
        }
    }
}

impl<K, V, E> fmt::Debug for CachedSource<K, V, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedSource")
            .field("name", &self.name)
            .field("ttl", &self.ttl)
            .field("pooled", &self.pool.is_some())
            .finish()
    }
}

impl<K, V, E> CachedSource<K, V, E>
where
    K: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    /// Create a source whose values live for `ttl`.
    ///
    /// With a `pool`, every fetch that reaches the underlying call takes one
    /// of its slots; cache hits and joined requests never do.
    pub fn new(name: &'static str, ttl: Duration, pool: Option<ConcurrencyPool>) -> Self {
        Self {
            name,
            ttl,
            cache: TtlCache::new(),
            generations: Arc::new(Mutex::new(Generations {
                epoch: 0,
                keys: HashMap::new(),
            })),
            inflight: InFlightDeduplicator::new(),
            pool,
        }
    }

    /// Return the cached value for `key`, or fetch it.
    ///
    /// After `invalidate(key)` this never returns a value produced by a fetch
    /// that started before the invalidation.
    pub async fn fetch<F, Fut>(&self, key: K, fetch: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        if let Some(value) = self.cache.get(&key) {
            debug!(source = self.name, key = ?key, "cache hit");
            return Ok(value);
        }

        let generation = self.generations.lock().current(&key);
        let name = self.name;
        let ttl = self.ttl;
        let cache = self.cache.clone();
        let generations = Arc::clone(&self.generations);
        let pool = self.pool.clone();
        let cache_key = key.clone();

        self.inflight
            .run((key, generation), move || async move {
                // A request that settled while we were joining may have filled it
                if let Some(value) = cache.get(&cache_key) {
                    return Ok(value);
                }

                debug!(source = name, key = ?cache_key, "cache miss, fetching");
                let result = match pool {
                    Some(pool) => pool.run(fetch).await,
                    None => fetch().await,
                };

                match &result {
                    Ok(value) => {
                        let generations = generations.lock();
                        if generations.current(&cache_key) == generation {
                            cache.set(cache_key, value.clone(), ttl);
                        } else {
                            debug!(
                                source = name,
                                key = ?cache_key,
                                "invalidated while fetching, not cached"
                            );
                        }
                    }
                    Err(_) => debug!(source = name, key = ?cache_key, "fetch failed, not cached"),
                }
                result
            })
            .await
    }

    /// Cached value for `key`, without fetching
    pub fn peek(&self, key: &K) -> Option<V> {
        self.cache.get(key)
    }

    /// Forget the cached value so the next `fetch` reads fresh state.
    ///
    /// A fetch already running for `key` is not joined by later lookups and
    /// does not store its result.
    pub fn invalidate(&self, key: &K) -> bool {
        let mut generations = self.generations.lock();
        *generations.keys.entry(key.clone()).or_insert(0) += 1;
        self.cache.invalidate(key)
    }

    /// Forget every cached value, cutting off every running fetch the same
    /// way `invalidate` does.
    pub fn clear(&self) {
        let mut generations = self.generations.lock();
        generations.epoch += 1;
        generations.keys.clear();
        self.cache.clear();
    }

    /// Whether a fetch for the current generation of `key` is running
    pub fn is_fetching(&self, key: &K) -> bool {
        let generation = self.generations.lock().current(key);
        self.inflight.has(&(key.clone(), generation))
    }

    /// Label used in log lines
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// How long fetched values stay cached
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Pool gating the underlying calls, if any
    pub fn pool(&self) -> Option<&ConcurrencyPool> {
        self.pool.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::time::{advance, sleep};

    type Source = CachedSource<&'static str, u32, String>;

    fn fetcher(
        calls: &Arc<AtomicUsize>,
        result: Result<u32, String>,
    ) -> impl FnOnce() -> futures::future::BoxFuture<'static, Result<u32, String>> + Send + 'static
    {
        delayed(calls, Duration::from_millis(20), result)
    }

    fn delayed(
        calls: &Arc<AtomicUsize>,
        delay: Duration,
        result: Result<u32, String>,
    ) -> impl FnOnce() -> futures::future::BoxFuture<'static, Result<u32, String>> + Send + 'static
    {
        use futures::FutureExt;
        let calls = calls.clone();
        move || {
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                sleep(delay).await;
                result
            }
            .boxed()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_fetch_hits_cache() {
        let source = Source::new("status", Duration::from_secs(5), None);
        let calls = Arc::new(AtomicUsize::new(0));

        assert_eq!(source.fetch("repo", fetcher(&calls, Ok(1))).await, Ok(1));
        assert_eq!(source.fetch("repo", fetcher(&calls, Ok(2))).await, Ok(1));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(source.peek(&"repo"), Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_value_is_refetched() {
        let source = Source::new("status", Duration::from_secs(5), None);
        let calls = Arc::new(AtomicUsize::new(0));

        source.fetch("repo", fetcher(&calls, Ok(1))).await.unwrap();
        advance(Duration::from_secs(6)).await;

        assert_eq!(source.fetch("repo", fetcher(&calls, Ok(2))).await, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_misses_share_one_fetch() {
        let source = Source::new("status", Duration::from_secs(5), None);
        let calls = Arc::new(AtomicUsize::new(0));

        let (a, b, c) = tokio::join!(
            source.fetch("repo", fetcher(&calls, Ok(1))),
            source.fetch("repo", fetcher(&calls, Ok(2))),
            source.fetch("repo", fetcher(&calls, Ok(3))),
        );
        assert_eq!((a, b, c), (Ok(1), Ok(1), Ok(1)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!source.is_fetching(&"repo"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_are_not_cached() {
        let source = Source::new("reviews", Duration::from_secs(60), None);
        let calls = Arc::new(AtomicUsize::new(0));

        let failed = source
            .fetch("repo", fetcher(&calls, Err("rate limited".into())))
            .await;
        assert_eq!(failed, Err("rate limited".to_string()));
        assert_eq!(source.peek(&"repo"), None);

        assert_eq!(source.fetch("repo", fetcher(&calls, Ok(4))).await, Ok(4));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidate_forces_refetch() {
        let source = Source::new("status", Duration::from_secs(60), None);
        let calls = Arc::new(AtomicUsize::new(0));

        source.fetch("repo", fetcher(&calls, Ok(1))).await.unwrap();
        assert!(source.invalidate(&"repo"));
        assert_eq!(source.fetch("repo", fetcher(&calls, Ok(2))).await, Ok(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pool_bounds_distinct_keys() {
        let pool = ConcurrencyPool::new(1);
        let source = Source::new("status", Duration::from_secs(60), Some(pool.clone()));
        let calls = Arc::new(AtomicUsize::new(0));

        let a = {
            let source = source.clone();
            let fetch = fetcher(&calls, Ok(1));
            tokio::spawn(async move { source.fetch("a", fetch).await })
        };
        let b = {
            let source = source.clone();
            let fetch = fetcher(&calls, Ok(2));
            tokio::spawn(async move { source.fetch("b", fetch).await })
        };
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;

        assert_eq!(pool.active_count(), 1);
        assert_eq!(pool.queue_length(), 1);

        assert_eq!(a.await.unwrap(), Ok(1));
        assert_eq!(b.await.unwrap(), Ok(2));
        assert_eq!(pool.active_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidate_cuts_off_running_fetch() {
        let source = Source::new("status", Duration::from_secs(60), None);
        let calls = Arc::new(AtomicUsize::new(0));

        // Read of the old on-disk state, still running when the change lands
        let before = {
            let source = source.clone();
            let fetch = delayed(&calls, Duration::from_millis(200), Ok(1));
            tokio::spawn(async move { source.fetch("repo", fetch).await })
        };
        tokio::task::yield_now().await;
        assert!(source.is_fetching(&"repo"));

        source.invalidate(&"repo");
        assert!(!source.is_fetching(&"repo"));
        let after = source
            .fetch("repo", delayed(&calls, Duration::from_millis(20), Ok(2)))
            .await;
        assert_eq!(after, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        // The older read finishes last but does not overwrite the fresh value
        assert_eq!(before.await.unwrap(), Ok(1));
        assert_eq!(source.peek(&"repo"), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidated_fetch_is_not_cached() {
        let source = Source::new("status", Duration::from_secs(60), None);
        let calls = Arc::new(AtomicUsize::new(0));

        let before = {
            let source = source.clone();
            let fetch = fetcher(&calls, Ok(1));
            tokio::spawn(async move { source.fetch("repo", fetch).await })
        };
        tokio::task::yield_now().await;

        source.invalidate(&"repo");
        assert_eq!(before.await.unwrap(), Ok(1));
        assert_eq!(source.peek(&"repo"), None);

        assert_eq!(source.fetch("repo", fetcher(&calls, Ok(2))).await, Ok(2));
        assert_eq!(source.peek(&"repo"), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_cuts_off_running_fetches() {
        let source = Source::new("status", Duration::from_secs(60), None);
        let calls = Arc::new(AtomicUsize::new(0));

        let before = {
            let source = source.clone();
            let fetch = fetcher(&calls, Ok(1));
            tokio::spawn(async move { source.fetch("repo", fetch).await })
        };
        tokio::task::yield_now().await;

        source.clear();
        assert!(!source.is_fetching(&"repo"));
        assert_eq!(before.await.unwrap(), Ok(1));
        assert_eq!(source.peek(&"repo"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_fetch_releases_pool_slot() {
        let pool = ConcurrencyPool::new(1);
        let source = Source::new("status", Duration::from_secs(60), Some(pool.clone()));
        let calls = Arc::new(AtomicUsize::new(0));

        let waiter = {
            let source = source.clone();
            let fetch = fetcher(&calls, Ok(1));
            tokio::spawn(async move { source.fetch("a", fetch).await })
        };
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;
        assert_eq!(pool.active_count(), 1);

        waiter.abort();
        sleep(Duration::from_secs(1)).await;
        assert_eq!(pool.active_count(), 0);
        assert!(!source.is_fetching(&"a"));
        // The abandoned fetch still completed and cached its value
        assert_eq!(source.peek(&"a"), Some(1));

        let other = tokio::time::timeout(
            Duration::from_secs(5),
            source.fetch("b", fetcher(&calls, Ok(2))),
        )
        .await;
        assert_eq!(other, Ok(Ok(2)));
    }
}
