//! TTL cache of search results backed by `moka`.

use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use tokio::task::JoinHandle;
use tracing::debug;

/// Shortest interval accepted for the background sweeper.
pub const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(1);

/// Cache configuration.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// How long an entry stays valid.
    pub ttl: Duration,
    /// How often expired entries are evicted.
    pub sweep_interval: Duration,
    /// Upper bound on stored entries per cache.
    pub max_capacity: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(3600),
            sweep_interval: Duration::from_secs(300),
            max_capacity: 10_000,
        }
    }
}

/// A key/value store whose entries expire a fixed time after insertion.
///
/// Expired entries are never returned by [`get`](Self::get). They are
/// evicted by moka's housekeeping, which [`sweep`](Self::sweep) runs on
/// demand and [`spawn_sweeper`](Self::spawn_sweeper) runs periodically.
pub struct TtlCache<K, V> {
    inner: Cache<K, V>,
    ttl: Duration,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Creates an empty cache with the default capacity.
    pub fn new(ttl: Duration) -> Self {
        Self::from_config(&CacheConfig {
            ttl,
            ..Default::default()
        })
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        let inner = Cache::builder()
            .max_capacity(config.max_capacity)
            .time_to_live(config.ttl)
            .build();
        Self {
            inner,
            ttl: config.ttl,
        }
    }

    /// Returns the time-to-live of entries.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns a clone of the value if present and not expired.
    pub async fn get(&self, key: &K) -> Option<V> {
        self.inner.get(key).await
    }

    /// Inserts or replaces a value, restarting its time-to-live.
    pub async fn insert(&self, key: K, value: V) {
        self.inner.insert(key, value).await;
    }

    /// Removes a value.
    pub async fn remove(&self, key: &K) -> Option<V> {
        self.inner.remove(key).await
    }

    /// Removes every entry and returns how many live entries were stored.
    pub async fn clear(&self) -> usize {
        let count = self.len().await;
        self.inner.invalidate_all();
        self.inner.run_pending_tasks().await;
        count
    }

    /// Number of live entries.
    pub async fn len(&self) -> usize {
        self.inner.run_pending_tasks().await;
        self.inner.entry_count() as usize
    }

    /// Returns true when no live entries are stored.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Evicts expired entries and returns how many remain.
    pub async fn sweep(&self) -> usize {
        self.len().await
    }

    /// Starts a task that sweeps the cache every `interval`.
    ///
    /// Intervals below [`MIN_SWEEP_INTERVAL`] are raised to it. The task
    /// holds a strong reference; abort the returned handle to stop it.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let cache = Arc::clone(self);
        let interval = interval.max(MIN_SWEEP_INTERVAL);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let remaining = cache.sweep().await;
                debug!("Cache sweep done, {} live entries", remaining);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_config_default() {
        let config = CacheConfig::default();
        assert_eq!(config.ttl, Duration::from_secs(3600));
        assert_eq!(config.sweep_interval, Duration::from_secs(300));
        assert_eq!(config.max_capacity, 10_000);
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let cache = TtlCache::new(Duration::from_secs(60));
        cache.insert("google:rust".to_string(), vec![1, 2, 3]).await;
        assert_eq!(cache.get(&"google:rust".to_string()).await, Some(vec![1, 2, 3]));
        assert_eq!(cache.get(&"bing:rust".to_string()).await, None);
        assert_eq!(cache.len().await, 1);
        assert_eq!(cache.ttl(), Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_expired_entries_are_misses() {
        let cache = TtlCache::new(Duration::from_millis(20));
        cache.insert("k", 1).await;
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(cache.get(&"k").await, None);
    }

    #[tokio::test]
    async fn test_sweep_evicts_only_expired() {
        let cache = TtlCache::new(Duration::from_millis(50));
        cache.insert("old", 1).await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        cache.insert("new", 2).await;
        assert_eq!(cache.sweep().await, 1);
        assert_eq!(cache.get(&"old").await, None);
        assert_eq!(cache.get(&"new").await, Some(2));
    }

    #[tokio::test]
    async fn test_clear_returns_count() {
        let cache = TtlCache::new(Duration::from_secs(60));
        cache.insert("a", 1).await;
        cache.insert("b", 2).await;
        assert_eq!(cache.clear().await, 2);
        assert_eq!(cache.get(&"a").await, None);
        assert!(cache.is_empty().await);
        assert_eq!(cache.clear().await, 0);
    }

    #[tokio::test]
    async fn test_reinsert_refreshes_value() {
        let cache = TtlCache::new(Duration::from_secs(60));
        cache.insert("k", 1).await;
        cache.insert("k", 2).await;
        assert_eq!(cache.get(&"k").await, Some(2));
        assert_eq!(cache.remove(&"k").await, Some(2));
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_background_sweeper() {
        let cache = Arc::new(TtlCache::new(Duration::from_millis(10)));
        cache.insert("k", 1).await;
        let handle = cache.spawn_sweeper(Duration::from_millis(20));
        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(!handle.is_finished());
        assert!(cache.is_empty().await);
        handle.abort();
    }

    #[tokio::test]
    async fn test_zero_sweep_interval_keeps_sweeper_alive() {
        let cache = Arc::new(TtlCache::new(Duration::from_millis(10)));
        cache.insert("k", 1).await;
        let handle = cache.spawn_sweeper(Duration::ZERO);
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(!handle.is_finished());
        assert!(cache.is_empty().await);
        handle.abort();
    }
}
