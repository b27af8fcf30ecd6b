//! Best-effort TTL cache in front of the upstream providers.
//!
//! Entries are evicted lazily: an expired entry stays in the map so that a
//! failed refetch can still serve it. A successful refetch replaces it.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Entity kinds with their own expiry policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKind {
    Card,
    Set,
    Search,
}

/// Per-kind time-to-live
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheTtls {
    pub card: Duration,
    pub set: Duration,
    pub search: Duration,
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self {
            card: Duration::from_secs(12 * 60 * 60),
            set: Duration::from_secs(7 * 24 * 60 * 60),
            search: Duration::from_secs(3 * 24 * 60 * 60),
        }
    }
}

impl CacheTtls {
    pub fn ttl(&self, kind: CacheKind) -> Duration {
        match kind {
            CacheKind::Card => self.card,
            CacheKind::Set => self.set,
            CacheKind::Search => self.search,
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

impl<V> CacheEntry<V> {
    fn is_fresh(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Counters reported by `/api/status`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    /// Expired entries served because the refetch failed
    pub stale_hits: u64,
}

/// Keyed TTL cache with stale fallback.
///
/// Two callers missing the same key at once may both fetch; the last write
/// wins.
pub struct TtlCache<V> {
    name: &'static str,
    entries: RwLock<HashMap<String, CacheEntry<V>>>,
    hits: AtomicU64,
    misses: AtomicU64,
    stale_hits: AtomicU64,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            entries: RwLock::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            stale_hits: AtomicU64::new(0),
        }
    }

    /// Return the cached value if present and unexpired, otherwise run
    /// `fetch` and store its result for `ttl`.
    ///
    /// When `fetch` fails and an expired entry exists, the expired value is
    /// returned instead of the error.
    pub async fn get_or_fetch<F, Fut, E>(&self, key: &str, ttl: Duration, fetch: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
        E: std::fmt::Display,
    {
        {
            let entries = self.entries.read().await;
            if let Some(entry) = entries.get(key) {
                if entry.is_fresh(Instant::now()) {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    debug!("{} cache hit: {}", self.name, key);
                    return Ok(entry.value.clone());
                }
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        debug!("{} cache miss: {}", self.name, key);

        match fetch().await {
            Ok(value) => {
                let mut entries = self.entries.write().await;
                entries.insert(
                    key.to_string(),
                    CacheEntry {
                        value: value.clone(),
                        expires_at: Instant::now() + ttl,
                    },
                );
                Ok(value)
            }
            Err(e) => {
                let entries = self.entries.read().await;
                match entries.get(key) {
                    Some(stale) => {
                        self.stale_hits.fetch_add(1, Ordering::Relaxed);
                        warn!(
                            "{} refetch failed for {}, serving stale entry: {}",
                            self.name, key, e
                        );
                        Ok(stale.value.clone())
                    }
                    None => Err(e),
                }
            }
        }
    }

    /// Number of stored entries, expired ones included
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    /// Drop entries that expired more than `grace` ago. Entries inside the
    /// grace window stay available as stale fallback. Returns how many were
    /// removed.
    pub async fn purge_expired(&self, grace: Duration) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| now < entry.expires_at + grace);
        let removed = before - entries.len();
        if removed > 0 {
            debug!("{} cache purged {} expired entries", self.name, removed);
        }
        removed
    }

    pub async fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.len().await,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            stale_hits: self.stale_hits.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    const TTL: Duration = Duration::from_secs(60);

    async fn fetch_counted(calls: &AtomicUsize, value: u32) -> Result<u32, String> {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(value)
    }

    #[test]
    fn test_default_ttls() {
        let ttls = CacheTtls::default();
        assert_eq!(ttls.ttl(CacheKind::Card), Duration::from_secs(43_200));
        assert_eq!(ttls.ttl(CacheKind::Set), Duration::from_secs(604_800));
        assert_eq!(ttls.ttl(CacheKind::Search), Duration::from_secs(259_200));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hit_within_ttl_does_not_refetch() {
        let cache = TtlCache::new("test");
        let calls = AtomicUsize::new(0);

        let first = cache.get_or_fetch("k", TTL, || fetch_counted(&calls, 1)).await;
        tokio::time::advance(Duration::from_secs(59)).await;
        let second = cache.get_or_fetch("k", TTL, || fetch_counted(&calls, 2)).await;

        assert_eq!(first, Ok(1));
        assert_eq!(second, Ok(1));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let stats = cache.stats().await;
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entry_refetches_once() {
        let cache = TtlCache::new("test");
        let calls = AtomicUsize::new(0);

        cache.get_or_fetch("k", TTL, || fetch_counted(&calls, 1)).await.unwrap();
        tokio::time::advance(Duration::from_secs(61)).await;

        let refreshed = cache.get_or_fetch("k", TTL, || fetch_counted(&calls, 2)).await;
        let again = cache.get_or_fetch("k", TTL, || fetch_counted(&calls, 3)).await;

        assert_eq!(refreshed, Ok(2));
        assert_eq!(again, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_refetch_serves_stale() {
        let cache = TtlCache::new("test");
        cache
            .get_or_fetch("k", TTL, || async { Ok::<_, String>(7u32) })
            .await
            .unwrap();
        tokio::time::advance(Duration::from_secs(120)).await;

        let result = cache
            .get_or_fetch("k", TTL, || async { Err::<u32, _>("upstream down".to_string()) })
            .await;

        assert_eq!(result, Ok(7));
        assert_eq!(cache.stats().await.stale_hits, 1);
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_failed_first_fetch_propagates() {
        let cache: TtlCache<u32> = TtlCache::new("test");
        let result = cache
            .get_or_fetch("k", TTL, || async { Err::<u32, _>("upstream down".to_string()) })
            .await;

        assert_eq!(result, Err("upstream down".to_string()));
        assert!(cache.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_keeps_entries_inside_grace_window() {
        let cache = TtlCache::new("test");
        let grace = Duration::from_secs(30);
        for (key, ttl) in [("short", 10), ("medium", 50), ("long", 1000)] {
            cache
                .get_or_fetch(key, Duration::from_secs(ttl), || async { Ok::<_, String>(1u32) })
                .await
                .unwrap();
        }

        // short expired 5s ago: still inside the grace window
        tokio::time::advance(Duration::from_secs(15)).await;
        assert_eq!(cache.purge_expired(grace).await, 0);

        // short expired 40s ago, medium 0s ago
        tokio::time::advance(Duration::from_secs(35)).await;
        assert_eq!(cache.purge_expired(grace).await, 1);
        assert_eq!(cache.len().await, 2);

        // medium is still served as stale when the refetch fails
        let stale = cache
            .get_or_fetch("medium", Duration::from_secs(50), || async {
                Err::<u32, _>("upstream down".to_string())
            })
            .await;
        assert_eq!(stale, Ok(1));

        tokio::time::advance(Duration::from_secs(31)).await;
        assert_eq!(cache.purge_expired(grace).await, 1);
        assert_eq!(cache.len().await, 1);

        cache.clear().await;
        assert!(cache.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_with_zero_grace_drops_every_expired_entry() {
        let cache = TtlCache::new("test");
        cache
            .get_or_fetch("k", Duration::from_secs(10), || async { Ok::<_, String>(1u32) })
            .await
            .unwrap();
        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(cache.purge_expired(Duration::ZERO).await, 1);
        assert!(cache.is_empty().await);
    }
}
