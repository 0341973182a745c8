//! TTL cache for reference collections (regions, pipelines).
//!
//! Each [`ReferenceCache`] holds one immutable snapshot behind a
//! `tokio::sync::RwLock`. Updates build the new snapshot first and swap it
//! in under the write lock, so readers see either the old list or the new
//! one, never a mix. Staleness is evaluated lazily on read.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use leaderboard_core::types::Timestamp;
use tokio::sync::RwLock;
use tokio::time::Instant;

/// Outcome of a cache read.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheResult<T> {
    /// Independent copy of the cached list. Empty on a miss.
    pub results: Vec<T>,
    /// Wall-clock time of the last update, if any.
    pub last_update: Option<Timestamp>,
    /// A collection is present (fresh or stale).
    pub cache_hit: bool,
    /// The collection is stale or absent.
    pub expired: bool,
}

impl<T> CacheResult<T> {
    fn miss() -> Self {
        Self {
            results: Vec::new(),
            last_update: None,
            cache_hit: false,
            expired: true,
        }
    }

    /// Hit and not yet past its TTL.
    pub fn is_fresh(&self) -> bool {
        self.cache_hit && !self.expired
    }
}

struct Snapshot<T> {
    items: Arc<Vec<T>>,
    updated_at: Instant,
    last_update: Timestamp,
}

/// One cached reference collection with a fixed TTL.
pub struct ReferenceCache<T> {
    name: &'static str,
    ttl: Duration,
    slot: RwLock<Option<Snapshot<T>>>,
}

impl<T: Clone> ReferenceCache<T> {
    pub fn new(name: &'static str, ttl: Duration) -> Self {
        Self {
            name,
            ttl,
            slot: RwLock::new(None),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Read the collection. The lock is held only long enough to clone the
    /// snapshot handle.
    pub async fn get(&self) -> CacheResult<T> {
        let snapshot = {
            let guard = self.slot.read().await;
            guard
                .as_ref()
                .map(|s| (Arc::clone(&s.items), s.updated_at, s.last_update))
        };

        match snapshot {
            None => CacheResult::miss(),
            Some((items, updated_at, last_update)) => CacheResult {
                results: items.as_ref().clone(),
                last_update: Some(last_update),
                cache_hit: true,
                expired: updated_at.elapsed() > self.ttl,
            },
        }
    }

    /// Replace the whole collection and reset its age. An empty list is a
    /// valid collection.
    pub async fn update(&self, items: Vec<T>) {
        let count = items.len();
        let snapshot = Snapshot {
            items: Arc::new(items),
            updated_at: Instant::now(),
            last_update: Utc::now(),
        };
        *self.slot.write().await = Some(snapshot);
        tracing::debug!(cache = self.name, count, "Cache updated");
    }

    /// Drop the collection; the next read is a miss.
    pub async fn invalidate(&self) {
        *self.slot.write().await = None;
        tracing::debug!(cache = self.name, "Cache invalidated");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(60);

    #[tokio::test]
    async fn empty_cache_is_a_miss() {
        let cache: ReferenceCache<String> = ReferenceCache::new("regions", TTL);
        let result = cache.get().await;
        assert!(!result.cache_hit);
        assert!(result.expired);
        assert!(result.results.is_empty());
        assert_eq!(result.last_update, None);
    }

    #[tokio::test(start_paused = true)]
    async fn update_then_get_is_fresh() {
        let cache = ReferenceCache::new("regions", TTL);
        cache.update(vec!["MDW".to_string()]).await;

        let result = cache.get().await;
        assert!(result.is_fresh());
        assert_eq!(result.results, vec!["MDW".to_string()]);
        assert!(result.last_update.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn entries_go_stale_after_ttl() {
        let cache = ReferenceCache::new("regions", TTL);
        cache.update(vec![1, 2, 3]).await;

        tokio::time::advance(TTL).await;
        assert!(cache.get().await.is_fresh(), "exactly TTL old is still fresh");

        tokio::time::advance(Duration::from_millis(1)).await;
        let result = cache.get().await;
        assert!(result.cache_hit);
        assert!(result.expired);
        assert_eq!(result.results, vec![1, 2, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn update_resets_age() {
        let cache = ReferenceCache::new("pipelines", TTL);
        cache.update(vec![1]).await;
        tokio::time::advance(TTL * 2).await;
        cache.update(vec![2]).await;

        let result = cache.get().await;
        assert!(result.is_fresh());
        assert_eq!(result.results, vec![2]);
    }

    #[tokio::test]
    async fn empty_list_is_a_hit() {
        let cache: ReferenceCache<u8> = ReferenceCache::new("pipelines", TTL);
        cache.update(Vec::new()).await;
        let result = cache.get().await;
        assert!(result.is_fresh());
        assert!(result.results.is_empty());
    }

    #[tokio::test]
    async fn invalidate_clears() {
        let cache = ReferenceCache::new("regions", TTL);
        cache.update(vec!["MDW".to_string()]).await;
        cache.invalidate().await;
        let result = cache.get().await;
        assert!(!result.cache_hit);
        assert!(result.results.is_empty());
    }

    #[tokio::test]
    async fn results_are_independent_copies() {
        let cache = ReferenceCache::new("regions", TTL);
        cache.update(vec!["MDW".to_string()]).await;

        let mut first = cache.get().await;
        first.results.push("LAX".to_string());
        assert_eq!(cache.get().await.results, vec!["MDW".to_string()]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_readers_never_see_empty_hits() {
        let cache = Arc::new(ReferenceCache::new("regions", TTL));
        cache.update(vec![0usize]).await;

        let mut handles = Vec::new();
        for writer in 0..4usize {
            let cache = Arc::clone(&cache);
            handles.push(tokio::spawn(async move {
                for round in 0..200usize {
                    let len = 1 + (writer + round) % 5;
                    cache.update((0..len).collect()).await;
                }
            }));
        }
        for _ in 0..8 {
            let cache = Arc::clone(&cache);
            handles.push(tokio::spawn(async move {
                for _ in 0..200 {
                    let result = cache.get().await;
                    assert!(result.cache_hit);
                    assert!(!result.results.is_empty());
                    assert_eq!(result.results, (0..result.results.len()).collect::<Vec<_>>());
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
    }
}
