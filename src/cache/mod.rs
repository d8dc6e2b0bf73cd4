// cache/mod.rs - CacheInvalidator
// Named read-through caches for aggregate reads, dropped after mutations commit

use async_trait::async_trait;
use moka::future::Cache;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, warn};

pub const REGIONS: &str = "regions";
pub const ASSIGNABLE_REGIONS: &str = "assignable_regions";

/// Something that can drop all of its cached entries.
#[async_trait]
pub trait Invalidate: Send + Sync {
    async fn invalidate(&self);
}

/// Read-through cache keyed by query string.
///
/// `generation` is bumped by every invalidation. A load that started under an
/// older generation returns its value but does not store it.
#[derive(Clone)]
pub struct ReadCache<V: Clone + Send + Sync + 'static> {
    name: &'static str,
    inner: Cache<String, V>,
    generation: Arc<RwLock<u64>>,
}

impl<V: Clone + Send + Sync + 'static> ReadCache<V> {
    pub fn new(name: &'static str, max_capacity: u64, ttl: Duration) -> Self {
        let inner = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_live(ttl)
            .build();
        Self {
            name,
            inner,
            generation: Arc::new(RwLock::new(0)),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Cached value for `key`, or the loader's result which is then cached.
    /// Loader errors are returned and nothing is stored.
    pub async fn get_or_load<E, F, Fut>(&self, key: &str, load: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(hit) = self.inner.get(key).await {
            debug!("Cache hit {}:{}", self.name, key);
            return Ok(hit);
        }
        let started = *self.generation.read().await;
        let value = load().await?;

        let current = self.generation.read().await;
        if *current == started {
            self.inner.insert(key.to_string(), value.clone()).await;
        } else {
            debug!("Discarding load of {}:{} overtaken by invalidation", self.name, key);
        }
        Ok(value)
    }

    pub async fn entry_count(&self) -> u64 {
        self.inner.run_pending_tasks().await;
        self.inner.entry_count()
    }
}

#[async_trait]
impl<V: Clone + Send + Sync + 'static> Invalidate for ReadCache<V> {
    async fn invalidate(&self) {
        {
            let mut generation = self.generation.write().await;
            *generation += 1;
            self.inner.invalidate_all();
        }
        self.inner.run_pending_tasks().await;
    }
}

/// Registry of named caches. Mutating operations call `invalidate` after
/// their writes commit.
#[derive(Clone, Default)]
pub struct CacheInvalidator {
    caches: HashMap<&'static str, Arc<dyn Invalidate>>,
}

impl CacheInvalidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: &'static str, cache: Arc<dyn Invalidate>) {
        self.caches.insert(name, cache);
    }

    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.caches.keys().copied().collect();
        names.sort_unstable();
        names
    }

    pub async fn invalidate(&self, names: &[&str]) {
        for name in names {
            match self.caches.get(name) {
                Some(cache) => {
                    cache.invalidate().await;
                    debug!("Invalidated cache {}", name);
                }
                None => warn!("Invalidation requested for unknown cache {}", name),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn loads_once_then_serves_from_cache() {
        let cache: ReadCache<Vec<String>> = ReadCache::new(REGIONS, 16, Duration::from_secs(60));
        let loads = AtomicUsize::new(0);

        for _ in 0..3 {
            let value: Result<_, ()> = cache
                .get_or_load("all", || async {
                    loads.fetch_add(1, Ordering::SeqCst);
                    Ok(vec!["eu-1".to_string()])
                })
                .await;
            assert_eq!(value.unwrap(), vec!["eu-1".to_string()]);
        }
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn loader_errors_are_not_cached() {
        let cache: ReadCache<u32> = ReadCache::new(REGIONS, 16, Duration::from_secs(60));

        let failed: Result<u32, &str> = cache.get_or_load("all", || async { Err("down") }).await;
        assert_eq!(failed, Err("down"));
        assert_eq!(cache.entry_count().await, 0);

        let loaded: Result<u32, &str> = cache.get_or_load("all", || async { Ok(7) }).await;
        assert_eq!(loaded, Ok(7));
    }

    #[tokio::test]
    async fn load_overtaken_by_invalidation_is_not_stored() {
        let cache: ReadCache<u32> = ReadCache::new(REGIONS, 16, Duration::from_secs(60));
        let (started_tx, started_rx) = tokio::sync::oneshot::channel::<()>();
        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();

        let in_flight = {
            let cache = cache.clone();
            tokio::spawn(async move {
                cache
                    .get_or_load("all", || async move {
                        let _ = started_tx.send(());
                        let _ = release_rx.await;
                        Ok::<u32, ()>(1)
                    })
                    .await
            })
        };

        // The mutation commits and invalidates while the old read is still loading
        started_rx.await.unwrap();
        Invalidate::invalidate(&cache).await;
        release_tx.send(()).unwrap();
        assert_eq!(in_flight.await.unwrap(), Ok(1));

        let fresh: Result<u32, ()> = cache.get_or_load("all", || async { Ok(2) }).await;
        assert_eq!(fresh, Ok(2));
        assert_eq!(cache.entry_count().await, 1);
    }

    #[tokio::test]
    async fn invalidate_drops_only_named_caches() {
        let regions: ReadCache<u32> = ReadCache::new(REGIONS, 16, Duration::from_secs(60));
        let assignable: ReadCache<u32> = ReadCache::new(ASSIGNABLE_REGIONS, 16, Duration::from_secs(60));
        let mut invalidator = CacheInvalidator::new();
        invalidator.register(REGIONS, Arc::new(regions.clone()));
        invalidator.register(ASSIGNABLE_REGIONS, Arc::new(assignable.clone()));

        let _: Result<u32, ()> = regions.get_or_load("all", || async { Ok(1) }).await;
        let _: Result<u32, ()> = assignable.get_or_load("all", || async { Ok(2) }).await;

        invalidator.invalidate(&[REGIONS, "unknown"]).await;

        assert_eq!(regions.entry_count().await, 0);
        assert_eq!(assignable.entry_count().await, 1);
        assert_eq!(invalidator.names(), vec![ASSIGNABLE_REGIONS, REGIONS]);
    }
}
