//! Time-bounded LRU store for rendered fragments.

use std::future::Future;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use lru::LruCache;
use metrics::counter;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::config::CacheConfig;
use super::keys::FragmentKey;
use super::{METRIC_FRAGMENT_EVICT, METRIC_FRAGMENT_HIT, METRIC_FRAGMENT_MISS};

const SOURCE: &str = "cache::store";

#[derive(Clone)]
struct Entry {
    body: String,
    expires_at: Instant,
}

/// Rendered fragments keyed by [`FragmentKey`], each with its own expiry.
///
/// Expired entries are dropped lazily on lookup. Writes to the underlying data
/// never touch this store, so a fragment may show stale content until it expires.
pub struct FragmentCache {
    config: CacheConfig,
    entries: RwLock<LruCache<FragmentKey, Entry>>,
}

impl FragmentCache {
    pub fn new(config: CacheConfig) -> Self {
        let entries = RwLock::new(LruCache::new(config.max_entries_non_zero()));
        Self { config, entries }
    }

    /// Live fragment for `key`, if any.
    pub fn get(&self, key: &FragmentKey) -> Option<String> {
        if !self.config.enabled {
            return None;
        }

        let now = Instant::now();
        let mut entries = self.write_entries("get");
        let lookup = entries
            .get(key)
            .map(|entry| (entry.expires_at > now).then(|| entry.body.clone()));
        match lookup {
            Some(Some(body)) => {
                counter!(METRIC_FRAGMENT_HIT).increment(1);
                Some(body)
            }
            Some(None) => {
                entries.pop(key);
                counter!(METRIC_FRAGMENT_MISS).increment(1);
                debug!(target = SOURCE, key = %key, "fragment expired");
                None
            }
            None => {
                counter!(METRIC_FRAGMENT_MISS).increment(1);
                None
            }
        }
    }

    /// Store `body` under `key` until `now + ttl`.
    pub fn put(&self, key: FragmentKey, body: String, ttl: Duration) {
        if !self.config.enabled {
            return;
        }

        let entry = Entry {
            body,
            expires_at: Instant::now() + ttl,
        };
        let mut entries = self.write_entries("put");
        if let Some((evicted, _)) = entries.push(key.clone(), entry)
            && evicted != key
        {
            counter!(METRIC_FRAGMENT_EVICT).increment(1);
            debug!(target = SOURCE, key = %evicted, "fragment evicted");
        }
    }

    /// Return the live fragment for `key`, or render it with `compute` and keep the result.
    ///
    /// Errors from `compute` are returned as-is and nothing is stored.
    pub async fn get_or_compute<F, Fut, E>(
        &self,
        key: FragmentKey,
        ttl: Duration,
        compute: F,
    ) -> Result<String, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String, E>>,
    {
        if let Some(body) = self.get(&key) {
            return Ok(body);
        }

        let body = compute().await?;
        self.put(key, body.clone(), ttl);
        Ok(body)
    }

    /// Drop every fragment.
    pub fn clear(&self) {
        self.write_entries("clear").clear();
    }

    /// Number of stored fragments, including ones that have expired but not yet been looked up.
    pub fn len(&self) -> usize {
        self.read_entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read_entries(&self) -> RwLockReadGuard<'_, LruCache<FragmentKey, Entry>> {
        self.entries.read().unwrap_or_else(|poisoned| {
            warn!(target = SOURCE, op = "len", "recovered poisoned fragment lock");
            poisoned.into_inner()
        })
    }

    fn write_entries(&self, op: &'static str) -> RwLockWriteGuard<'_, LruCache<FragmentKey, Entry>> {
        self.entries.write().unwrap_or_else(|poisoned| {
            warn!(target = SOURCE, op, "recovered poisoned fragment lock");
            poisoned.into_inner()
        })
    }
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;
    use std::panic::{AssertUnwindSafe, catch_unwind};
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    const TTL: Duration = Duration::from_secs(20);

    fn cache() -> FragmentCache {
        FragmentCache::new(CacheConfig::default())
    }

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_ttl() {
        let cache = cache();
        let key = FragmentKey::index_page(1);
        cache.put(key.clone(), "<li>first</li>".to_string(), TTL);

        tokio::time::advance(Duration::from_secs(19)).await;
        assert_eq!(cache.get(&key).as_deref(), Some("<li>first</li>"));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(cache.get(&key).is_none());
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn get_or_compute_reuses_live_entry() {
        let cache = cache();
        let calls = AtomicUsize::new(0);
        let calls = &calls;
        let render = move || async move {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, Infallible>(format!("render {n}"))
        };

        let first = cache
            .get_or_compute(FragmentKey::index_page(1), TTL, render)
            .await
            .expect("render");
        let second = cache
            .get_or_compute(FragmentKey::index_page(1), TTL, render)
            .await
            .expect("render");
        assert_eq!(first, "render 0");
        assert_eq!(second, "render 0");

        tokio::time::advance(TTL).await;
        let third = cache
            .get_or_compute(FragmentKey::index_page(1), TTL, render)
            .await
            .expect("render");
        assert_eq!(third, "render 1");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failed_compute_stores_nothing() {
        let cache = cache();
        let result: Result<String, &str> = cache
            .get_or_compute(FragmentKey::index_page(1), TTL, || async { Err("boom") })
            .await;
        assert_eq!(result, Err("boom"));
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn disabled_cache_always_computes() {
        let cache = FragmentCache::new(CacheConfig {
            enabled: false,
            ..Default::default()
        });
        cache.put(FragmentKey::index_page(1), "stale".to_string(), TTL);
        assert!(cache.get(&FragmentKey::index_page(1)).is_none());

        let body = cache
            .get_or_compute(FragmentKey::index_page(1), TTL, || async {
                Ok::<_, Infallible>("fresh".to_string())
            })
            .await
            .expect("render");
        assert_eq!(body, "fresh");
        assert!(cache.is_empty());
    }

    #[test]
    fn clear_drops_everything() {
        let cache = cache();
        cache.put(FragmentKey::index_page(1), "a".to_string(), TTL);
        cache.put(FragmentKey::index_page(2), "b".to_string(), TTL);
        assert_eq!(cache.len(), 2);
        cache.clear();
        assert!(cache.get(&FragmentKey::index_page(1)).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn least_recently_used_fragment_is_evicted() {
        let cache = FragmentCache::new(CacheConfig {
            max_entries: 2,
            ..Default::default()
        });
        cache.put(FragmentKey::index_page(1), "one".to_string(), TTL);
        cache.put(FragmentKey::index_page(2), "two".to_string(), TTL);
        assert!(cache.get(&FragmentKey::index_page(1)).is_some());

        cache.put(FragmentKey::index_page(3), "three".to_string(), TTL);
        assert!(cache.get(&FragmentKey::index_page(2)).is_none());
        assert!(cache.get(&FragmentKey::index_page(1)).is_some());
        assert!(cache.get(&FragmentKey::index_page(3)).is_some());
    }

    #[test]
    fn recovers_from_poisoned_lock() {
        let cache = cache();
        let _ = catch_unwind(AssertUnwindSafe(|| {
            let _guard = cache.entries.write().expect("entries lock should be acquired");
            panic!("poison entries lock");
        }));

        cache.put(FragmentKey::index_page(1), "after".to_string(), TTL);
        assert_eq!(cache.get(&FragmentKey::index_page(1)).as_deref(), Some("after"));
    }
}
