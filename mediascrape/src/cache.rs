//! Expiring memoization for upstream lookups.
//!
//! Each extractor owns its caches and receives them as [`SharedCache`]
//! handles, so tests can swap in [`NoOpCache`]. Entries are written once and
//! never mutated; concurrent misses on the same key may both compute.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::config::CacheConfig;
use crate::errors::ScrapeError;

/// Cache key: the producing operation plus its normalized arguments.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    operation: &'static str,
    args: Vec<String>,
}

impl CacheKey {
    /// Creates a key over identifiers. Whitespace is collapsed, case is kept.
    pub fn new<I, S>(operation: &'static str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            operation,
            args: args.into_iter().map(|a| collapse(a.as_ref())).collect(),
        }
    }

    /// Creates a key over free text, which is also case-folded.
    pub fn folded<I, S>(operation: &'static str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            operation,
            args: Vec::new(),
        }
        .with_folded_args(args)
    }

    /// Appends a case-folded argument, e.g. a locale.
    #[must_use]
    pub fn with_folded(self, arg: &str) -> Self {
        self.with_folded_args([arg])
    }

    fn with_folded_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.args
            .extend(args.into_iter().map(|a| collapse(a.as_ref()).to_lowercase()));
        self
    }

    /// The operation this key belongs to.
    #[must_use]
    pub const fn operation(&self) -> &'static str {
        self.operation
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.operation, self.args.join(", "))
    }
}

fn collapse(arg: &str) -> String {
    arg.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Storage backend for memoized values.
pub trait QueryCache<V>: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Gets a live entry, dropping it if it has expired.
    fn get(&self, key: &CacheKey) -> Option<V>;

    /// Stores a value.
    fn insert(&self, key: CacheKey, value: V);

    /// Number of stored entries, expired ones included.
    fn len(&self) -> usize;

    /// Returns true if nothing is stored.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clears all entries.
    fn clear(&self);
}

/// Shared handle to a cache.
pub type SharedCache<V> = Arc<dyn QueryCache<V>>;

/// Entry in the cache.
#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    inserted_at: Instant,
}

/// In-memory cache with a time-to-live and an entry bound.
///
/// When full, expired entries are purged first and then the oldest insertion
/// is evicted.
#[derive(Debug)]
pub struct TtlCache<V> {
    name: String,
    entries: Mutex<HashMap<CacheKey, CacheEntry<V>>>,
    ttl: Duration,
    max_entries: usize,
}

impl<V: Clone + Send> TtlCache<V> {
    /// Creates a new cache.
    #[must_use]
    pub fn new(name: impl Into<String>, ttl: Duration, max_entries: usize) -> Self {
        Self {
            name: name.into(),
            entries: Mutex::new(HashMap::new()),
            ttl,
            max_entries: max_entries.max(1),
        }
    }

    /// Creates a cache sized from configuration.
    #[must_use]
    pub fn from_config(name: impl Into<String>, config: &CacheConfig) -> Self {
        Self::new(name, config.ttl(), config.max_entries)
    }

    /// Creates a shared handle sized from configuration.
    #[must_use]
    pub fn shared(name: impl Into<String>, config: &CacheConfig) -> SharedCache<V>
    where
        V: 'static,
    {
        Arc::new(Self::from_config(name, config))
    }

    fn make_room(&self, entries: &mut HashMap<CacheKey, CacheEntry<V>>) {
        if entries.len() < self.max_entries {
            return;
        }

        let ttl = self.ttl;
        entries.retain(|_, entry| entry.inserted_at.elapsed() < ttl);

        while entries.len() >= self.max_entries {
            let Some(oldest) = entries
                .iter()
                .min_by_key(|(_, entry)| entry.inserted_at)
                .map(|(key, _)| key.clone())
            else {
                break;
            };
            entries.remove(&oldest);
        }
    }
}

impl<V: Clone + Send> QueryCache<V> for TtlCache<V> {
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self, key: &CacheKey) -> Option<V> {
        let mut entries = self.entries.lock();
        let expired = match entries.get(key) {
            Some(entry) if entry.inserted_at.elapsed() < self.ttl => {
                return Some(entry.value.clone());
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.remove(key);
        }
        None
    }

    fn insert(&self, key: CacheKey, value: V) {
        let mut entries = self.entries.lock();
        if !entries.contains_key(&key) {
            self.make_room(&mut entries);
        }
        entries.insert(
            key,
            CacheEntry {
                value,
                inserted_at: Instant::now(),
            },
        );
    }

    fn len(&self) -> usize {
        self.entries.lock().len()
    }

    fn clear(&self) {
        self.entries.lock().clear();
    }
}

/// A cache that never stores anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpCache;

impl NoOpCache {
    /// Creates a shared no-op handle.
    #[must_use]
    pub fn shared<V: 'static>() -> SharedCache<V> {
        Arc::new(Self)
    }
}

impl<V> QueryCache<V> for NoOpCache {
    fn name(&self) -> &str {
        "noop"
    }

    fn get(&self, _key: &CacheKey) -> Option<V> {
        None
    }

    fn insert(&self, _key: CacheKey, _value: V) {}

    fn len(&self) -> usize {
        0
    }

    fn clear(&self) {}
}

/// Returns the cached value for `key`, or runs `compute` and stores its
/// successful result. Errors are returned without being cached.
pub async fn memoize<V, F, Fut>(
    cache: &dyn QueryCache<V>,
    key: CacheKey,
    compute: F,
) -> Result<V, ScrapeError>
where
    V: Clone,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<V, ScrapeError>>,
{
    if let Some(hit) = cache.get(&key) {
        debug!(cache = cache.name(), key = %key, "Cache hit");
        return Ok(hit);
    }

    debug!(cache = cache.name(), key = %key, "Cache miss");
    let value = compute().await?;
    cache.insert(key, value.clone());
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn key(arg: &str) -> CacheKey {
        CacheKey::new("test", [arg])
    }

    #[test]
    fn test_key_normalization() {
        assert_eq!(
            CacheKey::folded("imdb.search", ["  The  Shawshank Redemption ", "en-US"]),
            CacheKey::folded("imdb.search", ["the shawshank redemption", "EN-us"])
        );
        assert_ne!(
            CacheKey::folded("imdb.search", ["dune"]),
            CacheKey::folded("openlibrary.search", ["dune"])
        );
        assert_eq!(
            CacheKey::new("imdb.title", ["tt0111161"]).with_folded("en-US").to_string(),
            "imdb.title(tt0111161, en-us)"
        );
    }

    #[test]
    fn test_identifier_keys_keep_case() {
        assert_ne!(
            CacheKey::new("openlibrary.record", ["/works/OL166894W"]),
            CacheKey::new("openlibrary.record", ["/works/ol166894w"])
        );
        assert_eq!(
            CacheKey::new("amazon.product", [" B00005JLXH "]).to_string(),
            "amazon.product(B00005JLXH)"
        );
    }

    #[test]
    fn test_ttl_cache_get_and_insert() {
        let cache = TtlCache::new("test", Duration::from_secs(60), 8);

        assert!(cache.get(&key("a")).is_none());
        cache.insert(key("a"), 1);
        assert_eq!(cache.get(&key("a")), Some(1));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_ttl_cache_expiry() {
        let cache = TtlCache::new("test", Duration::from_millis(1), 8);

        cache.insert(key("a"), 1);
        std::thread::sleep(Duration::from_millis(10));

        assert!(cache.get(&key("a")).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_ttl_cache_evicts_oldest_when_full() {
        let cache = TtlCache::new("test", Duration::from_secs(60), 2);

        cache.insert(key("a"), 1);
        std::thread::sleep(Duration::from_millis(2));
        cache.insert(key("b"), 2);
        std::thread::sleep(Duration::from_millis(2));
        cache.insert(key("c"), 3);

        assert_eq!(cache.len(), 2);
        assert!(cache.get(&key("a")).is_none());
        assert_eq!(cache.get(&key("b")), Some(2));
        assert_eq!(cache.get(&key("c")), Some(3));
    }

    #[test]
    fn test_ttl_cache_overwrite_does_not_evict() {
        let cache = TtlCache::new("test", Duration::from_secs(60), 2);

        cache.insert(key("a"), 1);
        cache.insert(key("b"), 2);
        cache.insert(key("b"), 20);

        assert_eq!(cache.get(&key("a")), Some(1));
        assert_eq!(cache.get(&key("b")), Some(20));
    }

    #[tokio::test]
    async fn test_memoize_computes_once_within_ttl() {
        let cache = TtlCache::new("test", Duration::from_millis(50), 8);
        let calls = AtomicUsize::new(0);
        let counter = &calls;
        let compute = move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<_, ScrapeError>("value".to_string())
        };

        assert_eq!(memoize(&cache, key("a"), compute).await.unwrap(), "value");
        assert_eq!(memoize(&cache, key("a"), compute).await.unwrap(), "value");
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_millis(80)).await;

        memoize(&cache, key("a"), compute).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_memoize_does_not_cache_errors() {
        let cache = TtlCache::<String>::new("test", Duration::from_secs(60), 8);
        let calls = AtomicUsize::new(0);
        let counter = &calls;
        let compute = move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err::<String, _>(ScrapeError::not_found("missing"))
        };

        assert!(memoize(&cache, key("a"), compute).await.is_err());
        assert!(memoize(&cache, key("a"), compute).await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_noop_cache_always_computes() {
        let cache = NoOpCache;
        let calls = AtomicUsize::new(0);
        let counter = &calls;
        let compute = move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<_, ScrapeError>(7)
        };

        memoize::<i32, _, _>(&cache, key("a"), compute).await.unwrap();
        memoize::<i32, _, _>(&cache, key("a"), compute).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(QueryCache::<i32>::is_empty(&cache));
    }
}
