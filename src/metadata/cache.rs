use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Mutex;

use tracing::debug;

use super::{EnrichmentError, MetadataProvider, TrackMetadata};

struct CacheEntry<V> {
    value: V,
    last_used: u64,
}

/// Small LRU map evicting the least recently used entry when full.
pub struct LruCache<K, V> {
    entries: HashMap<K, CacheEntry<V>>,
    capacity: usize,
    tick: u64,
}

impl<K: Eq + Hash + Clone, V> LruCache<K, V> {
    /// Create a cache that keeps up to `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            capacity: capacity.max(1),
            tick: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Retrieve an entry, marking it as most recently used.
    pub fn get<Q>(&mut self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.tick = self.tick.saturating_add(1);
        let entry = self.entries.get_mut(key)?;
        entry.last_used = self.tick;
        Some(&entry.value)
    }

    /// Store an entry and evict the least recently used item when full.
    pub fn insert(&mut self, key: K, value: V) {
        self.tick = self.tick.saturating_add(1);
        self.entries.insert(
            key,
            CacheEntry {
                value,
                last_used: self.tick,
            },
        );
        if self.entries.len() > self.capacity {
            self.evict_lru();
        }
    }

    fn evict_lru(&mut self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_used)
            .map(|(key, _)| key.clone());
        if let Some(oldest) = oldest {
            self.entries.remove(&oldest);
        }
    }
}

/// Wraps a provider with a bounded cache of successful track lookups.
///
/// Failed lookups are never cached. Search results pass through uncached.
pub struct CachedMetadataProvider<P> {
    inner: P,
    cache: Mutex<LruCache<String, TrackMetadata>>,
}

impl<P: MetadataProvider> CachedMetadataProvider<P> {
    pub fn new(inner: P, capacity: usize) -> Self {
        Self {
            inner,
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }

    fn cached(&self, id: &str) -> Option<TrackMetadata> {
        let mut cache = self
            .cache
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        cache.get(id).cloned()
    }

    fn remember(&self, metadata: &TrackMetadata, id: &str) {
        let mut cache = self
            .cache
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        cache.insert(id.to_string(), metadata.clone());
    }
}

impl<P: MetadataProvider> MetadataProvider for CachedMetadataProvider<P> {
    fn track(&self, id: &str) -> Result<TrackMetadata, EnrichmentError> {
        if let Some(hit) = self.cached(id) {
            debug!(id, "Metadata cache hit");
            return Ok(hit);
        }
        let metadata = self.inner.track(id)?;
        self.remember(&metadata, id);
        Ok(metadata)
    }

    fn search(&self, query: &str, limit: usize) -> Result<Vec<TrackMetadata>, EnrichmentError> {
        self.inner.search(query, limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn evicts_least_recently_used_at_capacity() {
        let mut cache = LruCache::new(2);
        cache.insert("a", 1);
        cache.insert("b", 2);
        assert_eq!(cache.get("a"), Some(&1));
        cache.insert("c", 3);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("b"), None);
        assert_eq!(cache.get("a"), Some(&1));
        assert_eq!(cache.get("c"), Some(&3));
    }

    #[test]
    fn reinserting_refreshes_value_without_growing() {
        let mut cache = LruCache::new(2);
        cache.insert("a", 1);
        cache.insert("a", 5);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("a"), Some(&5));
    }

    #[test]
    fn zero_capacity_still_holds_one_entry() {
        let mut cache = LruCache::new(0);
        assert_eq!(cache.capacity(), 1);
        cache.insert(1, "one");
        cache.insert(2, "two");
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&2), Some(&"two"));
    }

    struct CountingProvider {
        calls: AtomicUsize,
        fail_ids: Vec<&'static str>,
    }

    impl MetadataProvider for CountingProvider {
        fn track(&self, id: &str) -> Result<TrackMetadata, EnrichmentError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_ids.iter().any(|bad| *bad == id) {
                return Err(EnrichmentError::Http { status: 503 });
            }
            Ok(TrackMetadata {
                id: id.to_string(),
                popularity: Some(10),
                ..TrackMetadata::default()
            })
        }

        fn search(&self, _query: &str, _limit: usize) -> Result<Vec<TrackMetadata>, EnrichmentError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Vec::new())
        }
    }

    #[test]
    fn successful_lookups_are_served_from_cache() {
        let provider = CachedMetadataProvider::new(
            CountingProvider {
                calls: AtomicUsize::new(0),
                fail_ids: Vec::new(),
            },
            4,
        );
        let first = provider.track("t1").unwrap();
        let second = provider.track("t1").unwrap();
        assert_eq!(first, second);
        assert_eq!(provider.inner().calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failures_are_not_cached() {
        let provider = CachedMetadataProvider::new(
            CountingProvider {
                calls: AtomicUsize::new(0),
                fail_ids: vec!["bad"],
            },
            4,
        );
        assert!(provider.track("bad").is_err());
        assert!(provider.track("bad").is_err());
        assert_eq!(provider.inner().calls.load(Ordering::SeqCst), 2);
    }
}
