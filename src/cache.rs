//! Bounded, internally synchronised LRU caches.
//!
//! ## Eviction order
//!
//! Recency is tracked with a monotonically increasing use counter rather
//! than timestamps: every `get` hit and every `put` stamps the entry with the
//! next counter value, and eviction removes the entry with the smallest
//! stamp. The result is fully deterministic for a given call sequence.
//!
//! A `BTreeMap<stamp, key>` index keeps eviction at `O(log n)`.
//!
//! ## Concurrency
//!
//! Each cache owns one mutex; callers never lock. A `get` clones the value
//! out while holding the lock, so a reader gets either the value present at
//! call time or nothing. Values are typically `Arc<T>`, which makes the clone
//! a reference-count bump.

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use tracing::debug;

use crate::source::{FontInfo, FontRef, ObjectRef, ObjectValue};

/// Hard ceiling for the auto-sized object cache.
pub const MAX_OBJECT_CACHE_CAPACITY: usize = 5000;

/// Objects budgeted per requested page by [`object_cache_capacity`].
pub const OBJECTS_PER_PAGE: usize = 64;

/// Default font cache capacity.
pub const DEFAULT_FONT_CACHE_CAPACITY: usize = 256;

/// Object cache size for a batch of `requested_pages` pages when the caller
/// did not configure one: proportional to the request, capped at
/// [`MAX_OBJECT_CACHE_CAPACITY`].
pub fn object_cache_capacity(requested_pages: usize) -> usize {
    requested_pages
        .saturating_mul(OBJECTS_PER_PAGE)
        .clamp(OBJECTS_PER_PAGE, MAX_OBJECT_CACHE_CAPACITY)
}

/// Decoded-object cache shared by all extractors of a document.
pub type ObjectCache = LruCache<ObjectRef, Arc<ObjectValue>>;

/// Font-metric cache shared by all extractors of a document.
pub type FontCache = LruCache<FontRef, Arc<FontInfo>>;

/// Point-in-time counters for one cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub size: usize,
    /// `0` means unbounded.
    pub capacity: usize,
}

impl CacheStats {
    /// Hit ratio in `[0, 1]`; `0` before the first lookup.
    pub fn hit_rate(&self) -> f64 {
        let lookups = self.hits + self.misses;
        if lookups == 0 {
            0.0
        } else {
            self.hits as f64 / lookups as f64
        }
    }
}

struct Entry<V> {
    value: V,
    last_use: u64,
}

struct Inner<K, V> {
    capacity: usize,
    tick: u64,
    entries: HashMap<K, Entry<V>>,
    order: BTreeMap<u64, K>,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl<K: Eq + Hash + Clone, V> Inner<K, V> {
    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    fn is_over(&self) -> bool {
        self.capacity > 0 && self.entries.len() > self.capacity
    }

    fn evict_oldest(&mut self) -> Option<K> {
        let (_, key) = self.order.pop_first()?;
        self.entries.remove(&key);
        self.evictions += 1;
        Some(key)
    }
}

/// A capacity-bounded map with least-recently-used eviction.
///
/// Capacity `0` means unbounded.
///
/// # Example
/// ```rust
/// use edgequake_pdftext::cache::LruCache;
///
/// let cache = LruCache::new(2);
/// cache.put("a", 1);
/// cache.put("b", 2);
/// cache.put("c", 3);
/// assert_eq!(cache.get(&"a"), None);
/// assert_eq!(cache.len(), 2);
/// ```
pub struct LruCache<K, V> {
    inner: Mutex<Inner<K, V>>,
}

impl<K, V> LruCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                capacity,
                tick: 0,
                entries: HashMap::new(),
                order: BTreeMap::new(),
                hits: 0,
                misses: 0,
                evictions: 0,
            }),
        }
    }

    pub fn unbounded() -> Self {
        Self::new(0)
    }

    // A panic while holding the lock cannot leave an entry half-written
    // (every mutation is a whole insert/remove), so poisoning is ignored.
    fn lock(&self) -> MutexGuard<'_, Inner<K, V>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Look up `key`, marking it most recently used on a hit.
    pub fn get(&self, key: &K) -> Option<V> {
        let mut inner = self.lock();
        let tick = inner.next_tick();
        let found = match inner.entries.get_mut(key) {
            Some(entry) => {
                let previous = entry.last_use;
                entry.last_use = tick;
                Some((previous, entry.value.clone()))
            }
            None => None,
        };
        match found {
            Some((previous, value)) => {
                inner.order.remove(&previous);
                inner.order.insert(tick, key.clone());
                inner.hits += 1;
                Some(value)
            }
            None => {
                inner.misses += 1;
                None
            }
        }
    }

    /// Insert or replace `key`. Past capacity, exactly one entry (the least
    /// recently used) is evicted and its key returned.
    pub fn put(&self, key: K, value: V) -> Option<K> {
        let mut inner = self.lock();
        let tick = inner.next_tick();
        if let Some(old) = inner.entries.insert(
            key.clone(),
            Entry {
                value,
                last_use: tick,
            },
        ) {
            inner.order.remove(&old.last_use);
        }
        inner.order.insert(tick, key);
        if inner.is_over() {
            inner.evict_oldest()
        } else {
            None
        }
    }

    /// Return the cached value for `key`, or compute, store and return it.
    ///
    /// The loader runs without the lock held, so two workers missing on the
    /// same key may both load it; the later `put` wins.
    pub fn get_or_try_insert_with<E>(
        &self,
        key: &K,
        load: impl FnOnce() -> Result<V, E>,
    ) -> Result<V, E> {
        if let Some(v) = self.get(key) {
            return Ok(v);
        }
        let value = load()?;
        self.put(key.clone(), value.clone());
        Ok(value)
    }

    /// Whether `key` is present. Does not affect recency.
    pub fn contains(&self, key: &K) -> bool {
        self.lock().entries.contains_key(key)
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        let mut inner = self.lock();
        let entry = inner.entries.remove(key)?;
        inner.order.remove(&entry.last_use);
        Some(entry.value)
    }

    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.entries.clear();
        inner.order.clear();
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.lock().capacity
    }

    /// Change the bound, evicting least-recently-used entries until the cache
    /// fits. Returns the evicted keys, oldest first.
    pub fn set_capacity(&self, capacity: usize) -> Vec<K> {
        let mut inner = self.lock();
        inner.capacity = capacity;
        let mut evicted = Vec::new();
        while inner.is_over() {
            match inner.evict_oldest() {
                Some(k) => evicted.push(k),
                None => break,
            }
        }
        if !evicted.is_empty() {
            debug!(
                "Cache resized to {}: evicted {} entries",
                capacity,
                evicted.len()
            );
        }
        evicted
    }

    /// Keys from least to most recently used.
    pub fn keys_by_recency(&self) -> Vec<K> {
        self.lock().order.values().cloned().collect()
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.lock();
        CacheStats {
            hits: inner.hits,
            misses: inner.misses,
            evictions: inner.evictions,
            size: inner.entries.len(),
            capacity: inner.capacity,
        }
    }
}

impl<K, V> std::fmt::Debug for LruCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stats = self.stats();
        f.debug_struct("LruCache")
            .field("size", &stats.size)
            .field("capacity", &stats.capacity)
            .finish()
    }
}
