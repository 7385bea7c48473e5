//! The read-through cache fronting the hot lookups in [`super::ResourceStateStore`]
//! (spec §4.2). Five independent, bounded caches — one per accelerated
//! lookup — each capped at 10,000 entries with LRU eviction, the same
//! approach `near-store` uses to front its RocksDB column families with
//! `lru::LruCache`.
//!
//! The cache is strictly a read accelerator: it is populated only from
//! data already committed to the transaction (never speculatively before
//! commit), and every write that could change a cached value invalidates
//! it synchronously. It must never influence write ordering or the
//! processor's decisions — determinism flows only from the event stream.

use lru::LruCache;
use std::hash::Hash;
use std::num::NonZeroUsize;

const CAPACITY: usize = 10_000;

/// A bounded, LRU-evicting cache returning defensive (cloned) copies so
/// callers can freely mutate what they get back without corrupting the
/// cached entry.
pub struct ReadThroughCache<K: Eq + Hash, V: Clone> {
    inner: LruCache<K, V>,
}

impl<K: Eq + Hash, V: Clone> Default for ReadThroughCache<K, V> {
    fn default() -> Self {
        Self { inner: LruCache::new(NonZeroUsize::new(CAPACITY).expect("capacity is nonzero")) }
    }
}

impl<K: Eq + Hash, V: Clone> ReadThroughCache<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a clone of the cached value, if present, promoting it in
    /// the LRU order.
    pub fn get(&mut self, key: &K) -> Option<V> {
        self.inner.get(key).cloned()
    }

    /// Populates (or refreshes) an entry. Only ever called after the
    /// owning transaction has committed the value this reflects.
    pub fn put(&mut self, key: K, value: V) {
        self.inner.put(key, value);
    }

    /// Evicts an entry, used on any write that could change its value.
    pub fn invalidate(&mut self, key: &K) {
        self.inner.pop(key);
    }
}
