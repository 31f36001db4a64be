/*!
 * Sharded Concurrent Hash Map
 *
 * Partitions the key space into a fixed number of shards, each an
 * independent chained hash table behind its own reader/writer lock.
 * Operations on different shards never contend; operations on the same
 * shard serialize only against writers.
 *
 * Routing uses the low bits of the key hash to pick a shard and the
 * remaining bits to pick a bucket inside it, so the two choices stay
 * independent as a shard's bucket array grows.
 */

use super::stats::MapStats;
use crate::core::config::MapConfig;
use crate::core::errors::ContainerResult;
use crate::core::sync::CachePadded;
use ahash::RandomState;
use parking_lot::RwLock;
use std::borrow::Borrow;
use std::fmt;
use std::hash::{BuildHasher, Hash};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

type Link<K, V> = Option<Box<Entry<K, V>>>;

/// One key-value pair in a bucket's collision chain
struct Entry<K, V> {
    /// Hash bits left over after shard selection
    hash: u64,
    key: K,
    value: V,
    next: Link<K, V>,
}

/// Chained hash table owned by a single lock
struct Shard<K, V> {
    buckets: Vec<Link<K, V>>,
    len: usize,
}

impl<K, V> Shard<K, V> {
    fn new(bucket_count: usize) -> Self {
        Self {
            buckets: empty_buckets(bucket_count),
            len: 0,
        }
    }

    #[inline]
    fn bucket_index(&self, hash: u64) -> usize {
        (hash as usize) & (self.buckets.len() - 1)
    }

    fn get<Q>(&self, hash: u64, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        let mut cursor = self.buckets[self.bucket_index(hash)].as_deref();
        while let Some(entry) = cursor {
            if entry.hash == hash && entry.key.borrow() == key {
                return Some(&entry.value);
            }
            cursor = entry.next.as_deref();
        }
        None
    }

    /// Insert if absent; returns false when the key is already present
    fn insert(&mut self, hash: u64, key: K, value: V) -> bool
    where
        K: Eq,
    {
        if self.get(hash, &key).is_some() {
            return false;
        }

        let idx = self.bucket_index(hash);
        let next = self.buckets[idx].take();
        self.buckets[idx] = Some(Box::new(Entry {
            hash,
            key,
            value,
            next,
        }));
        self.len += 1;
        true
    }

    fn remove<Q>(&mut self, hash: u64, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        let idx = self.bucket_index(hash);
        let mut link = &mut self.buckets[idx];

        while link
            .as_ref()
            .is_some_and(|entry| !(entry.hash == hash && entry.key.borrow() == key))
        {
            link = &mut link.as_mut()?.next;
        }

        let mut removed = link.take()?;
        *link = removed.next.take();
        self.len -= 1;
        Some(removed.value)
    }

    #[inline]
    fn needs_grow(&self, max_load_factor: f32) -> bool {
        self.len as f32 > self.buckets.len() as f32 * max_load_factor
    }

    /// Double the bucket array and relink every entry
    fn grow(&mut self) {
        let new_count = self.buckets.len() * 2;
        let old = std::mem::replace(&mut self.buckets, empty_buckets(new_count));

        for mut chain in old {
            while let Some(mut entry) = chain {
                chain = entry.next.take();
                let idx = self.bucket_index(entry.hash);
                entry.next = self.buckets[idx].take();
                self.buckets[idx] = Some(entry);
            }
        }
    }

    /// Drop every entry, returning how many were removed
    fn clear(&mut self) -> usize {
        for bucket in self.buckets.iter_mut() {
            // Unlink one entry at a time so long chains don't recurse in Drop
            let mut chain = bucket.take();
            while let Some(mut entry) = chain {
                chain = entry.next.take();
            }
        }
        std::mem::take(&mut self.len)
    }
}

impl<K, V> Drop for Shard<K, V> {
    fn drop(&mut self) {
        self.clear();
    }
}

fn empty_buckets<K, V>(count: usize) -> Vec<Link<K, V>> {
    let mut buckets = Vec::with_capacity(count);
    buckets.resize_with(count, || None);
    buckets
}

/// Fixed-cardinality sharded hash map
///
/// # Semantics
///
/// - `insert` is insert-if-absent: an existing value is never overwritten
/// - `find` returns a clone of the value taken under the shard's read lock
/// - `len` reads a global counter that is updated under each shard's lock and
///   may lag an in-flight mutation on another shard
///
/// # Example
///
/// ```
/// use hcstl::ShardedMap;
///
/// let map = ShardedMap::new();
/// assert!(map.insert("one", 1));
/// assert!(!map.insert("one", 100));
/// assert_eq!(map.find("one"), Some(1));
/// assert!(map.erase("one"));
/// assert_eq!(map.find("one"), None);
/// ```
pub struct ShardedMap<K, V, S = RandomState> {
    shards: Box<[CachePadded<RwLock<Shard<K, V>>>]>,
    shard_mask: usize,
    shard_bits: u32,
    max_load_factor: f32,
    len: CachePadded<AtomicUsize>,
    hasher: S,
}

impl<K: Hash + Eq, V> ShardedMap<K, V, RandomState> {
    /// Create a map with the default configuration (32 shards)
    pub fn new() -> Self {
        Self::build(MapConfig::default(), RandomState::new())
    }

    /// Create a map with `shard_count` shards (must be a power of 2)
    pub fn with_shards(shard_count: usize) -> ContainerResult<Self> {
        Self::with_config(MapConfig::with_shards(shard_count))
    }

    pub fn with_config(config: MapConfig) -> ContainerResult<Self> {
        Self::with_config_and_hasher(config, RandomState::new())
    }
}

impl<K: Hash + Eq, V, S: BuildHasher> ShardedMap<K, V, S> {
    /// Create a map with a caller-supplied hasher
    pub fn with_config_and_hasher(config: MapConfig, hasher: S) -> ContainerResult<Self> {
        config.validate()?;
        Ok(Self::build(config, hasher))
    }

    fn build(config: MapConfig, hasher: S) -> Self {
        let shards = (0..config.shard_count)
            .map(|_| {
                CachePadded::new(RwLock::new(Shard::new(config.initial_buckets_per_shard)))
            })
            .collect::<Vec<_>>()
            .into_boxed_slice();

        debug!(
            shard_count = config.shard_count,
            buckets_per_shard = config.initial_buckets_per_shard,
            max_load_factor = config.max_load_factor,
            "ShardedMap created"
        );

        Self {
            shards,
            shard_mask: config.shard_count - 1,
            shard_bits: config.shard_count.trailing_zeros(),
            max_load_factor: config.max_load_factor,
            len: CachePadded::new(AtomicUsize::new(0)),
            hasher,
        }
    }

    /// Shard index and in-shard hash for a key
    #[inline]
    fn route<Q: Hash + ?Sized>(&self, key: &Q) -> (usize, u64) {
        let hash = self.hasher.hash_one(key);
        ((hash as usize) & self.shard_mask, hash >> self.shard_bits)
    }

    /// Insert if absent
    ///
    /// Returns `true` if the pair was inserted, `false` if the key was already
    /// present (the existing value is left untouched).
    pub fn insert(&self, key: K, value: V) -> bool {
        let (idx, hash) = self.route(&key);
        let mut shard = self.shards[idx].write();

        if !shard.insert(hash, key, value) {
            return false;
        }
        self.len.fetch_add(1, Ordering::Relaxed);

        if shard.needs_grow(self.max_load_factor) {
            let old_buckets = shard.buckets.len();
            shard.grow();
            debug!(
                shard = idx,
                old_buckets,
                new_buckets = shard.buckets.len(),
                entries = shard.len,
                "Shard bucket table grown"
            );
        }
        true
    }

    /// Clone of the value for `key`, if present (read lock only)
    pub fn find<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        V: Clone,
    {
        self.with_value(key, V::clone)
    }

    /// Run `f` on the value for `key` under the shard's read lock
    ///
    /// Avoids the clone `find` makes. `f` must not call back into this map
    /// with a key routed to the same shard while holding on to the lock.
    pub fn with_value<Q, F, R>(&self, key: &Q, f: F) -> Option<R>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        F: FnOnce(&V) -> R,
    {
        let (idx, hash) = self.route(key);
        let shard = self.shards[idx].read();
        shard.get(hash, key).map(f)
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.with_value(key, |_| ()).is_some()
    }

    /// Remove `key`, returning whether a removal happened
    pub fn erase<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.remove(key).is_some()
    }

    /// Remove `key`, returning its value
    pub fn remove<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let (idx, hash) = self.route(key);
        let mut shard = self.shards[idx].write();
        let value = shard.remove(hash, key)?;
        self.len.fetch_sub(1, Ordering::Relaxed);
        Some(value)
    }
}

impl<K, V, S> ShardedMap<K, V, S> {
    /// Global entry count (eventually consistent across shards)
    #[inline]
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Remove every entry, one shard at a time
    ///
    /// Shards are cleared in order under their own write locks, so inserts
    /// into an already-cleared shard that race with `clear` survive it.
    pub fn clear(&self) {
        let mut removed = 0;
        for shard in self.shards.iter() {
            let mut shard = shard.write();
            let count = shard.clear();
            self.len.fetch_sub(count, Ordering::Relaxed);
            removed += count;
        }
        debug!(removed, "ShardedMap cleared");
    }

    /// Per-shard distribution snapshot (takes each read lock in turn)
    pub fn stats(&self) -> MapStats {
        let mut shard_lens = Vec::with_capacity(self.shards.len());
        let mut bucket_counts = Vec::with_capacity(self.shards.len());
        for shard in self.shards.iter() {
            let shard = shard.read();
            shard_lens.push(shard.len);
            bucket_counts.push(shard.buckets.len());
        }
        MapStats {
            len: self.len(),
            shard_lens,
            bucket_counts,
        }
    }
}

impl<K: Hash + Eq, V> Default for ShardedMap<K, V, RandomState> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S> fmt::Debug for ShardedMap<K, V, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShardedMap")
            .field("len", &self.len())
            .field("shard_count", &self.shard_count())
            .finish_non_exhaustive()
    }
}
