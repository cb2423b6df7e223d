//! Sharded, bounded key-value cache.
//!
//! Storage is split into shards, each a `RwLock<HashMap>`; a key always maps
//! to the same shard. Capacity is divided evenly across shards so the total
//! entry count never exceeds the configured capacity.
//!
//! When a shard is full, [`EvictionPolicy::FullClear`] empties that shard
//! (amortized O(1) per insert) and [`EvictionPolicy::EvictOldest`] removes the
//! single least recently accessed entry (O(shard size) per insert, meant for
//! small caches).
//!
//! Entries are never invalidated externally. They leave the cache through
//! eviction, TTL expiry or an explicit clear.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hash};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};

use super::stats::CacheStats;

/// What happens when a shard reaches its capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvictionPolicy {
    /// Drop every entry of the full shard.
    FullClear,
    /// Drop the least recently accessed entry.
    EvictOldest,
}

/// Construction options for a [`ShardedCache`].
#[derive(Debug, Clone)]
pub struct CacheOptions {
    pub name: String,
    pub capacity: usize,
    pub shards: usize,
    pub policy: EvictionPolicy,
    pub ttl: Option<Duration>,
    pub log_every: Option<u64>,
}

impl CacheOptions {
    pub fn new(name: impl Into<String>, capacity: usize) -> Self {
        Self {
            name: name.into(),
            capacity,
            shards: 16,
            policy: EvictionPolicy::FullClear,
            ttl: None,
            log_every: None,
        }
    }

    pub fn shards(mut self, shards: usize) -> Self {
        self.shards = shards;
        self
    }

    pub fn policy(mut self, policy: EvictionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn ttl(mut self, ttl: Option<Duration>) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn log_every(mut self, log_every: Option<u64>) -> Self {
        self.log_every = log_every;
        self
    }
}

struct CacheEntry<V> {
    value: V,
    created_at: Instant,
    /// Nanoseconds since the cache epoch.
    last_access: AtomicU64,
}

type Shard<K, V> = RwLock<HashMap<K, CacheEntry<V>>>;

/// Bounded concurrent cache with hit/miss/eviction counters.
pub struct ShardedCache<K, V> {
    name: String,
    shards: Box<[Shard<K, V>]>,
    shard_capacity: usize,
    capacity: usize,
    policy: EvictionPolicy,
    ttl: Option<Duration>,
    log_every: Option<u64>,
    epoch: Instant,
    hasher: RandomState,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    accesses: AtomicU64,
}

impl<K, V> ShardedCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(options: CacheOptions) -> Self {
        let capacity = options.capacity.max(1);
        let shard_count = options.shards.clamp(1, capacity);
        let shard_capacity = capacity / shard_count;

        let shards = (0..shard_count)
            .map(|_| RwLock::new(HashMap::with_capacity(shard_capacity.min(1024))))
            .collect();

        Self {
            name: options.name,
            shards,
            shard_capacity,
            capacity,
            policy: options.policy,
            ttl: options.ttl,
            log_every: options.log_every.filter(|n| *n > 0),
            epoch: Instant::now(),
            hasher: RandomState::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            accesses: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn policy(&self) -> EvictionPolicy {
        self.policy
    }

    /// Look up a key, counting a hit or a miss.
    pub fn get(&self, key: &K) -> Option<V> {
        self.record_access();

        let now = self.now_nanos();
        let shard = self.shard(key).read().unwrap_or_else(PoisonError::into_inner);
        match shard.get(key) {
            Some(entry) if !self.is_expired(entry) => {
                entry.last_access.store(now, Ordering::Relaxed);
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.value.clone())
            }
            _ => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Insert or replace a value, evicting first if the shard is full.
    pub fn insert(&self, key: K, value: V) {
        let now = self.now_nanos();
        let mut shard = self.shard(&key).write().unwrap_or_else(PoisonError::into_inner);

        if !shard.contains_key(&key) && shard.len() >= self.shard_capacity {
            let evicted = self.evict(&mut shard);
            self.evictions.fetch_add(evicted as u64, Ordering::Relaxed);
        }

        shard.insert(
            key,
            CacheEntry {
                value,
                created_at: Instant::now(),
                last_access: AtomicU64::new(now),
            },
        );
    }

    /// Return the cached value or compute, insert and return it.
    ///
    /// No lock is held while `compute` runs; two threads missing the same key
    /// may both compute it, and the later insert wins.
    pub fn get_or_compute(&self, key: K, compute: impl FnOnce() -> V) -> V {
        if let Some(value) = self.get(&key) {
            return value;
        }
        let value = compute();
        self.insert(key, value.clone());
        value
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        self.shard(key)
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
            .map(|entry| entry.value)
    }

    /// Drop every entry. Returns how many were dropped.
    pub fn clear(&self) -> usize {
        self.shards
            .iter()
            .map(|shard| {
                let mut shard = shard.write().unwrap_or_else(PoisonError::into_inner);
                let n = shard.len();
                shard.clear();
                n
            })
            .sum()
    }

    /// Drop entries older than the TTL. Returns how many were dropped.
    pub fn clean_expired(&self) -> usize {
        if self.ttl.is_none() {
            return 0;
        }
        self.shards
            .iter()
            .map(|shard| {
                let mut shard = shard.write().unwrap_or_else(PoisonError::into_inner);
                let before = shard.len();
                shard.retain(|_, entry| !self.is_expired(entry));
                before - shard.len()
            })
            .sum()
    }

    pub fn len(&self) -> usize {
        self.shards
            .iter()
            .map(|shard| shard.read().unwrap_or_else(PoisonError::into_inner).len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            size: self.len(),
            capacity: self.capacity,
        }
    }

    /// Zero the hit/miss/eviction counters.
    pub fn reset_stats(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.evictions.store(0, Ordering::Relaxed);
        self.accesses.store(0, Ordering::Relaxed);
    }

    fn shard(&self, key: &K) -> &Shard<K, V> {
        let index = (self.hasher.hash_one(key) as usize) % self.shards.len();
        &self.shards[index]
    }

    fn evict(&self, shard: &mut HashMap<K, CacheEntry<V>>) -> usize {
        match self.policy {
            EvictionPolicy::FullClear => {
                let n = shard.len();
                shard.clear();
                n
            }
            EvictionPolicy::EvictOldest => {
                if self.ttl.is_some() {
                    let before = shard.len();
                    shard.retain(|_, entry| !self.is_expired(entry));
                    let expired = before - shard.len();
                    if expired > 0 {
                        return expired;
                    }
                }
                let oldest = shard
                    .iter()
                    .min_by_key(|(_, entry)| entry.last_access.load(Ordering::Relaxed))
                    .map(|(key, _)| key.clone());
                match oldest {
                    Some(key) => {
                        shard.remove(&key);
                        1
                    }
                    None => 0,
                }
            }
        }
    }

    fn is_expired(&self, entry: &CacheEntry<V>) -> bool {
        self.ttl
            .is_some_and(|ttl| entry.created_at.elapsed() >= ttl)
    }

    fn now_nanos(&self) -> u64 {
        self.epoch.elapsed().as_nanos() as u64
    }

    fn record_access(&self) {
        let Some(every) = self.log_every else {
            return;
        };
        let n = self.accesses.fetch_add(1, Ordering::Relaxed) + 1;
        if n % every == 0 {
            let stats = self.stats();
            tracing::debug!(
                cache = %self.name,
                hits = stats.hits,
                misses = stats.misses,
                evictions = stats.evictions,
                size = stats.size,
                hit_rate = format!("{:.1}%", stats.hit_rate() * 100.0),
                "Cache stats"
            );
        }
    }
}
