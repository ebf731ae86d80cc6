//! LRU + TTL bookkeeping shared by the context and decision caches.

use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use lru::LruCache;

/// Size and capacity of one cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct CacheUsage {
    /// Entries currently resident (expired entries not yet swept included).
    pub size: usize,
    /// Maximum number of entries.
    pub capacity: usize,
}

/// Snapshot of both engine caches, for monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct CacheStats {
    /// Per-user context cache.
    pub context_cache: CacheUsage,
    /// Per-(user, permission) decision cache.
    pub decision_cache: CacheUsage,
}

/// Locks a cache mutex. Cache state stays structurally valid even if a holder
/// panicked, so poisoning is ignored.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug)]
struct Entry<V> {
    value: V,
    expires_at: Instant,
}

/// Result of a lookup.
pub(crate) enum Fetch<V> {
    Hit { value: V, expires_at: Instant },
    /// The entry was present but stale and has been dropped.
    Expired,
    Miss,
}

/// Longest TTL a cache honors. `Duration::MAX` and the like mean "never
/// expire" in practice but would overflow `Instant` arithmetic.
pub(crate) const MAX_TTL: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// Bounded LRU map whose entries also expire.
///
/// Not synchronized; owners wrap it in a mutex. `epoch` is bumped on every
/// invalidation so writers that started before it can be turned away.
#[derive(Debug)]
pub(crate) struct LruTtl<K: Hash + Eq, V> {
    entries: LruCache<K, Entry<V>>,
    capacity: usize,
    ttl: Duration,
    epoch: u64,
}

impl<K, V> LruTtl<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    /// A capacity of zero disables the cache: nothing is ever stored.
    /// TTLs above [`MAX_TTL`] are clamped to it.
    pub(crate) fn new(capacity: usize, ttl: Duration) -> Self {
        let bound = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: LruCache::new(bound),
            capacity,
            ttl: ttl.min(MAX_TTL),
            epoch: 0,
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    pub(crate) fn ttl(&self) -> Duration {
        self.ttl
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn epoch(&self) -> u64 {
        self.epoch
    }

    pub(crate) fn bump_epoch(&mut self) {
        self.epoch = self.epoch.wrapping_add(1);
    }

    /// Default expiry for an entry inserted at `now`.
    pub(crate) fn expiry_from(&self, now: Instant) -> Instant {
        now.checked_add(self.ttl)
            .or_else(|| now.checked_add(MAX_TTL))
            .unwrap_or(now)
    }

    pub(crate) fn get(&mut self, key: &K, now: Instant) -> Fetch<V> {
        let expired = match self.entries.peek(key) {
            None => return Fetch::Miss,
            Some(entry) => now >= entry.expires_at,
        };
        if expired {
            self.entries.pop(key);
            return Fetch::Expired;
        }
        match self.entries.get(key) {
            Some(entry) => Fetch::Hit {
                value: entry.value.clone(),
                expires_at: entry.expires_at,
            },
            None => Fetch::Miss,
        }
    }

    /// Inserts or overwrites `key`. Returns every other key that left the
    /// cache as a side effect (stale tail entries and capacity evictions).
    pub(crate) fn insert(&mut self, key: K, value: V, expires_at: Instant, now: Instant) -> Vec<K> {
        if self.capacity == 0 {
            return Vec::new();
        }
        let mut removed = self.sweep_stale_tail(now);
        if let Some((evicted, _)) = self.entries.push(key.clone(), Entry { value, expires_at })
            && evicted != key
        {
            removed.push(evicted);
        }
        removed
    }

    pub(crate) fn remove(&mut self, key: &K) -> bool {
        self.entries.pop(key).is_some()
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    /// Drops every expired entry and returns their keys.
    pub(crate) fn purge_expired(&mut self, now: Instant) -> Vec<K> {
        let stale: Vec<K> = self
            .entries
            .iter()
            .filter(|(_, entry)| now >= entry.expires_at)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &stale {
            self.entries.pop(key);
        }
        stale
    }

    /// Returns the keys of live entries whose value matches `predicate`.
    pub(crate) fn keys_where(&self, now: Instant, predicate: impl Fn(&V) -> bool) -> Vec<K> {
        self.entries
            .iter()
            .filter(|(_, entry)| now < entry.expires_at && predicate(&entry.value))
            .map(|(key, _)| key.clone())
            .collect()
    }

    // Cheap amortized sweep: only looks at the least recently used end.
    fn sweep_stale_tail(&mut self, now: Instant) -> Vec<K> {
        let mut removed = Vec::new();
        loop {
            let stale = matches!(self.entries.peek_lru(), Some((_, entry)) if now >= entry.expires_at);
            if !stale {
                break;
            }
            if let Some((key, _)) = self.entries.pop_lru() {
                removed.push(key);
            }
        }
        removed
    }
}
