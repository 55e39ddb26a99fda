//! Concurrent TTL map remembering both successful and failed lookups.

use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, trace};

/// TTLs are clamped to this so `now + ttl` cannot overflow.
const MAX_TTL: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// Outcome of a fetch as remembered by the cache.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Cached<V> {
    /// Confirmed successful fetch.
    Positive(V),
    /// Confirmed failed fetch, remembered to suppress retries.
    Negative,
}

impl<V> Cached<V> {
    /// Returns true for a successful fetch.
    pub fn is_positive(&self) -> bool {
        matches!(self, Cached::Positive(_))
    }

    /// Borrows the value of a positive entry.
    pub fn value(&self) -> Option<&V> {
        match self {
            Cached::Positive(value) => Some(value),
            Cached::Negative => None,
        }
    }

    /// Takes the value of a positive entry.
    pub fn into_value(self) -> Option<V> {
        match self {
            Cached::Positive(value) => Some(value),
            Cached::Negative => None,
        }
    }
}

/// Cache entry with an absolute expiry.
#[derive(Clone, Debug)]
struct CacheEntry<V> {
    cached: Cached<V>,
    expires_at: Instant,
}

impl<V> CacheEntry<V> {
    fn new(cached: Cached<V>, now: Instant, ttl: Duration) -> Self {
        Self {
            cached,
            expires_at: now + ttl.min(MAX_TTL),
        }
    }

    /// Dead at and after `expires_at`.
    fn is_expired_at(&self, now: Instant) -> bool {
        self.expires_at <= now
    }
}

/// In-memory TTL map keyed by lookup key.
///
/// Backed by a sharded [`DashMap`], so unrelated keys never contend on a
/// single lock. Expired entries are invisible to [`get`](Self::get) and are
/// removed there lazily; [`sweep`](Self::sweep) reclaims the ones nobody asks
/// for again.
#[derive(Debug)]
pub struct TtlMap<V> {
    entries: DashMap<String, CacheEntry<V>>,
}

impl<V: Clone> TtlMap<V> {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Creates a map with preallocated capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: DashMap::with_capacity(capacity),
        }
    }

    /// Inserts or overwrites the entry for `key`, expiring `ttl` from now.
    pub fn put(&self, key: impl Into<String>, cached: Cached<V>, ttl: Duration) {
        let key = key.into();
        trace!(key = %key, positive = cached.is_positive(), ?ttl, "Storing cache entry");
        self.entries
            .insert(key, CacheEntry::new(cached, Instant::now(), ttl));
    }

    /// Stores a successful fetch.
    pub fn put_positive(&self, key: impl Into<String>, value: V, ttl: Duration) {
        self.put(key, Cached::Positive(value), ttl);
    }

    /// Stores a failed fetch.
    pub fn put_negative(&self, key: impl Into<String>, ttl: Duration) {
        self.put(key, Cached::Negative, ttl);
    }

    /// Returns the live entry for `key`.
    ///
    /// An entry whose expiry is at or before now is reported missing and
    /// deleted, unless a concurrent `put` replaced it first.
    pub fn get(&self, key: &str) -> Option<Cached<V>> {
        let now = Instant::now();

        match self.entries.get(key) {
            None => {
                trace!(key, "Cache miss");
                return None;
            }
            Some(entry) if !entry.is_expired_at(now) => {
                trace!(key, positive = entry.cached.is_positive(), "Cache hit");
                return Some(entry.cached.clone());
            }
            Some(_) => {}
        }

        // Shard guard is released above; re-check under the write lock.
        if self
            .entries
            .remove_if(key, |_, entry| entry.is_expired_at(now))
            .is_some()
        {
            debug!(key, "Cache entry expired");
        }
        None
    }

    /// Inserts `cached` only if no live entry exists.
    ///
    /// Returns the entry now in the map and whether it was already present.
    /// An expired resident entry counts as absent and is replaced.
    pub fn get_or_insert(
        &self,
        key: impl Into<String>,
        cached: Cached<V>,
        ttl: Duration,
    ) -> (Cached<V>, bool) {
        let now = Instant::now();

        match self.entries.entry(key.into()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_expired_at(now) {
                    occupied.insert(CacheEntry::new(cached.clone(), now, ttl));
                    (cached, false)
                } else {
                    (occupied.get().cached.clone(), true)
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(CacheEntry::new(cached.clone(), now, ttl));
                (cached, false)
            }
        }
    }

    /// Removes the entry for `key`, if any.
    pub fn remove(&self, key: &str) {
        if self.entries.remove(key).is_some() {
            trace!(key, "Removed cache entry");
        }
    }

    /// Deletes every entry that expired before `older_than`.
    ///
    /// Shards are visited one at a time, so entries written or removed while
    /// the sweep runs may or may not be seen. Returns the number deleted.
    pub fn sweep(&self, older_than: Instant) -> usize {
        let mut removed = 0;
        self.entries.retain(|key, entry| {
            if entry.expires_at < older_than {
                trace!(key = %key, "Sweeping cache entry");
                removed += 1;
                false
            } else {
                true
            }
        });

        debug!(removed, "Sweep complete");
        removed
    }

    /// Clears all entries.
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Returns the number of resident entries, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no entries are resident.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns cache statistics.
    pub fn stats(&self) -> CacheStats {
        let now = Instant::now();
        let mut stats = CacheStats::default();

        for entry in self.entries.iter() {
            stats.total_entries += 1;
            if entry.is_expired_at(now) {
                stats.expired_entries += 1;
            } else if entry.cached.is_positive() {
                stats.positive_entries += 1;
            } else {
                stats.negative_entries += 1;
            }
        }

        stats.live_entries = stats.positive_entries + stats.negative_entries;
        stats
    }

    #[cfg(test)]
    fn put_expiring_at(&self, key: &str, cached: Cached<V>, expires_at: Instant) {
        self.entries
            .insert(key.to_string(), CacheEntry { cached, expires_at });
    }
}

impl<V: Clone> Default for TtlMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

/// Cache statistics.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Resident entries, expired ones included
    pub total_entries: usize,
    /// Entries still visible to lookups
    pub live_entries: usize,
    /// Expired entries waiting for lazy removal or the sweep
    pub expired_entries: usize,
    /// Live successful fetches
    pub positive_entries: usize,
    /// Live remembered failures
    pub negative_entries: usize,
}
