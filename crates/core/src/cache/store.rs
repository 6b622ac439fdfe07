//! In-memory, capacity-bounded cache with per-entry expiry.
//!
//! Backed by a sharded [`DashMap`], so operations on different keys do not
//! contend on a single lock. Every read and write stamps the entry with a
//! monotonically increasing access tick; when an insert pushes the store
//! past capacity the entry with the smallest tick is evicted, whether or
//! not it has expired.

use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;

use super::key::CacheKey;
use crate::time::instant_after;
use crate::types::{Document, ProviderResult};

/// Search results keyed by request identity.
pub type SearchCache = CacheStore<CacheKey, Vec<ProviderResult>>;

/// Extracted documents keyed by canonical URL.
pub type DocumentCache = CacheStore<String, Document>;

/// A live cache entry as returned by [`CacheStore::get`].
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry<V> {
    pub value: V,
    pub created_at: Instant,
    pub expires_at: Instant,
}

impl<V> CacheEntry<V> {
    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }

    /// Time left before expiry, zero once expired.
    pub fn remaining_ttl(&self) -> Duration {
        self.expires_at.saturating_duration_since(Instant::now())
    }
}

#[derive(Debug)]
struct Slot<V> {
    entry: CacheEntry<V>,
    last_access: u64,
}

#[derive(Debug)]
pub struct CacheStore<K, V>
where
    K: Eq + Hash,
{
    entries: DashMap<K, Slot<V>>,
    max_entries: usize,
    tick: AtomicU64,
}

impl<K, V> CacheStore<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(max_entries: usize) -> Self {
        Self { entries: DashMap::new(), max_entries: max_entries.max(1), tick: AtomicU64::new(0) }
    }

    fn next_tick(&self) -> u64 {
        self.tick.fetch_add(1, Ordering::Relaxed)
    }

    /// Return the live entry for `key`.
    ///
    /// An expired entry is treated as absent and removed.
    pub fn get(&self, key: &K) -> Option<CacheEntry<V>> {
        let now = Instant::now();
        {
            let mut slot = self.entries.get_mut(key)?;
            if !slot.entry.is_expired(now) {
                slot.last_access = self.next_tick();
                return Some(slot.entry.clone());
            }
        }
        self.entries.remove_if(key, |_, slot| slot.entry.is_expired(now));
        None
    }

    /// Insert or replace `key`, expiring after `ttl`.
    pub fn put(&self, key: K, value: V, ttl: Duration) {
        let now = Instant::now();
        let entry = CacheEntry { value, created_at: now, expires_at: instant_after(now, ttl) };
        self.entries.insert(key, Slot { entry, last_access: self.next_tick() });

        while self.entries.len() > self.max_entries {
            if !self.evict_least_recent() {
                break;
            }
        }
    }

    fn evict_least_recent(&self) -> bool {
        let victim = self
            .entries
            .iter()
            .min_by_key(|slot| slot.value().last_access)
            .map(|slot| (slot.key().clone(), slot.value().last_access));

        match victim {
            Some((key, tick)) => self.entries.remove_if(&key, |_, slot| slot.last_access == tick).is_some(),
            None => false,
        }
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        self.entries.remove(key).map(|(_, slot)| slot.entry.value)
    }

    /// Drop every expired entry, returning how many were removed.
    pub fn evict_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, slot| !slot.entry.is_expired(now));
        before.saturating_sub(self.entries.len())
    }

    /// Number of stored entries, including expired ones not yet evicted.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.max_entries
    }
}
