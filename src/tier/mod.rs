// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! A single cache tier: capacity-bounded, per-entry TTL, tier-local lock.
//!
//! # Expiry
//!
//! Entries are stamped with `expires_at = now + ttl` on every [`set`] and
//! are invisible once `now >= expires_at`. Expired entries are reclaimed
//! lazily by [`get`] or in bulk by [`purge_expired`]. A `get` refreshes LRU
//! recency but never the TTL; only `set` does.
//!
//! # Capacity
//!
//! Inserting a new key into a full tier evicts the least-recently-used
//! entry. Overwriting an existing key never evicts.
//!
//! [`set`]: CacheTier::set
//! [`get`]: CacheTier::get
//! [`purge_expired`]: CacheTier::purge_expired

mod entry;

pub use entry::CacheEntry;

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use lru::LruCache;
use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::config::TierConfig;
use crate::error::CacheError;

/// One level of the cache hierarchy.
pub struct CacheTier<V> {
    name: Arc<str>,
    ttl: Duration,
    capacity: NonZeroUsize,
    entries: Mutex<LruCache<String, CacheEntry<V>>>,
    hits: AtomicU64,
    misses: AtomicU64,
    expired: AtomicU64,
    evictions: AtomicU64,
    writes: AtomicU64,
}

/// Point-in-time counters for one tier.
#[derive(Debug, Clone, PartialEq)]
pub struct TierStats {
    pub name: String,
    pub capacity: usize,
    pub ttl: Duration,
    /// Resident entries, including expired ones not yet reclaimed
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    /// Entries reclaimed after their TTL ran out
    pub expired: u64,
    /// Live entries dropped to make room
    pub evictions: u64,
    pub writes: u64,
    /// Hit rate (0.0 - 1.0)
    pub hit_rate: f64,
}

impl<V> CacheTier<V> {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity.get()
    }
}

impl<V: Clone> CacheTier<V> {
    /// Build a tier from its config. Zero capacity or TTL is rejected.
    pub fn new(config: &TierConfig) -> Result<Self, CacheError> {
        let capacity = NonZeroUsize::new(config.capacity).ok_or_else(|| {
            CacheError::InvalidConfig(format!("tier '{}' has zero capacity", config.name))
        })?;
        if config.ttl_ms == 0 {
            return Err(CacheError::InvalidConfig(format!(
                "tier '{}' has zero ttl",
                config.name
            )));
        }

        Ok(Self {
            name: config.name.as_str().into(),
            ttl: config.ttl(),
            capacity,
            entries: Mutex::new(LruCache::new(capacity)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            expired: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            writes: AtomicU64::new(0),
        })
    }

    /// Value for `key` if present and unexpired.
    ///
    /// An expired entry is removed on the spot and reported absent.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        let mut entries = self.entries.lock();

        // Outer None: absent. Inner None: resident but expired.
        let probe = entries
            .get(key)
            .map(|entry| entry.is_live(now).then(|| entry.value.clone()));

        match probe {
            Some(Some(value)) => {
                drop(entries);
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(value)
            }
            Some(None) => {
                entries.pop(key);
                let resident = entries.len();
                drop(entries);
                self.misses.fetch_add(1, Ordering::Relaxed);
                self.expired.fetch_add(1, Ordering::Relaxed);
                debug!(tier = %self.name, key, "Expired entry reclaimed on read");
                crate::metrics::record_expired(&self.name, 1);
                crate::metrics::set_tier_entries(&self.name, resident);
                None
            }
            None => {
                drop(entries);
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Insert or overwrite `key`, resetting its expiry to `now + ttl`.
    ///
    /// Returns the key displaced to make room, if any.
    pub fn set(&self, key: &str, value: V) -> Option<String> {
        let now = Instant::now();
        let entry = CacheEntry::new(value, now, self.ttl);

        let (displaced, resident) = {
            let mut entries = self.entries.lock();
            let displaced = entries.push(key.to_string(), entry);
            (displaced, entries.len())
        };
        self.writes.fetch_add(1, Ordering::Relaxed);
        crate::metrics::set_tier_entries(&self.name, resident);

        match displaced {
            // push hands back the old value on overwrite; that is not an eviction
            Some((old_key, _)) if old_key == key => None,
            Some((old_key, old_entry)) => {
                if old_entry.is_live(now) {
                    self.evictions.fetch_add(1, Ordering::Relaxed);
                    crate::metrics::record_eviction(&self.name);
                    debug!(tier = %self.name, evicted = %old_key, "Capacity eviction");
                } else {
                    self.expired.fetch_add(1, Ordering::Relaxed);
                    crate::metrics::record_expired(&self.name, 1);
                }
                Some(old_key)
            }
            None => None,
        }
    }

    /// Second look at `key` by a caller whose [`get`](Self::get) just missed.
    ///
    /// A live value is returned as a hit and the earlier miss is taken back,
    /// so one lookup never counts as both. Absent or expired counts nothing.
    pub(crate) fn recheck(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        let value = self
            .entries
            .lock()
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value.clone())?;

        self.hits.fetch_add(1, Ordering::Relaxed);
        let _ = self
            .misses
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |m| Some(m.saturating_sub(1)));
        crate::metrics::record_tier_lookup(&self.name, "hit");
        Some(value)
    }

    /// Live value for `key` without touching recency or hit counters.
    #[must_use]
    pub fn peek(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        self.entries
            .lock()
            .peek(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value.clone())
    }

    /// Liveness check without touching recency.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        let now = Instant::now();
        self.entries
            .lock()
            .peek(key)
            .is_some_and(|entry| entry.is_live(now))
    }

    /// Expiry of the live entry for `key`, without touching recency.
    #[must_use]
    pub fn expires_at(&self, key: &str) -> Option<Instant> {
        let now = Instant::now();
        self.entries
            .lock()
            .peek(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.expires_at)
    }

    /// Drop `key`. Returns whether a live entry was removed.
    pub fn remove(&self, key: &str) -> bool {
        let now = Instant::now();
        let (removed, resident) = {
            let mut entries = self.entries.lock();
            let removed = entries.pop(key);
            (removed, entries.len())
        };
        crate::metrics::set_tier_entries(&self.name, resident);
        removed.is_some_and(|entry| entry.is_live(now))
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
        crate::metrics::set_tier_entries(&self.name, 0);
    }

    /// Reclaim every expired entry. Returns how many were dropped.
    ///
    /// Visibility does not depend on this having run.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let (purged, resident) = {
            let mut entries = self.entries.lock();
            let stale: Vec<String> = entries
                .iter()
                .filter(|(_, entry)| !entry.is_live(now))
                .map(|(key, _)| key.clone())
                .collect();
            for key in &stale {
                entries.pop(key.as_str());
            }
            (stale.len(), entries.len())
        };

        if purged > 0 {
            self.expired.fetch_add(purged as u64, Ordering::Relaxed);
            crate::metrics::record_expired(&self.name, purged);
            crate::metrics::set_tier_entries(&self.name, resident);
        }
        purged
    }

    /// Resident entries, including expired ones not yet reclaimed.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    #[must_use]
    pub fn stats(&self) -> TierStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        TierStats {
            name: self.name.to_string(),
            capacity: self.capacity.get(),
            ttl: self.ttl,
            entries: self.len(),
            hits,
            misses,
            expired: self.expired.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            hit_rate: if total > 0 { hits as f64 / total as f64 } else { 0.0 },
        }
    }
}

impl<V> std::fmt::Debug for CacheTier<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheTier")
            .field("name", &self.name)
            .field("capacity", &self.capacity)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}
