// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Operations layered over the core lookup:
//! - `get_data_with_timeout()` / `get_data_until()` - per-waiter give-up
//! - `get_many()` - concurrent batch lookup
//! - `insert()` / `invalidate()` / `clear()` - explicit writes
//! - `stats()` / `in_flight()` - introspection
//! - `spawn_sweeper()` - background expiry

use std::future::Future;
use std::sync::atomic::Ordering;
use std::time::Duration;

use futures::future::join_all;
use tracing::{debug, info};

use crate::error::CacheError;
use crate::sweeper::Sweeper;

use super::{CacheStats, TieredCache};

impl<V> TieredCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Like [`get_data`](Self::get_data), but this caller stops waiting for a
    /// source fetch after `timeout`.
    ///
    /// The fetch keeps running and still populates the tiers, so other
    /// waiters and later callers are unaffected. Tier hits are never subject
    /// to the timeout.
    pub async fn get_data_with_timeout(
        &self,
        key: &str,
        timeout: Duration,
    ) -> Result<V, CacheError> {
        let owned = key.to_string();
        let abandon = async move {
            tokio::time::sleep(timeout).await;
            CacheError::Timeout { key: owned, after: timeout }
        };
        self.lookup_or_abandon(key, abandon).await.map(|found| found.value)
    }

    /// Like [`get_data`](Self::get_data), but this caller stops waiting with
    /// [`CacheError::Cancelled`] once `cancel` resolves.
    ///
    /// ```rust,no_run
    /// # use tiered_cache::TieredCache;
    /// # async fn example(cache: &TieredCache<String>) {
    /// let (tx, rx) = tokio::sync::oneshot::channel::<()>();
    /// let lookup = cache.get_data_until("slow", async { let _ = rx.await; });
    /// drop(tx); // cancels this waiter only
    /// assert!(lookup.await.is_err());
    /// # }
    /// ```
    pub async fn get_data_until<C>(&self, key: &str, cancel: C) -> Result<V, CacheError>
    where
        C: Future<Output = ()>,
    {
        let owned = key.to_string();
        let abandon = async move {
            cancel.await;
            CacheError::Cancelled { key: owned }
        };
        self.lookup_or_abandon(key, abandon).await.map(|found| found.value)
    }

    /// Look up several keys concurrently. Results come back in input order;
    /// duplicate keys share a single source fetch.
    pub async fn get_many(&self, keys: &[&str]) -> Vec<Result<V, CacheError>> {
        debug!(count = keys.len(), "Batch lookup");
        join_all(keys.iter().map(|key| self.get_data(key))).await
    }

    /// Write `value` into every tier with a fresh expiry, bypassing the source.
    pub fn insert(&self, key: &str, value: V) {
        self.chain.populate(key, &value);
    }

    /// Remove `key` from every tier. Returns true if any tier held a live entry.
    ///
    /// A fetch already in flight for `key` is not affected and will repopulate
    /// the tiers when it completes.
    pub fn invalidate(&self, key: &str) -> bool {
        let removed = self.chain.remove(key);
        debug!(key, removed, "Invalidated");
        removed
    }

    /// Empty every tier. Counters are kept.
    pub fn clear(&self) {
        self.chain.clear();
        info!(tiers = self.chain.len(), "Cache cleared");
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            tiers: self.chain.tiers().iter().map(|tier| tier.stats()).collect(),
            source_fetches: self.source_fetches.load(Ordering::Relaxed),
            source_failures: self.in_flight.failures(),
            coalesced: self.coalesced.load(Ordering::Relaxed),
            abandoned: self.abandoned.load(Ordering::Relaxed),
            in_flight: self.in_flight.len(),
        }
    }

    /// Keys with a source fetch currently pending.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// True if a source fetch for `key` is pending.
    #[must_use]
    pub fn is_fetching(&self, key: &str) -> bool {
        self.in_flight.contains(key)
    }

    /// Start a background task purging expired entries every `interval`.
    ///
    /// Expiry is enforced on read regardless; the sweeper only reclaims
    /// memory held by entries nobody asks for again.
    pub fn spawn_sweeper(&self, interval: Duration) -> Sweeper {
        Sweeper::spawn(self.chain.clone(), interval)
    }
}
