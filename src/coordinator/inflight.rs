// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Per-key registry of pending source fetches.
//!
//! The first caller to miss on a key spawns the fetch and registers a
//! shared handle to its result; later callers clone the handle. The fetch
//! runs in its own task, so a waiter that times out or is dropped never
//! cancels it for the others. The registry slot is released only after the
//! fetch has written its value into the tiers.
//!
//! ```text
//!   miss ──► registry.entry(key)
//!              │
//!              ├─ occupied → clone shared handle        (Joined)
//!              │
//!              └─ vacant ──► tier 0 re-check ── hit →    (Tier(0))
//!                               │
//!                               └─ spawn fetch, insert   (Source)
//!                                    │
//!                                    ▼
//!                          source.lookup → populate tiers → release slot
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use tokio::sync::oneshot;
use tracing::{debug, warn, Instrument};

use crate::chain::TierChain;
use crate::error::{CacheError, SourceError};

pub(super) type SharedFetch<V> = Shared<BoxFuture<'static, Result<V, CacheError>>>;

struct Pending<V> {
    id: u64,
    fetch: SharedFetch<V>,
}

/// How a missing caller should proceed.
pub(super) enum Ticket<V> {
    /// Caller started a new fetch
    Started(SharedFetch<V>),
    /// Caller attached to an existing fetch
    Joined(SharedFetch<V>),
    /// A fetch finished between the tier walk and the registry check
    Ready(V),
}

pub(super) struct InFlight<V> {
    pending: Arc<DashMap<String, Pending<V>>>,
    next_id: AtomicU64,
    /// Failed fetches, counted once per fetch whether or not anyone waits
    failures: Arc<AtomicU64>,
}

/// Releases a registry slot when the fetch task ends, including by panic.
struct Release<V> {
    pending: Arc<DashMap<String, Pending<V>>>,
    key: String,
    id: u64,
}

impl<V> Drop for Release<V> {
    fn drop(&mut self) {
        // Only our own slot; a later fetch for the same key has a new id.
        self.pending.remove_if(&self.key, |_, pending| pending.id == self.id);
        crate::metrics::set_in_flight(self.pending.len());
    }
}

impl<V> InFlight<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub(super) fn new() -> Self {
        Self {
            pending: Arc::new(DashMap::new()),
            next_id: AtomicU64::new(0),
            failures: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Attach to the pending fetch for `key`, or start one.
    ///
    /// The check-and-insert happens under the registry shard lock, so two
    /// concurrent misses can never both start a fetch. The task is spawned
    /// after the lock is dropped.
    pub(super) fn join_or_start(&self, key: &str, chain: &Arc<TierChain<V>>) -> Ticket<V> {
        let (id, tx, fetch) = match self.pending.entry(key.to_string()) {
            Entry::Occupied(slot) => return Ticket::Joined(slot.get().fetch.clone()),
            Entry::Vacant(slot) => {
                // A fetch that completed after our tier walk populated every
                // tier before releasing its slot; tier 0 is enough to tell.
                if let Some(value) = chain.tiers()[0].recheck(key) {
                    return Ticket::Ready(value);
                }

                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                let (tx, rx) = oneshot::channel();
                let owned_key = key.to_string();
                let fetch = rx
                    .map(move |received| {
                        received.unwrap_or_else(|_| {
                            Err(CacheError::source_unavailable(
                                &owned_key,
                                SourceError::aborted("fetch task ended without a result"),
                            ))
                        })
                    })
                    .boxed()
                    .shared();

                slot.insert(Pending { id, fetch: fetch.clone() });
                (id, tx, fetch)
            }
        };
        crate::metrics::set_in_flight(self.pending.len());

        let release = Release {
            pending: self.pending.clone(),
            key: key.to_string(),
            id,
        };
        let chain = chain.clone();
        let failures = self.failures.clone();
        let owned_key = key.to_string();
        let span = tracing::debug_span!("source_fetch", key, id);
        tokio::spawn(
            async move {
                let result = fetch_and_populate(chain, owned_key, release, &failures).await;
                // Every waiter may have given up already
                let _ = tx.send(result);
            }
            .instrument(span),
        );

        Ticket::Started(fetch)
    }

    /// Keys with a fetch currently pending.
    pub(super) fn len(&self) -> usize {
        self.pending.len()
    }

    pub(super) fn contains(&self, key: &str) -> bool {
        self.pending.contains_key(key)
    }

    /// Source fetches that completed with an error.
    pub(super) fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}

/// Body of the spawned fetch task. `release` drops after the tiers are
/// written, so a caller that finds the slot empty will find the value.
/// If the task dies first, dropping `release` and the result sender still
/// frees the slot and fails every waiter with an aborted error.
async fn fetch_and_populate<V>(
    chain: Arc<TierChain<V>>,
    key: String,
    release: Release<V>,
    failures: &AtomicU64,
) -> Result<V, CacheError>
where
    V: Clone + Send + Sync + 'static,
{
    let start = Instant::now();
    let result = chain.source().lookup(&key).await;
    let elapsed = start.elapsed();

    let result = match result {
        Ok(value) => {
            chain.populate(&key, &value);
            debug!(
                elapsed_ms = elapsed.as_millis() as u64,
                "Source fetch populated all tiers"
            );
            crate::metrics::record_source_fetch("success", elapsed);
            Ok(value)
        }
        Err(e) => {
            failures.fetch_add(1, Ordering::Relaxed);
            warn!(error = %e, "Source fetch failed; no tier written");
            crate::metrics::record_source_fetch("error", elapsed);
            Err(CacheError::source_unavailable(&key, e))
        }
    };

    drop(release);
    result
}
