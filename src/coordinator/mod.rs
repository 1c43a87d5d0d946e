// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Read-through coordinator.
//!
//! The [`TieredCache`] walks its [`TierChain`] fastest first:
//!
//! ```text
//! get_data(key)
//!   │
//!   ▼
//! CHECKING_TIER[0] ── hit ───────────────────────────────► DONE (Tier(0))
//!   │ miss
//!   ▼
//! CHECKING_TIER[i] ── hit → write back into tiers 0..i ──► DONE (Tier(i))
//!   │ miss (all tiers)
//!   ▼
//! FETCHING_SOURCE ── ok → populate every tier ───────────► DONE (Source/Joined)
//!   │
//!   └── error → no tier written ─────────────────────────► SourceUnavailable
//! ```
//!
//! Write-back never touches the tier that hit or anything slower, so read
//! traffic alone cannot keep a far-tier entry alive past its TTL.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tiered_cache::{source_fn, CacheConfig, SourceError, TieredCache, ServedBy};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), tiered_cache::CacheError> {
//! let db = Arc::new(source_fn(|key: String| async move {
//!     Ok::<_, SourceError>(format!("Data for {}", key))
//! }));
//! let cache = TieredCache::from_config(&CacheConfig::default(), db)?;
//!
//! let first = cache.lookup("key1").await?;
//! assert_eq!(first.served_by, ServedBy::Source);
//!
//! let second = cache.lookup("key1").await?;
//! assert_eq!(second.served_by, ServedBy::Tier(0));
//! # Ok(())
//! # }
//! ```

mod api;
mod inflight;
mod types;

pub use types::{CacheStats, Lookup, ServedBy};

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tracing::debug;

use crate::chain::TierChain;
use crate::config::CacheConfig;
use crate::error::CacheError;
use crate::source::DataSource;

use inflight::{InFlight, Ticket};

/// Multi-tier read-through cache.
///
/// # Thread Safety
///
/// `Send + Sync`; share it behind an `Arc`. Each tier locks only itself and
/// the in-flight registry is sharded, so unrelated keys do not serialize.
/// Source fetches run on spawned tokio tasks, so lookups must happen inside
/// a tokio runtime.
pub struct TieredCache<V> {
    chain: Arc<TierChain<V>>,
    in_flight: InFlight<V>,
    source_fetches: AtomicU64,
    coalesced: AtomicU64,
    abandoned: AtomicU64,
}

impl<V> TieredCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Wrap an assembled chain.
    pub fn new(chain: TierChain<V>) -> Self {
        Self {
            chain: Arc::new(chain),
            in_flight: InFlight::new(),
            source_fetches: AtomicU64::new(0),
            coalesced: AtomicU64::new(0),
            abandoned: AtomicU64::new(0),
        }
    }

    /// Build the chain described by `config` in front of `source`.
    pub fn from_config(
        config: &CacheConfig,
        source: Arc<dyn DataSource<V>>,
    ) -> Result<Self, CacheError> {
        Ok(Self::new(TierChain::from_config(config, source)?))
    }

    #[must_use]
    pub fn chain(&self) -> &Arc<TierChain<V>> {
        &self.chain
    }

    /// Value for `key`, fetching from the source on a full miss.
    ///
    /// Fails only if every tier misses and the source fails.
    pub async fn get_data(&self, key: &str) -> Result<V, CacheError> {
        self.lookup(key).await.map(Lookup::into_value)
    }

    /// Like [`get_data`](Self::get_data), also reporting who served the value.
    pub async fn lookup(&self, key: &str) -> Result<Lookup<V>, CacheError> {
        self.lookup_or_abandon(key, std::future::pending()).await
    }

    /// Core lookup. `abandon` resolves to the error this caller reports if it
    /// stops waiting on a source fetch; the fetch itself is unaffected.
    #[tracing::instrument(skip(self, abandon), fields(tier))]
    async fn lookup_or_abandon<A>(&self, key: &str, abandon: A) -> Result<Lookup<V>, CacheError>
    where
        A: Future<Output = CacheError>,
    {
        let start = Instant::now();

        // CHECKING_TIER[0..N]
        if let Some((index, value)) = self.chain.probe(key) {
            if index > 0 {
                self.chain.write_back(key, &value, index);
            }
            return Ok(self.finish(value, ServedBy::Tier(index), start));
        }

        // FETCHING_SOURCE
        let (fetch, served_by) = match self.in_flight.join_or_start(key, &self.chain) {
            Ticket::Ready(value) => return Ok(self.finish(value, ServedBy::Tier(0), start)),
            Ticket::Started(fetch) => {
                self.source_fetches.fetch_add(1, Ordering::Relaxed);
                debug!("All tiers missed, fetching from source");
                (fetch, ServedBy::Source)
            }
            Ticket::Joined(fetch) => {
                self.coalesced.fetch_add(1, Ordering::Relaxed);
                crate::metrics::record_coalesced();
                debug!("All tiers missed, joining in-flight fetch");
                (fetch, ServedBy::Joined)
            }
        };

        let result = tokio::select! {
            result = fetch => result,
            err = abandon => {
                self.abandoned.fetch_add(1, Ordering::Relaxed);
                crate::metrics::record_abandoned(match err {
                    CacheError::Timeout { .. } => "timeout",
                    _ => "cancelled",
                });
                debug!(error = %err, "Stopped waiting for source fetch");
                return Err(err);
            }
        };

        match result {
            Ok(value) => Ok(self.finish(value, served_by, start)),
            Err(e) => {
                tracing::Span::current().record("tier", "error");
                crate::metrics::record_lookup_latency("error", start.elapsed());
                Err(e)
            }
        }
    }

    fn finish(&self, value: V, served_by: ServedBy, start: Instant) -> Lookup<V> {
        let label = match served_by {
            ServedBy::Tier(index) => self.chain.tiers()[index].name(),
            ServedBy::Source | ServedBy::Joined => "source",
        };
        tracing::Span::current().record("tier", label);
        debug!(served_by = %served_by, "Lookup served");
        crate::metrics::record_lookup_latency(label, start.elapsed());
        Lookup { value, served_by }
    }
}

impl<V> std::fmt::Debug for TieredCache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TieredCache")
            .field("tiers", &self.chain.tiers())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TierConfig;
    use crate::error::SourceError;
    use crate::source::source_fn;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn config() -> CacheConfig {
        CacheConfig {
            tiers: vec![
                TierConfig::new("memory", 100, 3_000),
                TierConfig::new("third_party", 100, 5_000),
            ],
            sweep_interval_ms: 0,
        }
    }

    fn counting_cache() -> (TieredCache<String>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let source = Arc::new(source_fn(move |key: String| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<_, SourceError>(format!("Data for {}", key))
            }
        }));
        (TieredCache::from_config(&config(), source).unwrap(), calls)
    }

    #[tokio::test(start_paused = true)]
    async fn test_source_then_tier_zero() {
        let (cache, calls) = counting_cache();

        let first = cache.lookup("key1").await.unwrap();
        assert_eq!(first.value, "Data for key1");
        assert_eq!(first.served_by, ServedBy::Source);
        assert!(cache.chain().tiers().iter().all(|t| t.contains("key1")));

        let second = cache.lookup("key1").await.unwrap();
        assert_eq!(second.served_by, ServedBy::Tier(0));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_far_tier_hit_writes_back_only_faster_tiers() {
        let (cache, calls) = counting_cache();
        let far = &cache.chain().tiers()[1];
        far.set("key1", "far value".into());
        let far_expiry = far.expires_at("key1");

        tokio::time::advance(Duration::from_secs(1)).await;
        let hit = cache.lookup("key1").await.unwrap();

        assert_eq!(hit.served_by, ServedBy::Tier(1));
        assert_eq!(hit.value, "far value");
        assert_eq!(cache.chain().tiers()[0].peek("key1").as_deref(), Some("far value"));
        assert_eq!(far.expires_at("key1"), far_expiry);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_source_error_writes_nothing() {
        let source = Arc::new(source_fn(|_key: String| async move {
            Err::<String, _>(SourceError::failed("db offline"))
        }));
        let cache = TieredCache::from_config(&config(), source).unwrap();

        let err = cache.get_data("key1").await.unwrap_err();
        assert!(matches!(err, CacheError::SourceUnavailable { ref key, .. } if key == "key1"));
        assert!(cache.chain().tiers().iter().all(|t| t.is_empty()));
        assert_eq!(cache.stats().source_failures, 1);
    }

    // No `Clone` bound here: Debug must not require one.
    fn describe<V>(cache: &TieredCache<V>) -> String {
        format!("{:?}", cache)
    }

    #[test]
    fn test_debug_lists_tiers() {
        let (cache, _) = counting_cache();
        let text = describe(&cache);
        assert!(text.starts_with("TieredCache"));
        assert!(text.contains("memory"));
        assert!(text.contains("third_party"));
    }

    #[tokio::test]
    async fn test_get_data_returns_value() {
        let (cache, _) = counting_cache();
        assert_eq!(cache.get_data("abc").await.unwrap(), "Data for abc");
    }
}
