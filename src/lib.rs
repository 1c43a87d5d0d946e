// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! # Tiered Cache
//!
//! A multi-tier read-through cache in front of a slow authoritative source.
//!
//! ## Architecture
//!
//! Lookups walk an ordered chain of tiers, fastest first. Each tier has its
//! own TTL and LRU capacity:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Tier 0: e.g. in-process memory              │
//! │  • Short TTL, small capacity                               │
//! │  • Warmed on every deeper hit (write-back)                 │
//! └─────────────────────────────────────────────────────────────┘
//!                              │ miss
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Tier N: e.g. shared third-party cache       │
//! │  • Longer TTL                                              │
//! │  • Expiry NOT extended by reads                            │
//! └─────────────────────────────────────────────────────────────┘
//!                              │ miss
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Source: system of record                  │
//! │  • One fetch per key, shared by all concurrent misses      │
//! │  • Result written into every tier                          │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tiered_cache::{source_fn, CacheConfig, SourceError, TieredCache};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = CacheConfig::from_json(r#"{
//!         "tiers": [
//!             { "name": "memory", "capacity": 100, "ttl_ms": 3000 },
//!             { "name": "third_party", "capacity": 100, "ttl_ms": 5000 }
//!         ]
//!     }"#).expect("valid config");
//!
//!     let db = Arc::new(source_fn(|key: String| async move {
//!         tokio::time::sleep(Duration::from_millis(500)).await;
//!         Ok::<_, SourceError>(format!("Data for {}", key))
//!     }));
//!
//!     let cache = TieredCache::from_config(&config, db).expect("valid tiers");
//!     let sweeper = config.sweep_interval().map(|every| cache.spawn_sweeper(every));
//!
//!     let found = cache.lookup("key1").await.expect("source reachable");
//!     println!("{} (served by {})", found.value, found.served_by);
//!
//!     if let Some(sweeper) = sweeper {
//!         sweeper.shutdown().await;
//!     }
//! }
//! ```
//!
//! ## Features
//!
//! - **Per-tier TTL and LRU capacity**: expired entries are never served
//! - **Write-back**: a hit in a slower tier warms every faster tier
//! - **Request coalescing**: concurrent misses on a key share one source fetch
//! - **Per-waiter timeout/cancellation**: giving up never cancels the fetch
//! - **Background sweeper**: optional reclamation of expired entries
//! - **Retry Logic**: opt-in [`RetryingSource`] wrapper for transient failures
//!
//! ## Modules
//!
//! - [`coordinator`]: The [`TieredCache`] read-through orchestrator
//! - [`chain`]: Ordered tiers plus the source
//! - [`tier`]: A single TTL + LRU tier
//! - [`source`]: The [`DataSource`] contract
//! - [`sweeper`]: Background expiry
//! - [`resilience`]: Retry with backoff

pub mod chain;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod metrics;
pub mod resilience;
pub mod source;
pub mod sweeper;
pub mod tier;

pub use chain::TierChain;
pub use config::{CacheConfig, TierConfig};
pub use coordinator::{CacheStats, Lookup, ServedBy, TieredCache};
pub use error::{CacheError, SourceError, SourceErrorKind};
pub use resilience::{retry_source, RetryConfig, RetryingSource};
pub use source::{source_fn, DataSource, FnSource};
pub use sweeper::Sweeper;
pub use tier::{CacheEntry, CacheTier, TierStats};
