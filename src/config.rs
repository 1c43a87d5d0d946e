// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Configuration for the tiered cache.
//!
//! # Example
//!
//! ```
//! use tiered_cache::{CacheConfig, TierConfig};
//!
//! // Defaults: a 3s in-memory tier in front of a 5s far tier
//! let config = CacheConfig::default();
//! assert_eq!(config.tiers.len(), 2);
//! assert_eq!(config.tiers[0].ttl_ms, 3_000);
//!
//! // Custom chain
//! let config = CacheConfig {
//!     tiers: vec![
//!         TierConfig::new("memory", 1_000, 500),
//!         TierConfig::new("redis", 100_000, 60_000),
//!     ],
//!     sweep_interval_ms: 0, // lazy expiry only
//! };
//! assert!(config.validate().is_ok());
//! ```

use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::error::CacheError;

/// One tier of the chain.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct TierConfig {
    /// Label used in logs and metrics (e.g., "memory", "redis")
    pub name: String,

    /// Maximum resident entries (default: 100)
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    /// Time-to-live applied to every entry written to this tier
    pub ttl_ms: u64,
}

impl TierConfig {
    #[must_use]
    pub fn new(name: impl Into<String>, capacity: usize, ttl_ms: u64) -> Self {
        Self {
            name: name.into(),
            capacity,
            ttl_ms,
        }
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }
}

/// Configuration for a [`TieredCache`](crate::TieredCache).
///
/// Tiers are ordered fastest first. Non-decreasing TTLs are recommended but
/// not enforced; a misordered chain only loses effectiveness.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Tier chain, index 0 = fastest / shortest-lived
    #[serde(default = "default_tiers")]
    pub tiers: Vec<TierConfig>,

    /// Background expiry sweep interval (0 = lazy expiry only)
    #[serde(default = "default_sweep_interval_ms")]
    pub sweep_interval_ms: u64,
}

fn default_capacity() -> usize { 100 }
fn default_sweep_interval_ms() -> u64 { 1_000 }
fn default_tiers() -> Vec<TierConfig> {
    vec![
        TierConfig::new("memory", 100, 3_000),
        TierConfig::new("third_party", 100, 5_000),
    ]
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            tiers: default_tiers(),
            sweep_interval_ms: default_sweep_interval_ms(),
        }
    }
}

impl CacheConfig {
    /// Parse from a JSON document; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, CacheError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| CacheError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Sweep interval, or `None` when the sweeper is disabled.
    #[must_use]
    pub fn sweep_interval(&self) -> Option<Duration> {
        (self.sweep_interval_ms > 0).then(|| Duration::from_millis(self.sweep_interval_ms))
    }

    /// Reject chains that cannot hold anything.
    pub fn validate(&self) -> Result<(), CacheError> {
        if self.tiers.is_empty() {
            return Err(CacheError::InvalidConfig("at least one tier is required".into()));
        }
        for tier in &self.tiers {
            if tier.capacity == 0 {
                return Err(CacheError::InvalidConfig(format!(
                    "tier '{}' has zero capacity",
                    tier.name
                )));
            }
            if tier.ttl_ms == 0 {
                return Err(CacheError::InvalidConfig(format!(
                    "tier '{}' has zero ttl",
                    tier.name
                )));
            }
        }

        for pair in self.tiers.windows(2) {
            if pair[1].ttl_ms < pair[0].ttl_ms {
                warn!(
                    faster = %pair[0].name,
                    slower = %pair[1].name,
                    "Slower tier has a shorter ttl than the tier in front of it"
                );
            }
        }
        Ok(())
    }
}
