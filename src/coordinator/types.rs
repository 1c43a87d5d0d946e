// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Public types for the cache coordinator.

use crate::tier::TierStats;

/// Who satisfied a lookup. Purely diagnostic; never affects control flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServedBy {
    /// Live hit in the tier at this index (0 = fastest)
    Tier(usize),
    /// This caller triggered the source fetch
    Source,
    /// This caller attached to a fetch another caller had already started
    Joined,
}

impl ServedBy {
    #[must_use]
    pub fn is_tier_hit(&self) -> bool {
        matches!(self, Self::Tier(_))
    }

    /// True when the value came from the source, by this or another caller.
    #[must_use]
    pub fn is_source(&self) -> bool {
        matches!(self, Self::Source | Self::Joined)
    }
}

impl std::fmt::Display for ServedBy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tier(index) => write!(f, "Tier({})", index),
            Self::Source => write!(f, "Source"),
            Self::Joined => write!(f, "Joined"),
        }
    }
}

/// A value together with where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lookup<V> {
    pub value: V,
    pub served_by: ServedBy,
}

impl<V> Lookup<V> {
    #[must_use]
    pub fn into_value(self) -> V {
        self.value
    }
}

/// Point-in-time snapshot of the whole cache.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheStats {
    /// Per-tier counters, fastest first
    pub tiers: Vec<TierStats>,
    /// Source invocations started
    pub source_fetches: u64,
    /// Source invocations that ended in an error
    pub source_failures: u64,
    /// Callers that attached to an in-flight fetch
    pub coalesced: u64,
    /// Callers that stopped waiting (timeout or cancellation)
    pub abandoned: u64,
    /// Keys with a fetch currently pending
    pub in_flight: usize,
}
