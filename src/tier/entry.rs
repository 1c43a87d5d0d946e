// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use std::time::Duration;
use tokio::time::Instant;

/// A value resident in one tier, with its absolute expiry.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    pub inserted_at: Instant,
    pub expires_at: Instant,
}

impl<V> CacheEntry<V> {
    /// Stamp a value inserted at `now` with `expires_at = now + ttl`.
    ///
    /// # Panics
    ///
    /// If the resulting expiry does not follow insertion. A zero TTL is
    /// rejected by config validation, so reaching this is a bug.
    pub fn new(value: V, now: Instant, ttl: Duration) -> Self {
        let expires_at = now + ttl;
        assert!(
            expires_at > now,
            "tier corruption: entry expiry {:?} does not follow insertion {:?}",
            expires_at,
            now
        );
        Self {
            value,
            inserted_at: now,
            expires_at,
        }
    }

    /// Visible iff `now < expires_at`.
    #[inline]
    #[must_use]
    pub fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }

    #[must_use]
    pub fn remaining(&self, now: Instant) -> Duration {
        self.expires_at.saturating_duration_since(now)
    }
}
