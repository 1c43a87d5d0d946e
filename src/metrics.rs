// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Metrics instrumentation for the tiered cache.
//!
//! Uses the `metrics` crate for backend-agnostic metrics collection.
//! The embedding process is responsible for choosing the exporter.
//!
//! # Metric Naming Convention
//! - `tiered_cache_` prefix for all metrics
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Labels
//! - `tier`: configured tier name, or `source`
//! - `outcome`: hit, miss, expired, success, error

use metrics::{counter, gauge, histogram};
use std::time::Duration;

/// Record a tier probe
pub fn record_tier_lookup(tier: &str, outcome: &str) {
    counter!(
        "tiered_cache_tier_lookups_total",
        "tier" => tier.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Record end-to-end lookup latency, labelled by who served it
pub fn record_lookup_latency(served_by: &str, duration: Duration) {
    histogram!(
        "tiered_cache_lookup_seconds",
        "served_by" => served_by.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Record a source fetch
pub fn record_source_fetch(outcome: &str, duration: Duration) {
    counter!(
        "tiered_cache_source_fetches_total",
        "outcome" => outcome.to_string()
    )
    .increment(1);
    histogram!("tiered_cache_source_fetch_seconds").record(duration.as_secs_f64());
}

/// Record a caller that joined an in-flight fetch instead of starting one
pub fn record_coalesced() {
    counter!("tiered_cache_coalesced_waiters_total").increment(1);
}

/// Record a waiter that gave up (timeout or cancellation)
pub fn record_abandoned(reason: &str) {
    counter!(
        "tiered_cache_abandoned_waiters_total",
        "reason" => reason.to_string()
    )
    .increment(1);
}

/// Record a write-back into a faster tier
pub fn record_write_back(tier: &str) {
    counter!(
        "tiered_cache_write_backs_total",
        "tier" => tier.to_string()
    )
    .increment(1);
}

/// Record a capacity eviction
pub fn record_eviction(tier: &str) {
    counter!(
        "tiered_cache_evictions_total",
        "tier" => tier.to_string()
    )
    .increment(1);
}

/// Record expired entries reclaimed (lazily or by the sweeper)
pub fn record_expired(tier: &str, count: usize) {
    counter!(
        "tiered_cache_expired_total",
        "tier" => tier.to_string()
    )
    .increment(count as u64);
}

/// Set resident entry count for a tier
pub fn set_tier_entries(tier: &str, count: usize) {
    gauge!(
        "tiered_cache_tier_entries",
        "tier" => tier.to_string()
    )
    .set(count as f64);
}

/// Set number of keys with a pending source fetch
pub fn set_in_flight(count: usize) {
    gauge!("tiered_cache_in_flight_fetches").set(count as f64);
}

/// Record a source retry attempt
pub fn record_source_retry(attempt: usize) {
    counter!("tiered_cache_source_retries_total").increment(1);
    histogram!("tiered_cache_source_retry_attempt").record(attempt as f64);
}

#[cfg(test)]
mod tests {
    use super::*;

    // Without an installed recorder these are no-ops; they must not panic.
    #[test]
    fn test_metrics_without_recorder() {
        record_tier_lookup("memory", "hit");
        record_lookup_latency("source", Duration::from_millis(5));
        record_source_fetch("success", Duration::from_millis(5));
        record_coalesced();
        record_abandoned("timeout");
        record_write_back("memory");
        record_eviction("memory");
        record_expired("memory", 3);
        set_tier_entries("memory", 10);
        set_in_flight(0);
        record_source_retry(1);
    }
}
