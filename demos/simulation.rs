// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Two-tier read-through simulation.
//!
//! Replays six requests for one key against a memory tier (3s TTL) in
//! front of a simulated third-party tier (5s TTL) and a database:
//!
//! | t   | request | served by                 |
//! |-----|---------|---------------------------|
//! | 0s  | 1       | database (fills both)     |
//! | 0s  | 2       | memory                    |
//! | 3s  | 3       | third party (warms memory)|
//! | 3s  | 4       | memory                    |
//! | 5s  | 5       | memory                    |
//! | 6s  | 6       | database                  |
//!
//! # Run
//!
//! ```bash
//! RUST_LOG=tiered_cache=debug cargo run --example simulation
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};
use tiered_cache::{
    source_fn, CacheConfig, CacheError, ServedBy, SourceError, TierConfig, TieredCache,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .map_err(|_| "failed to install metrics recorder")?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    println!("\n╔═══════════════════════════════════════════════════════════════╗");
    println!("║           tiered-cache: Read-through Simulation               ║");
    println!("╚═══════════════════════════════════════════════════════════════╝\n");

    let config = CacheConfig {
        tiers: vec![
            TierConfig::new("memory", 100, 3_000),
            TierConfig::new("third_party", 100, 5_000),
        ],
        // Lazy expiry only, so every transition below happens on read
        sweep_interval_ms: 0,
    };

    // Simulated database query
    let db = Arc::new(source_fn(|key: String| async move {
        Ok::<_, SourceError>(format!("Data for {}", key))
    }));
    let cache = TieredCache::from_config(&config, db)?;

    let start = Instant::now();

    request(&cache, 1, start).await?;
    request(&cache, 2, start).await?;

    println!("   ⏳ sleeping 3s: memory expires, third party still valid for 2 more seconds");
    tokio::time::sleep(Duration::from_secs(3)).await;
    request(&cache, 3, start).await?;
    request(&cache, 4, start).await?;

    println!("   ⏳ sleeping 2s: third party expires, memory still valid for 1 more second");
    tokio::time::sleep(Duration::from_secs(2)).await;
    request(&cache, 5, start).await?;

    println!("   ⏳ sleeping 1s: both tiers expired");
    tokio::time::sleep(Duration::from_secs(1)).await;
    request(&cache, 6, start).await?;

    let stats = cache.stats();
    println!("\n📊 Cache stats");
    println!("   source fetches: {}", stats.source_fetches);
    for tier in &stats.tiers {
        println!(
            "   {:<12} hits={} misses={} expired={} hit_rate={:.2}",
            tier.name, tier.hits, tier.misses, tier.expired, tier.hit_rate
        );
    }

    println!("\n📈 Metrics");
    dump_metrics(&snapshotter);
    Ok(())
}

async fn request(cache: &TieredCache<String>, n: usize, start: Instant) -> Result<(), CacheError> {
    let found = cache.lookup("key1").await?;
    let origin = match found.served_by {
        ServedBy::Tier(index) => format!("{} cache", cache.chain().tiers()[index].name()),
        ServedBy::Source | ServedBy::Joined => "database".to_string(),
    };
    println!(
        "   [{:>4.1}s] request {} → {:<20} ({})",
        start.elapsed().as_secs_f64(),
        n,
        origin,
        found.value
    );
    Ok(())
}

fn dump_metrics(snapshotter: &Snapshotter) {
    let mut lines: Vec<String> = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .map(|(composite_key, _, _, value)| {
            let (_, key) = composite_key.into_parts();
            let labels: Vec<_> = key
                .labels()
                .map(|l| format!("{}={}", l.key(), l.value()))
                .collect();
            let label_str = if labels.is_empty() {
                String::new()
            } else {
                format!("{{{}}}", labels.join(","))
            };
            let rendered = match value {
                DebugValue::Counter(v) => v.to_string(),
                DebugValue::Gauge(v) => format!("{:.2}", v.into_inner()),
                DebugValue::Histogram(samples) => format!("{} samples", samples.len()),
            };
            format!("{}{} = {}", key.name(), label_str, rendered)
        })
        .collect();
    lines.sort();

    if lines.is_empty() {
        println!("   └─ (no metrics recorded)");
    }
    for line in lines {
        println!("   └─ {}", line);
    }
}
