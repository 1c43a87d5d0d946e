//! Property-based tests for tier invariants.
//!
//! Drives single tiers with random operation sequences and checks them
//! against a simple reference model: capacity is never exceeded, the victim
//! is always the least recently used key, and reads never move an expiry.
//!
//! Run with: `cargo test --test proptest_fuzz`

use std::collections::VecDeque;
use std::time::Duration;

use proptest::prelude::*;

use tiered_cache::{CacheTier, TierConfig};

// =============================================================================
// Strategies for generating test data
// =============================================================================

#[derive(Debug, Clone)]
enum Op {
    Get(u8),
    Set(u8, u32),
    Remove(u8),
}

/// Operations over a small key space so hits, overwrites and evictions all happen
fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0u8..16).prop_map(Op::Get),
        4 => (0u8..16, any::<u32>()).prop_map(|(k, v)| Op::Set(k, v)),
        1 => (0u8..16).prop_map(Op::Remove),
    ]
}

fn key(k: u8) -> String {
    format!("key{}", k)
}

/// A tier whose TTL will not run out during a test
fn long_lived_tier(capacity: usize) -> CacheTier<u32> {
    CacheTier::new(&TierConfig::new("model", capacity, 3_600_000)).unwrap()
}

fn paused_runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()
        .unwrap()
}

// =============================================================================
// Reference model: recency list, least recent at the front
// =============================================================================

struct LruModel {
    capacity: usize,
    order: VecDeque<(String, u32)>,
}

impl LruModel {
    fn new(capacity: usize) -> Self {
        Self { capacity, order: VecDeque::new() }
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.order.iter().position(|(k, _)| k == key)
    }

    fn get(&mut self, key: &str) -> Option<u32> {
        let index = self.position(key)?;
        let entry = self.order.remove(index)?;
        let value = entry.1;
        self.order.push_back(entry);
        Some(value)
    }

    /// Returns the evicted key, if any
    fn set(&mut self, key: &str, value: u32) -> Option<String> {
        if let Some(index) = self.position(key) {
            self.order.remove(index);
            self.order.push_back((key.to_string(), value));
            return None;
        }
        let evicted = if self.order.len() == self.capacity {
            self.order.pop_front().map(|(k, _)| k)
        } else {
            None
        };
        self.order.push_back((key.to_string(), value));
        evicted
    }

    fn remove(&mut self, key: &str) -> bool {
        match self.position(key) {
            Some(index) => self.order.remove(index).is_some(),
            None => false,
        }
    }
}

// =============================================================================
// Capacity and LRU victim choice
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// Resident entries never exceed capacity, whatever the sequence
    #[test]
    fn capacity_is_never_exceeded(
        capacity in 1usize..8,
        ops in prop::collection::vec(op_strategy(), 0..200),
    ) {
        let tier = long_lived_tier(capacity);
        for op in ops {
            match op {
                Op::Get(k) => { tier.get(&key(k)); }
                Op::Set(k, v) => { tier.set(&key(k), v); }
                Op::Remove(k) => { tier.remove(&key(k)); }
            }
            prop_assert!(tier.len() <= capacity);
        }
    }

    /// The tier agrees with the LRU model on every value and every victim
    #[test]
    fn matches_lru_model(
        capacity in 1usize..6,
        ops in prop::collection::vec(op_strategy(), 0..200),
    ) {
        let tier = long_lived_tier(capacity);
        let mut model = LruModel::new(capacity);

        for op in ops {
            match op {
                Op::Get(k) => {
                    prop_assert_eq!(tier.get(&key(k)), model.get(&key(k)));
                }
                Op::Set(k, v) => {
                    prop_assert_eq!(tier.set(&key(k), v), model.set(&key(k), v));
                }
                Op::Remove(k) => {
                    prop_assert_eq!(tier.remove(&key(k)), model.remove(&key(k)));
                }
            }
        }

        prop_assert_eq!(tier.len(), model.order.len());
        for (k, v) in &model.order {
            prop_assert_eq!(tier.peek(k), Some(*v));
        }
    }

    /// Evictions reported in stats equal the number of displaced live keys
    #[test]
    fn eviction_count_matches_displacements(
        capacity in 1usize..6,
        keys in prop::collection::vec(0u8..32, 0..100),
    ) {
        let tier = long_lived_tier(capacity);
        let mut displaced = 0u64;
        for k in keys {
            if tier.set(&key(k), u32::from(k)).is_some() {
                displaced += 1;
            }
        }
        prop_assert_eq!(tier.stats().evictions, displaced);
    }
}

// =============================================================================
// Expiry
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Reading a key any number of times never pushes back its expiry
    #[test]
    fn reads_never_extend_ttl(
        ttl_ms in 10u64..5_000,
        reads in prop::collection::vec(0u64..100, 1..20),
    ) {
        paused_runtime().block_on(async {
            let tier = CacheTier::new(&TierConfig::new("ttl", 4, ttl_ms)).unwrap();
            tier.set("k", 7u32);
            let deadline = tier.expires_at("k").unwrap();

            for step in reads {
                let now = tokio::time::Instant::now();
                let jump = Duration::from_millis(step).min(deadline.saturating_duration_since(now));
                tokio::time::advance(jump).await;

                if tokio::time::Instant::now() < deadline {
                    assert_eq!(tier.get("k"), Some(7));
                    assert_eq!(tier.expires_at("k"), Some(deadline));
                } else {
                    assert_eq!(tier.get("k"), None);
                }
            }

            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            tokio::time::advance(remaining).await;
            assert_eq!(tier.get("k"), None);
        });
    }

    /// Whatever the mix of live and stale keys, a purge leaves only live ones
    #[test]
    fn purge_keeps_exactly_live_entries(
        ages in prop::collection::vec(0u64..200, 1..16),
    ) {
        paused_runtime().block_on(async {
            let ttl = Duration::from_millis(100);
            let tier = CacheTier::new(&TierConfig::new("purge", 64, 100)).unwrap();

            // Insert oldest first so every key has a known age at the end
            let mut sorted = ages.clone();
            sorted.sort_unstable_by(|a, b| b.cmp(a));
            let oldest = sorted[0];
            let mut elapsed = 0;
            for (i, age) in sorted.iter().enumerate() {
                let target = oldest - age;
                tokio::time::advance(Duration::from_millis(target - elapsed)).await;
                elapsed = target;
                tier.set(&format!("k{}", i), i as u32);
            }
            tokio::time::advance(Duration::from_millis(oldest - elapsed)).await;

            let stale = sorted.iter().filter(|age| Duration::from_millis(**age) >= ttl).count();
            assert_eq!(tier.purge_expired(), stale);
            assert_eq!(tier.len(), sorted.len() - stale);
        });
    }
}
