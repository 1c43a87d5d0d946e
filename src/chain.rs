// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Ordered tier chain plus the authoritative source behind it.

use std::sync::Arc;

use tracing::debug;

use crate::config::CacheConfig;
use crate::error::CacheError;
use crate::source::DataSource;
use crate::tier::CacheTier;

/// Tiers ordered fastest first, backed by a [`DataSource`].
///
/// Tiers are shared (`Arc`) so the same instances can be handed to a
/// sweeper or inspected by the embedding process.
pub struct TierChain<V> {
    tiers: Vec<Arc<CacheTier<V>>>,
    source: Arc<dyn DataSource<V>>,
}

impl<V> TierChain<V> {
    /// Assemble a chain from already-built tiers.
    pub fn new(
        tiers: Vec<Arc<CacheTier<V>>>,
        source: Arc<dyn DataSource<V>>,
    ) -> Result<Self, CacheError> {
        if tiers.is_empty() {
            return Err(CacheError::InvalidConfig("at least one tier is required".into()));
        }
        Ok(Self { tiers, source })
    }

    #[must_use]
    pub fn tiers(&self) -> &[Arc<CacheTier<V>>] {
        &self.tiers
    }

    #[must_use]
    pub fn tier(&self, index: usize) -> Option<&Arc<CacheTier<V>>> {
        self.tiers.get(index)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tiers.len()
    }

    /// Always false; a chain has at least one tier.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }

    #[must_use]
    pub fn source(&self) -> &Arc<dyn DataSource<V>> {
        &self.source
    }
}

impl<V: Clone> TierChain<V> {
    /// Build every tier described by `config`.
    pub fn from_config(
        config: &CacheConfig,
        source: Arc<dyn DataSource<V>>,
    ) -> Result<Self, CacheError> {
        config.validate()?;
        let tiers = config
            .tiers
            .iter()
            .map(|tier| CacheTier::new(tier).map(Arc::new))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(tiers, source)
    }

    /// First live hit walking fastest to slowest, with its tier index.
    pub fn probe(&self, key: &str) -> Option<(usize, V)> {
        self.tiers.iter().enumerate().find_map(|(index, tier)| {
            let hit = tier.get(key);
            let outcome = if hit.is_some() { "hit" } else { "miss" };
            crate::metrics::record_tier_lookup(tier.name(), outcome);
            hit.map(|value| (index, value))
        })
    }

    /// Warm every tier faster than `hit_index`. The hit tier and slower
    /// tiers keep their existing expiry.
    pub fn write_back(&self, key: &str, value: &V, hit_index: usize) {
        for tier in &self.tiers[..hit_index.min(self.tiers.len())] {
            tier.set(key, value.clone());
            crate::metrics::record_write_back(tier.name());
            debug!(tier = %tier.name(), key, "Write-back");
        }
    }

    /// Write a freshly fetched value into every tier.
    pub fn populate(&self, key: &str, value: &V) {
        for tier in &self.tiers {
            tier.set(key, value.clone());
        }
    }

    /// Remove `key` from every tier. True if any tier held a live entry.
    pub fn remove(&self, key: &str) -> bool {
        self.tiers
            .iter()
            .fold(false, |found, tier| tier.remove(key) | found)
    }

    pub fn clear(&self) {
        for tier in &self.tiers {
            tier.clear();
        }
    }

    /// Reclaim expired entries in every tier.
    pub fn purge_expired(&self) -> usize {
        self.tiers.iter().map(|tier| tier.purge_expired()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TierConfig;
    use crate::error::SourceError;
    use crate::source::source_fn;

    fn chain() -> TierChain<String> {
        let config = CacheConfig {
            tiers: vec![
                TierConfig::new("l1", 10, 1_000),
                TierConfig::new("l2", 10, 2_000),
                TierConfig::new("l3", 10, 3_000),
            ],
            ..Default::default()
        };
        let source = Arc::new(source_fn(|key: String| async move { Ok::<_, SourceError>(key) }));
        TierChain::from_config(&config, source).unwrap()
    }

    #[test]
    fn test_new_rejects_empty_chain() {
        let source: Arc<dyn DataSource<u8>> =
            Arc::new(source_fn(|_k: String| async { Ok::<_, SourceError>(0u8) }));
        assert!(TierChain::new(vec![], source).is_err());
    }

    // Accessors are usable without a `Clone` bound on the value type.
    fn tier_names<V>(chain: &TierChain<V>) -> Vec<String> {
        chain.tiers().iter().map(|t| t.name().to_string()).collect()
    }

    #[test]
    fn test_accessors_need_no_clone_bound() {
        let chain = chain();
        assert_eq!(tier_names(&chain), vec!["l1", "l2", "l3"]);
        assert!(chain.tier(3).is_none());
    }

    #[test]
    fn test_from_config_builds_tiers_in_order() {
        let chain = chain();
        assert_eq!(chain.len(), 3);
        let names: Vec<_> = chain.tiers().iter().map(|t| t.name().to_string()).collect();
        assert_eq!(names, ["l1", "l2", "l3"]);
    }

    #[test]
    fn test_probe_returns_fastest_hit() {
        let chain = chain();
        chain.tiers()[2].set("k", "slow".into());
        chain.tiers()[1].set("k", "mid".into());

        assert_eq!(chain.probe("k"), Some((1, "mid".to_string())));
        assert_eq!(chain.probe("missing"), None);
    }

    #[test]
    fn test_write_back_only_touches_faster_tiers() {
        let chain = chain();
        chain.tiers()[2].set("k", "v".into());
        let slow_expiry = chain.tiers()[2].expires_at("k");

        chain.write_back("k", &"v".to_string(), 2);

        assert!(chain.tiers()[0].contains("k"));
        assert!(chain.tiers()[1].contains("k"));
        assert_eq!(chain.tiers()[2].expires_at("k"), slow_expiry);
        assert_eq!(chain.tiers()[2].stats().writes, 1);
    }

    #[test]
    fn test_populate_and_remove() {
        let chain = chain();
        chain.populate("k", &"v".to_string());
        assert!(chain.tiers().iter().all(|t| t.contains("k")));

        assert!(chain.remove("k"));
        assert!(chain.tiers().iter().all(|t| !t.contains("k")));
        assert!(!chain.remove("k"));
    }
}
