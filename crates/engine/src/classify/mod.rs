//! Best-effort classification of raw instance type descriptors.
//!
//! Adapters hand back VMs with raw capacity figures; the [`Classifier`] fills
//! in the network tier, the category and the attribute map. Classification
//! failures are logged and replaced by defaults, never propagated.

mod category;
mod network;

pub use category::{default_rules, CategoryMapper, CategoryRule};
pub use network::{default_ranges, parse_throughput, NetworkPerfMapper, ThresholdMapper, TierRange};

use std::sync::Arc;

use log::debug;

use crate::models::{Category, NetworkPerfTier, VmInfo};

/// Network tier applied when the raw string cannot be mapped.
pub const DEFAULT_NETWORK_TIER: NetworkPerfTier = NetworkPerfTier::Low;

/// Per-provider classification rules.
#[derive(Clone)]
pub struct Classifier {
    network: Arc<dyn NetworkPerfMapper>,
    category: CategoryMapper,
}

impl Classifier {
    pub fn new(network: Arc<dyn NetworkPerfMapper>, category: CategoryMapper) -> Self {
        Self { network, category }
    }

    /// Classify a VM in place.
    ///
    /// - a non-empty raw network string is mapped; on failure the tier falls back
    ///   to [`DEFAULT_NETWORK_TIER`]
    /// - an `Unknown` category is mapped from the instance type id; on failure it stays `Unknown`
    /// - the attribute map is always rebuilt
    pub fn classify(&self, mut vm: VmInfo) -> VmInfo {
        if !vm.network_perf.is_empty() {
            vm.network_perf_tier = match self.network.map_network_perf(&vm.network_perf) {
                Ok(tier) => tier,
                Err(e) => {
                    debug!(
                        "Failed to get network performance category for '{}': {}",
                        vm.instance_type, e
                    );
                    DEFAULT_NETWORK_TIER
                }
            };
        }

        if vm.category == Category::Unknown {
            vm.category = self
                .category
                .map_category(&vm.instance_type)
                .unwrap_or_else(|e| {
                    debug!("Failed to get virtual machine category: {}", e);
                    Category::Unknown
                });
        }

        vm.refresh_attributes();
        vm
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(Arc::new(ThresholdMapper::standard()), CategoryMapper::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CPU, INSTANCE_TYPE_CATEGORY, NETWORK_PERF_CATEGORY};

    #[test]
    fn test_classify_fills_tier_category_and_attributes() {
        let vm = VmInfo::new("ecs.c6.xlarge", 4.0, 8.0).with_network_perf("1.5 Gbit/s");

        let vm = Classifier::default().classify(vm);

        assert_eq!(vm.network_perf_tier, NetworkPerfTier::Medium);
        assert_eq!(vm.category, Category::Compute);
        assert_eq!(vm.attributes.get(CPU).map(String::as_str), Some("4"));
        assert_eq!(
            vm.attributes.get(NETWORK_PERF_CATEGORY).map(String::as_str),
            Some("medium")
        );
    }

    #[test]
    fn test_unmappable_values_degrade_to_defaults() {
        let vm = VmInfo::new("weird-type", 1.0, 2.0).with_network_perf("Moderate");

        let vm = Classifier::default().classify(vm);

        assert_eq!(vm.network_perf_tier, DEFAULT_NETWORK_TIER);
        assert_eq!(vm.category, Category::Unknown);
        assert_eq!(
            vm.attributes.get(NETWORK_PERF_CATEGORY).map(String::as_str),
            Some("low")
        );
        assert_eq!(
            vm.attributes.get(INSTANCE_TYPE_CATEGORY).map(String::as_str),
            Some("unknown")
        );
    }

    #[test]
    fn test_adapter_category_is_kept() {
        let mut vm = VmInfo::new("ecs.g6.large", 2.0, 8.0);
        vm.category = Category::Memory;

        let vm = Classifier::default().classify(vm);

        assert_eq!(vm.category, Category::Memory);
    }
}
