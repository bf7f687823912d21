//! Engine configuration.
//!
//! Durations are expressed in seconds when (de)serialized.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::classify::{
    default_ranges, default_rules, CategoryMapper, CategoryRule, Classifier, ThresholdMapper,
    TierRange,
};
use crate::errors::{CloudInfoError, Result};
use crate::pricing::{BatchPriceConfig, DEFAULT_BATCH_CONCURRENCY, DEFAULT_BATCH_SIZE};

/// Full catalog renewal interval (24 hours).
pub const DEFAULT_RENEWAL_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Spot price renewal interval for short-lived providers (5 minutes).
pub const DEFAULT_SPOT_RENEWAL_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Service whose regions define the refreshed (provider, region) keys.
pub const DEFAULT_SERVICE: &str = "compute";

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    #[serde(with = "duration_secs")]
    pub renewal_interval: Duration,

    #[serde(with = "duration_secs")]
    pub spot_renewal_interval: Duration,

    pub price_batch_size: usize,

    /// Batches in flight per region refresh, further capped by each adapter.
    pub price_concurrency: usize,

    pub service: String,

    /// Classification rules by provider name. Providers without an entry use
    /// the defaults.
    pub classifiers: HashMap<String, ClassifierConfig>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            renewal_interval: DEFAULT_RENEWAL_INTERVAL,
            spot_renewal_interval: DEFAULT_SPOT_RENEWAL_INTERVAL,
            price_batch_size: DEFAULT_BATCH_SIZE,
            price_concurrency: DEFAULT_BATCH_CONCURRENCY,
            service: DEFAULT_SERVICE.to_string(),
            classifiers: HashMap::new(),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.renewal_interval.is_zero() {
            return Err(CloudInfoError::Config(
                "renewalInterval must be greater than zero".to_string(),
            ));
        }
        if self.spot_renewal_interval.is_zero() {
            return Err(CloudInfoError::Config(
                "spotRenewalInterval must be greater than zero".to_string(),
            ));
        }
        if self.price_batch_size == 0 {
            return Err(CloudInfoError::Config(
                "priceBatchSize must be greater than zero".to_string(),
            ));
        }
        if self.price_concurrency == 0 {
            return Err(CloudInfoError::Config(
                "priceConcurrency must be greater than zero".to_string(),
            ));
        }
        for (provider, classifier) in &self.classifiers {
            classifier.build().map_err(|e| {
                CloudInfoError::Config(format!("classifier for '{}': {}", provider, e))
            })?;
        }
        Ok(())
    }

    pub fn batch_config(&self) -> BatchPriceConfig {
        BatchPriceConfig {
            batch_size: self.price_batch_size,
            max_concurrency: self.price_concurrency,
        }
    }
}

/// Classification rules of one provider.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ClassifierConfig {
    pub network_tiers: Vec<TierRange>,
    pub categories: Vec<CategoryRule>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            network_tiers: default_ranges(),
            categories: default_rules(),
        }
    }
}

impl ClassifierConfig {
    pub fn build(&self) -> Result<Classifier> {
        let network = ThresholdMapper::new(self.network_tiers.clone())?;
        Ok(Classifier::new(
            Arc::new(network),
            CategoryMapper::new(self.categories.clone()),
        ))
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, NetworkPerfTier, VmInfo};

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.batch_config().batch_size, 25);
        assert_eq!(config.renewal_interval, Duration::from_secs(86_400));
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"spotRenewalInterval": 60, "priceBatchSize": 10}"#).unwrap();

        assert_eq!(config.spot_renewal_interval, Duration::from_secs(60));
        assert_eq!(config.price_batch_size, 10);
        assert_eq!(config.renewal_interval, DEFAULT_RENEWAL_INTERVAL);
        assert_eq!(config.service, "compute");
    }

    #[test]
    fn test_zero_values_rejected() {
        let config = EngineConfig {
            price_batch_size: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(CloudInfoError::Config(_))));

        let config = EngineConfig {
            spot_renewal_interval: Duration::ZERO,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(CloudInfoError::Config(_))));
    }

    #[test]
    fn test_provider_classifier_from_config() {
        let config: EngineConfig = serde_json::from_str(
            r#"{
                "classifiers": {
                    "acme": {
                        "networkTiers": [
                            {"tier": "low", "from": 0.0, "to": 10.0},
                            {"tier": "extra", "from": 10.0, "to": null}
                        ],
                        "categories": [{"prefix": "big.", "category": "memory"}]
                    }
                }
            }"#,
        )
        .unwrap();
        assert!(config.validate().is_ok());

        let classifier = config.classifiers["acme"].build().unwrap();
        let vm = classifier.classify(VmInfo::new("big.one", 8.0, 64.0).with_network_perf("25 Gbit/s"));

        assert_eq!(vm.network_perf_tier, NetworkPerfTier::Extra);
        assert_eq!(vm.category, Category::Memory);
    }

    #[test]
    fn test_invalid_thresholds_rejected() {
        let mut config = EngineConfig::default();
        config.classifiers.insert(
            "acme".to_string(),
            ClassifierConfig {
                network_tiers: vec![TierRange::new(NetworkPerfTier::Low, 1.0, None)],
                categories: Vec::new(),
            },
        );

        assert!(matches!(config.validate(), Err(CloudInfoError::Config(_))));
        assert!(config.classifiers["acme"].build().is_err());
    }
}
