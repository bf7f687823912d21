use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::price::unknown_as_negative;
use super::types::{InstanceType, ZoneId, CPU, INSTANCE_TYPE_CATEGORY, MEMORY, NETWORK_PERF_CATEGORY};

/// Coarse classification of an instance type's purpose.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    General,
    Compute,
    Memory,
    Gpu,
    Burst,
    Storage,
    #[default]
    Unknown,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Compute => "compute",
            Self::Memory => "memory",
            Self::Gpu => "gpu",
            Self::Burst => "burst",
            Self::Storage => "storage",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Network performance tier, ordered from slowest to fastest.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkPerfTier {
    #[default]
    Low,
    Medium,
    High,
    Extra,
}

impl NetworkPerfTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Extra => "extra",
        }
    }
}

impl fmt::Display for NetworkPerfTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capabilities of a single instance type in one region.
///
/// Produced by an adapter, classified by the refresher and then frozen:
/// a refresh cycle replaces the whole set for its region.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VmInfo {
    #[serde(rename = "type")]
    pub instance_type: InstanceType,

    #[serde(default)]
    pub category: Category,

    pub cpus: f64,

    /// Memory size in GiB
    #[serde(rename = "mem")]
    pub memory: f64,

    #[serde(default)]
    pub gpus: f64,

    /// Raw throughput string as reported by the provider (e.g., "1.2 Gbit/s")
    #[serde(default)]
    pub network_perf: String,

    #[serde(default)]
    pub network_perf_tier: NetworkPerfTier,

    #[serde(default)]
    pub zones: Vec<ZoneId>,

    #[serde(default, with = "unknown_as_negative")]
    pub on_demand_price: Option<f64>,

    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl VmInfo {
    /// Create an unclassified descriptor with the mandatory capacity figures.
    pub fn new(instance_type: impl Into<InstanceType>, cpus: f64, memory: f64) -> Self {
        Self {
            instance_type: instance_type.into(),
            category: Category::Unknown,
            cpus,
            memory,
            gpus: 0.0,
            network_perf: String::new(),
            network_perf_tier: NetworkPerfTier::Low,
            zones: Vec::new(),
            on_demand_price: None,
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_gpus(mut self, gpus: f64) -> Self {
        self.gpus = gpus;
        self
    }

    pub fn with_network_perf(mut self, network_perf: impl Into<String>) -> Self {
        self.network_perf = network_perf.into();
        self
    }

    pub fn with_zones<I, S>(mut self, zones: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<ZoneId>,
    {
        self.zones = zones.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_on_demand_price(mut self, price: f64) -> Self {
        self.on_demand_price = Some(price);
        self
    }

    /// Burst (shared-core) instances are flagged separately in product details.
    pub fn is_burst(&self) -> bool {
        self.category == Category::Burst
    }

    /// Rebuild the attribute map from the current field values.
    pub fn refresh_attributes(&mut self) {
        self.attributes = attributes(self.cpus, self.memory, self.network_perf_tier, self.category);
    }
}

/// Build the standard attribute map of an instance type.
pub fn attributes(
    cpus: f64,
    memory: f64,
    tier: NetworkPerfTier,
    category: Category,
) -> BTreeMap<String, String> {
    BTreeMap::from([
        (CPU.to_string(), cpus.to_string()),
        (MEMORY.to_string(), memory.to_string()),
        (NETWORK_PERF_CATEGORY.to_string(), tier.to_string()),
        (INSTANCE_TYPE_CATEGORY.to_string(), category.to_string()),
    ])
}
