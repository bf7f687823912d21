//! Immutable cache snapshots.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::models::{
    Image, InstanceType, LocationVersion, Price, ProductDetails, RegionId, Service, VmInfo, ZoneId,
};

/// One refresh cycle's view of a (provider, region) key.
///
/// The catalog part (VMs and zones) and the price part are reference counted
/// separately so a spot-only refresh can reuse the catalog of the previous
/// snapshot.
#[derive(Clone, Debug)]
pub struct RegionSnapshot {
    pub vms: Arc<Vec<VmInfo>>,
    pub zones: Arc<Vec<ZoneId>>,
    pub prices: Arc<HashMap<InstanceType, Price>>,
    pub catalog_updated_at: DateTime<Utc>,
    pub prices_updated_at: DateTime<Utc>,
    /// Monotonic across the whole cache; compare, don't interpret.
    pub catalog_generation: u64,
    pub price_generation: u64,
}

impl RegionSnapshot {
    pub fn vm(&self, instance_type: &str) -> Option<&VmInfo> {
        self.vms.iter().find(|vm| vm.instance_type == instance_type)
    }

    pub fn price(&self, instance_type: &str) -> Option<&Price> {
        self.prices.get(instance_type)
    }

    /// On-demand price of an instance type, preferring the price map over
    /// the adapter-provided VM price.
    pub fn on_demand_price(&self, instance_type: &str) -> Option<f64> {
        self.price(instance_type)
            .and_then(|price| price.on_demand_price)
            .or_else(|| self.vm(instance_type).and_then(|vm| vm.on_demand_price))
    }

    pub fn product_details(&self) -> Vec<ProductDetails> {
        self.vms
            .iter()
            .map(|vm| ProductDetails::new(vm, self.price(&vm.instance_type)))
            .collect()
    }

    /// Same catalog, new prices.
    pub(crate) fn with_prices(
        &self,
        prices: HashMap<InstanceType, Price>,
        generation: u64,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            vms: Arc::clone(&self.vms),
            zones: Arc::clone(&self.zones),
            prices: Arc::new(prices),
            catalog_updated_at: self.catalog_updated_at,
            prices_updated_at: at,
            catalog_generation: self.catalog_generation,
            price_generation: generation,
        }
    }
}

/// Provider-level data: regions, services, images and versions.
#[derive(Clone, Debug, Default)]
pub struct ProviderSnapshot {
    /// Region id -> display name.
    pub regions: BTreeMap<RegionId, String>,
    pub services: Vec<Service>,
    /// (service, region) -> images.
    pub images: BTreeMap<(String, RegionId), Vec<Image>>,
    /// service -> versions of every region.
    pub versions: BTreeMap<String, Vec<LocationVersion>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl ProviderSnapshot {
    pub fn images(&self, service: &str, region: &str) -> Option<&Vec<Image>> {
        self.images.get(&(service.to_string(), region.to_string()))
    }
}
