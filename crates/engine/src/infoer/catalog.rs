//! Catalog-backed adapter.
//!
//! Serves a static provider catalog loaded from JSON. It behaves like a real
//! provider towards the engine: batch price requests containing an unknown
//! instance type are rejected as a whole with `InvalidParameter`, unknown
//! regions fail with `NotFound`.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use async_trait::async_trait;
use log::debug;
use serde::{Deserialize, Serialize};

use super::capabilities::{InfoerCapabilities, RequestLimits};
use super::traits::Infoer;
use crate::errors::{CloudInfoError, ErrorCode, Result};
use crate::models::{
    Image, InstanceType, LocationVersion, Price, RegionId, Service, SpotPriceInfo, VmInfo, ZoneId,
};

/// Catalog file contents.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Catalog {
    pub provider: String,

    #[serde(default)]
    pub short_lived_prices: bool,

    #[serde(default = "default_services")]
    pub services: Vec<String>,

    #[serde(default)]
    pub batch_pricing: bool,

    #[serde(default)]
    pub max_concurrency: Option<usize>,

    #[serde(default)]
    pub regions: BTreeMap<RegionId, CatalogRegion>,
}

/// One region of a catalog.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogRegion {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub zones: Vec<ZoneId>,

    #[serde(default)]
    pub vms: Vec<VmInfo>,

    #[serde(default)]
    pub on_demand_prices: HashMap<InstanceType, f64>,

    #[serde(default)]
    pub spot_prices: HashMap<InstanceType, SpotPriceInfo>,

    #[serde(default)]
    pub images: Vec<String>,

    #[serde(default)]
    pub versions: Vec<String>,

    #[serde(default)]
    pub default_version: Option<String>,
}

fn default_services() -> Vec<String> {
    vec!["compute".to_string()]
}

/// Adapter serving a [`Catalog`].
pub struct CatalogInfoer {
    catalog: Catalog,
}

impl CatalogInfoer {
    pub fn new(catalog: Catalog) -> Self {
        Self { catalog }
    }

    /// Load a catalog from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| CloudInfoError::Config(format!("{}: {}", path.display(), e)))?;
        let catalog: Catalog = serde_json::from_str(&raw)
            .map_err(|e| CloudInfoError::Config(format!("{}: {}", path.display(), e)))?;
        debug!(
            "Loaded catalog for '{}' with {} region(s) from {}",
            catalog.provider,
            catalog.regions.len(),
            path.display()
        );
        Ok(Self::new(catalog))
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    fn region(&self, region: &str) -> Result<&CatalogRegion> {
        self.catalog.regions.get(region).ok_or_else(|| {
            CloudInfoError::rejected(
                &self.catalog.provider,
                ErrorCode::NotFound,
                format!("unknown region '{}'", region),
            )
        })
    }

    fn check_service(&self, service: &str) -> Result<()> {
        if self.catalog.services.iter().any(|s| s == service) {
            Ok(())
        } else {
            Err(CloudInfoError::UnsupportedService {
                provider: self.catalog.provider.clone(),
                service: service.to_string(),
            })
        }
    }
}

#[async_trait]
impl Infoer for CatalogInfoer {
    fn id(&self) -> &str {
        &self.catalog.provider
    }

    fn has_short_lived_price_info(&self) -> bool {
        self.catalog.short_lived_prices
    }

    fn capabilities(&self) -> InfoerCapabilities {
        InfoerCapabilities {
            batch_pricing: self.catalog.batch_pricing,
            images: self.catalog.regions.values().any(|r| !r.images.is_empty()),
        }
    }

    fn request_limits(&self) -> RequestLimits {
        let mut limits = RequestLimits::default();
        if let Some(max_concurrency) = self.catalog.max_concurrency {
            limits.max_concurrency = max_concurrency.max(1);
        }
        limits
    }

    fn services(&self) -> Vec<Service> {
        self.catalog.services.iter().map(Service::new).collect()
    }

    async fn get_virtual_machines(&self, region: &str) -> Result<Vec<VmInfo>> {
        let catalog_region = self.region(region)?;
        let vms = catalog_region
            .vms
            .iter()
            .map(|vm| {
                let mut vm = vm.clone();
                if vm.zones.is_empty() {
                    vm.zones = catalog_region.zones.clone();
                }
                if !self.catalog.batch_pricing && vm.on_demand_price.is_none() {
                    vm.on_demand_price = catalog_region.on_demand_prices.get(&vm.instance_type).copied();
                }
                vm
            })
            .collect();
        Ok(vms)
    }

    async fn get_current_prices(&self, region: &str) -> Result<HashMap<InstanceType, Price>> {
        let catalog_region = self.region(region)?;
        Ok(catalog_region
            .spot_prices
            .iter()
            .map(|(instance_type, spot)| (instance_type.clone(), Price::spot(spot.clone())))
            .collect())
    }

    async fn get_zones(&self, region: &str) -> Result<Vec<ZoneId>> {
        Ok(self.region(region)?.zones.clone())
    }

    async fn get_regions(&self, service: &str) -> Result<BTreeMap<RegionId, String>> {
        self.check_service(service)?;
        Ok(self
            .catalog
            .regions
            .iter()
            .map(|(id, region)| {
                let name = if region.name.is_empty() {
                    id.clone()
                } else {
                    region.name.clone()
                };
                (id.clone(), name)
            })
            .collect())
    }

    async fn get_on_demand_prices(
        &self,
        region: &str,
        instance_types: &[InstanceType],
    ) -> Result<Vec<f64>> {
        if !self.catalog.batch_pricing {
            return Err(CloudInfoError::UnsupportedService {
                provider: self.catalog.provider.clone(),
                service: "on-demand batch pricing".to_string(),
            });
        }

        let catalog_region = self.region(region)?;
        instance_types
            .iter()
            .map(|instance_type| {
                catalog_region
                    .on_demand_prices
                    .get(instance_type)
                    .copied()
                    .ok_or_else(|| {
                        CloudInfoError::rejected(
                            &self.catalog.provider,
                            ErrorCode::InvalidParameter,
                            format!("no price for '{}'", instance_type),
                        )
                    })
            })
            .collect()
    }

    async fn get_service_images(&self, service: &str, region: &str) -> Result<Vec<Image>> {
        self.check_service(service)?;
        Ok(self.region(region)?.images.iter().map(Image::new).collect())
    }

    async fn get_versions(&self, service: &str, region: &str) -> Result<Vec<LocationVersion>> {
        self.check_service(service)?;
        let catalog_region = self.region(region)?;
        if catalog_region.versions.is_empty() {
            return Ok(Vec::new());
        }
        let default_version = catalog_region
            .default_version
            .clone()
            .unwrap_or_else(|| catalog_region.versions[0].clone());
        Ok(vec![LocationVersion::new(
            region,
            catalog_region.versions.clone(),
            default_version,
        )])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Catalog {
        serde_json::from_str(
            r#"{
                "provider": "demo",
                "shortLivedPrices": true,
                "batchPricing": true,
                "regions": {
                    "eu-1": {
                        "name": "Europe 1",
                        "zones": ["eu-1a", "eu-1b"],
                        "vms": [
                            {"type": "ecs.g6.large", "cpus": 2, "mem": 8, "networkPerf": "1.0 Gbit/s"},
                            {"type": "ecs.c6.large", "cpus": 2, "mem": 4, "zones": ["eu-1a"]}
                        ],
                        "onDemandPrices": {"ecs.g6.large": 0.1},
                        "spotPrices": {"ecs.g6.large": {"eu-1a": 0.03}},
                        "images": ["centos_7_06_64"],
                        "versions": ["1.16.6", "1.14.8"],
                        "defaultVersion": "1.14.8"
                    }
                }
            }"#,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_vms_inherit_region_zones() {
        let infoer = CatalogInfoer::new(catalog());
        let vms = infoer.get_virtual_machines("eu-1").await.unwrap();

        assert_eq!(vms.len(), 2);
        assert_eq!(vms[0].zones, vec!["eu-1a", "eu-1b"]);
        assert_eq!(vms[1].zones, vec!["eu-1a"]);
        assert_eq!(vms[0].on_demand_price, None);
    }

    #[tokio::test]
    async fn test_batch_with_unknown_type_is_rejected() {
        let infoer = CatalogInfoer::new(catalog());
        let types = vec!["ecs.g6.large".to_string(), "ecs.c6.large".to_string()];

        let err = infoer.get_on_demand_prices("eu-1", &types).await.unwrap_err();
        assert_eq!(err.code(), Some(&ErrorCode::InvalidParameter));

        let prices = infoer
            .get_on_demand_prices("eu-1", &types[..1])
            .await
            .unwrap();
        assert_eq!(prices, vec![0.1]);
    }

    #[tokio::test]
    async fn test_unknown_region_and_service() {
        let infoer = CatalogInfoer::new(catalog());

        let err = infoer.get_zones("us-9").await.unwrap_err();
        assert_eq!(err.code(), Some(&ErrorCode::NotFound));

        let err = infoer.get_regions("eks").await.unwrap_err();
        assert!(matches!(err, CloudInfoError::UnsupportedService { .. }));
    }

    #[tokio::test]
    async fn test_images_and_versions() {
        let infoer = CatalogInfoer::new(catalog());

        let images = infoer.get_service_images("compute", "eu-1").await.unwrap();
        assert_eq!(images, vec![Image::new("centos_7_06_64")]);

        let versions = infoer.get_versions("compute", "eu-1").await.unwrap();
        assert_eq!(versions[0].default_version, "1.14.8");
        assert_eq!(versions[0].location, "eu-1");
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("demo.json");
        std::fs::write(&path, serde_json::to_string(&catalog()).unwrap()).unwrap();

        let infoer = CatalogInfoer::from_file(&path).unwrap();
        assert_eq!(infoer.id(), "demo");
        assert!(infoer.has_short_lived_price_info());
        assert!(infoer.capabilities().batch_pricing);

        let err = CatalogInfoer::from_file(dir.path().join("missing.json")).err().unwrap();
        assert!(matches!(err, CloudInfoError::Config(_)));
    }
}
