//! Read façade over the product cache.
//!
//! Every query is answered from cached snapshots; nothing here calls a
//! provider. Errors distinguish an unknown provider, a key that was never
//! populated and a populated key that holds no matching data.

use std::collections::BTreeMap;
use std::sync::Arc;

use log::info;

use crate::cache::{KeyStatus, ProductCache, ProviderSnapshot, RegionSnapshot, PROVIDER_SCOPE};
use crate::config::EngineConfig;
use crate::errors::{CloudInfoError, Result};
use crate::events::{LoggingEventSink, RefreshEventSink};
use crate::infoer::{Infoer, InfoerRegistry};
use crate::models::{
    AttrValue, Image, LocationVersion, ProductDetails, Provider, RegionId, Service, VmInfo, ZoneId,
    CPU, MEMORY,
};
use crate::renewal::{Refresher, RenewalScheduler, SchedulerHandle};
use crate::shutdown::CancellationSignal;

/// Entry point for VM characteristics and pricing of every registered provider.
pub struct CloudInfo {
    config: EngineConfig,
    registry: Arc<InfoerRegistry>,
    cache: Arc<ProductCache>,
    refresher: Arc<Refresher>,
}

impl CloudInfo {
    /// Create a façade logging refresh events.
    pub fn new(config: EngineConfig, infoers: Vec<Arc<dyn Infoer>>) -> Result<Self> {
        Self::with_event_sink(config, infoers, Arc::new(LoggingEventSink))
    }

    pub fn with_event_sink(
        config: EngineConfig,
        infoers: Vec<Arc<dyn Infoer>>,
        events: Arc<dyn RefreshEventSink>,
    ) -> Result<Self> {
        let registry = Arc::new(InfoerRegistry::new());
        for infoer in infoers {
            registry.register(infoer);
        }
        let cache = Arc::new(ProductCache::new());
        let refresher = Arc::new(Refresher::new(
            &config,
            Arc::clone(&cache),
            Arc::clone(&registry),
            events,
        )?);

        Ok(Self {
            config,
            registry,
            cache,
            refresher,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<ProductCache> {
        &self.cache
    }

    pub fn refresher(&self) -> &Arc<Refresher> {
        &self.refresher
    }

    /// Start periodic renewal of every registered provider.
    pub fn start(&self) -> SchedulerHandle {
        RenewalScheduler::new(Arc::clone(&self.refresher), &self.config).start()
    }

    /// Renew every provider once and wait for it.
    pub async fn renew_now(&self, cancel: &CancellationSignal) {
        RenewalScheduler::new(Arc::clone(&self.refresher), &self.config)
            .run_once(cancel)
            .await;
    }

    /// Stop serving a provider and drop its cached data.
    pub fn remove_provider(&self, provider: &str) -> Result<()> {
        self.registry
            .remove(provider)
            .ok_or_else(|| CloudInfoError::UnknownProvider(provider.to_string()))?;
        self.cache.reset_provider(provider);
        self.refresher.rate_limiter().reset(provider);
        info!("Removed provider '{}'", provider);
        Ok(())
    }

    pub fn get_infoer(&self, provider: &str) -> Result<Arc<dyn Infoer>> {
        self.registry
            .get(provider)
            .ok_or_else(|| CloudInfoError::UnknownProvider(provider.to_string()))
    }

    /// `false` for unknown providers.
    pub fn has_short_lived_price_info(&self, provider: &str) -> bool {
        self.registry
            .get(provider)
            .is_some_and(|infoer| infoer.has_short_lived_price_info())
    }

    fn provider_snapshot(&self, provider: &str) -> Result<Arc<ProviderSnapshot>> {
        self.get_infoer(provider)?;
        self.cache
            .provider(provider)
            .ok_or_else(|| CloudInfoError::NoDataYet {
                provider: provider.to_string(),
                region: PROVIDER_SCOPE.to_string(),
            })
    }

    fn region_snapshot(&self, provider: &str, region: &str) -> Result<Arc<RegionSnapshot>> {
        self.get_infoer(provider)?;
        self.cache
            .region(provider, region)
            .ok_or_else(|| CloudInfoError::NoDataYet {
                provider: provider.to_string(),
                region: region.to_string(),
            })
    }

    fn describe(&self, infoer: &dyn Infoer) -> Provider {
        let services = match self.cache.provider(infoer.id()) {
            Some(snapshot) => snapshot.services.clone(),
            None => infoer.services(),
        };
        Provider::new(infoer.id()).with_services(services)
    }

    /// Registered providers, sorted by name.
    pub fn get_providers(&self) -> Vec<Provider> {
        self.registry
            .all()
            .iter()
            .map(|infoer| self.describe(infoer.as_ref()))
            .collect()
    }

    pub fn get_provider(&self, provider: &str) -> Result<Provider> {
        let infoer = self.get_infoer(provider)?;
        Ok(self.describe(infoer.as_ref()))
    }

    pub fn get_services(&self, provider: &str) -> Result<Vec<Service>> {
        Ok(self.get_provider(provider)?.services)
    }

    /// Attributes with queryable values.
    pub fn get_attributes(&self) -> Vec<String> {
        vec![CPU.to_string(), MEMORY.to_string()]
    }

    /// Distinct values of an attribute across every cached region of a
    /// provider, sorted ascending.
    pub fn get_attr_values(&self, provider: &str, attribute: &str) -> Result<Vec<AttrValue>> {
        let value_of: fn(&VmInfo) -> f64 = match attribute {
            CPU => |vm: &VmInfo| vm.cpus,
            MEMORY => |vm: &VmInfo| vm.memory,
            _ => return Err(CloudInfoError::UnsupportedAttribute(attribute.to_string())),
        };
        self.get_infoer(provider)?;

        let snapshots = self.cache.regions_of(provider);
        if snapshots.is_empty() {
            return Err(CloudInfoError::NoDataYet {
                provider: provider.to_string(),
                region: PROVIDER_SCOPE.to_string(),
            });
        }

        let mut values: Vec<f64> = snapshots
            .iter()
            .flat_map(|(_, snapshot)| snapshot.vms.iter().map(value_of).collect::<Vec<_>>())
            .collect();
        values.sort_by(f64::total_cmp);
        values.dedup();

        Ok(values
            .into_iter()
            .map(|value| AttrValue {
                str_value: value.to_string(),
                value,
            })
            .collect())
    }

    pub fn get_zones(&self, provider: &str, region: &str) -> Result<Vec<ZoneId>> {
        Ok(self.region_snapshot(provider, region)?.zones.to_vec())
    }

    /// Region id -> display name.
    pub fn get_regions(&self, provider: &str) -> Result<BTreeMap<RegionId, String>> {
        Ok(self.provider_snapshot(provider)?.regions.clone())
    }

    /// On-demand price and the spot price averaged over the requested zones
    /// that have a cached spot price.
    ///
    /// The on-demand price is `None` when the provider did not report one;
    /// a missing spot average is `NoPriceData`.
    pub fn get_price<S: AsRef<str>>(
        &self,
        provider: &str,
        region: &str,
        instance_type: &str,
        zones: &[S],
    ) -> Result<(Option<f64>, f64)> {
        let snapshot = self.region_snapshot(provider, region)?;
        let no_price = || CloudInfoError::NoPriceData {
            provider: provider.to_string(),
            region: region.to_string(),
            instance_type: instance_type.to_string(),
        };

        let on_demand = snapshot.on_demand_price(instance_type);
        let spot = snapshot
            .price(instance_type)
            .and_then(|price| price.spot_price.average_over(zones))
            .ok_or_else(no_price)?;

        Ok((on_demand, spot))
    }

    pub fn get_product_details(&self, provider: &str, region: &str) -> Result<Vec<ProductDetails>> {
        Ok(self.region_snapshot(provider, region)?.product_details())
    }

    pub fn get_images(&self, provider: &str, service: &str, region: &str) -> Result<Vec<Image>> {
        let snapshot = self.provider_snapshot(provider)?;
        check_service(provider, &snapshot, service)?;
        snapshot
            .images(service, region)
            .cloned()
            .ok_or_else(|| {
                CloudInfoError::NoMatchingData(format!(
                    "no images of '{}' for {}/{}",
                    service, provider, region
                ))
            })
    }

    /// Versions of a service in every region of a provider.
    pub fn get_versions(&self, provider: &str, service: &str) -> Result<Vec<LocationVersion>> {
        let snapshot = self.provider_snapshot(provider)?;
        check_service(provider, &snapshot, service)?;
        Ok(snapshot.versions.get(service).cloned().unwrap_or_default())
    }

    /// Refresh status of a key. Use [`PROVIDER_SCOPE`] as region for the
    /// provider-level data.
    pub fn status(&self, provider: &str, region: &str) -> Result<KeyStatus> {
        self.get_infoer(provider)?;
        Ok(self.cache.status(provider, region))
    }
}

fn check_service(provider: &str, snapshot: &ProviderSnapshot, service: &str) -> Result<()> {
    if snapshot.services.iter().any(|s| s.name() == service) {
        Ok(())
    } else {
        Err(CloudInfoError::UnsupportedService {
            provider: provider.to_string(),
            service: service.to_string(),
        })
    }
}
