//! Single refresh cycles.
//!
//! A [`Refresher`] runs one cycle for one key and reports it: provider-level
//! data, a full region refresh, or a spot-price-only refresh. Scheduling is
//! left to [`RenewalScheduler`](super::RenewalScheduler).

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use log::{debug, info, warn};
use tokio::time::Instant;

use super::guard::InFlight;
use crate::cache::{ProductCache, ProviderSnapshot, PROVIDER_SCOPE};
use crate::classify::Classifier;
use crate::config::EngineConfig;
use crate::errors::{CloudInfoError, Result};
use crate::events::{RefreshEvent, RefreshEventSink, RefreshKind, RefreshOutcome};
use crate::infoer::{Infoer, InfoerRegistry};
use crate::models::{InstanceType, Price, RegionId, VmInfo};
use crate::pricing::{BatchPriceFetcher, RateLimiter};
use crate::shutdown::CancellationSignal;

pub struct Refresher {
    cache: Arc<ProductCache>,
    registry: Arc<InfoerRegistry>,
    events: Arc<dyn RefreshEventSink>,
    fetcher: BatchPriceFetcher,
    rate_limiter: Arc<RateLimiter>,
    classifiers: HashMap<String, Classifier>,
    default_classifier: Classifier,
    in_flight: InFlight,
    service: String,
}

impl Refresher {
    /// Build a refresher. Fails on invalid configuration.
    pub fn new(
        config: &EngineConfig,
        cache: Arc<ProductCache>,
        registry: Arc<InfoerRegistry>,
        events: Arc<dyn RefreshEventSink>,
    ) -> Result<Self> {
        config.validate()?;

        let classifiers = config
            .classifiers
            .iter()
            .map(|(provider, classifier)| Ok((provider.clone(), classifier.build()?)))
            .collect::<Result<HashMap<_, _>>>()?;
        let rate_limiter = Arc::new(RateLimiter::new());

        Ok(Self {
            cache,
            registry,
            events,
            fetcher: BatchPriceFetcher::new(config.batch_config(), Arc::clone(&rate_limiter)),
            rate_limiter,
            classifiers,
            default_classifier: Classifier::default(),
            in_flight: InFlight::new(),
            service: config.service.clone(),
        })
    }

    pub fn cache(&self) -> &Arc<ProductCache> {
        &self.cache
    }

    pub fn registry(&self) -> &Arc<InfoerRegistry> {
        &self.registry
    }

    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.rate_limiter
    }

    fn classifier(&self, provider: &str) -> &Classifier {
        self.classifiers
            .get(provider)
            .unwrap_or(&self.default_classifier)
    }

    /// Removed providers must not be written back into the cache. The cache
    /// epoch catches a removal that lands after this check.
    fn check_registered(&self, provider: &str) -> Result<()> {
        if self.registry.contains(provider) {
            Ok(())
        } else {
            Err(CloudInfoError::Cancelled)
        }
    }

    fn report(
        &self,
        provider: &str,
        region: Option<&str>,
        kind: RefreshKind,
        started: Instant,
        outcome: RefreshOutcome,
    ) -> RefreshOutcome {
        self.events.emit(RefreshEvent::cycle_completed(
            provider,
            region,
            kind,
            started.elapsed(),
            outcome.clone(),
        ));
        outcome
    }

    /// Record the end of a full or provider cycle on the key status.
    fn settle(
        &self,
        provider: &str,
        region: &str,
        epoch: u64,
        result: Result<usize>,
    ) -> RefreshOutcome {
        match result {
            Ok(0) => {
                self.cache.mark_ready(provider, region, epoch);
                RefreshOutcome::Succeeded
            }
            Ok(skipped) => {
                self.cache.mark_ready(provider, region, epoch);
                RefreshOutcome::Partial { skipped }
            }
            Err(CloudInfoError::Cancelled) => {
                debug!("Refresh of {}/{} cancelled, nothing committed", provider, region);
                self.cache.mark_cancelled(provider, region, epoch);
                RefreshOutcome::Cancelled
            }
            Err(e) => {
                warn!(
                    "Refresh of {}/{} failed, keeping previous data: {}",
                    provider, region, e
                );
                self.cache.mark_failed(provider, region, epoch, &e.to_string());
                RefreshOutcome::Failed {
                    error: e.to_string(),
                }
            }
        }
    }

    /// Refresh provider-level data: regions, services, images and versions.
    ///
    /// Returns the region ids on success. On failure the previous provider
    /// data is retained.
    pub async fn refresh_provider(
        &self,
        infoer: &dyn Infoer,
        cancel: &CancellationSignal,
    ) -> (RefreshOutcome, Option<Vec<RegionId>>) {
        let provider = infoer.id();
        let started = Instant::now();
        let epoch = self.cache.epoch(provider);

        let Some(_guard) = self.in_flight.try_acquire(provider, PROVIDER_SCOPE) else {
            debug!("Provider refresh of '{}' still running, skipping", provider);
            self.cache.mark_suppressed(provider, PROVIDER_SCOPE, epoch);
            let outcome = RefreshOutcome::Suppressed;
            return (self.report(provider, None, RefreshKind::Provider, started, outcome), None);
        };

        self.cache.mark_refreshing(provider, PROVIDER_SCOPE, epoch);
        let result = self.run_provider_cycle(infoer, epoch, cancel).await;
        let regions = result.as_ref().ok().cloned();
        let outcome = self.settle(provider, PROVIDER_SCOPE, epoch, result.map(|_| 0));

        (
            self.report(provider, None, RefreshKind::Provider, started, outcome),
            regions,
        )
    }

    async fn run_provider_cycle(
        &self,
        infoer: &dyn Infoer,
        epoch: u64,
        cancel: &CancellationSignal,
    ) -> Result<Vec<RegionId>> {
        let provider = infoer.id();
        cancel.check()?;

        let regions = infoer.get_regions(&self.service).await?;
        let services = infoer.services();
        let fetch_images = infoer.capabilities().images;

        let mut snapshot = ProviderSnapshot {
            regions: regions.clone(),
            services: services.clone(),
            ..Default::default()
        };

        for service in &services {
            cancel.check()?;
            let service_regions = if service.name() == self.service {
                regions.clone()
            } else {
                match infoer.get_regions(service.name()).await {
                    Ok(service_regions) => service_regions,
                    Err(e) => {
                        warn!(
                            "Failed to retrieve regions of service '{}' for '{}': {}",
                            service.name(),
                            provider,
                            e
                        );
                        BTreeMap::new()
                    }
                }
            };

            let mut versions = Vec::new();
            for region in service_regions.keys() {
                if fetch_images {
                    match infoer.get_service_images(service.name(), region).await {
                        Ok(images) => {
                            snapshot
                                .images
                                .insert((service.name().to_string(), region.clone()), images);
                        }
                        Err(e) => debug!(
                            "No images of '{}' for {}/{}: {}",
                            service.name(),
                            provider,
                            region,
                            e
                        ),
                    }
                }

                match infoer.get_versions(service.name(), region).await {
                    Ok(region_versions) => versions.extend(region_versions),
                    Err(e) => debug!(
                        "No versions of '{}' for {}/{}: {}",
                        service.name(),
                        provider,
                        region,
                        e
                    ),
                }
            }
            snapshot.versions.insert(service.name().to_string(), versions);
        }

        cancel.check()?;
        self.check_registered(provider)?;
        let region_ids = regions.keys().cloned().collect();
        if !self.cache.commit_provider(provider, epoch, snapshot) {
            return Err(CloudInfoError::Cancelled);
        }
        info!("Renewed provider data of '{}' ({} region(s))", provider, regions.len());
        Ok(region_ids)
    }

    /// Full refresh of one (provider, region) key.
    ///
    /// `seed` holds prices preloaded by [`Infoer::initialize`] for this region.
    pub async fn refresh_region(
        &self,
        infoer: &dyn Infoer,
        region: &str,
        seed: Option<&HashMap<InstanceType, Price>>,
        cancel: &CancellationSignal,
    ) -> RefreshOutcome {
        let provider = infoer.id();
        let started = Instant::now();
        let epoch = self.cache.epoch(provider);

        let Some(_guard) = self.in_flight.try_acquire(provider, region) else {
            debug!("Refresh of {}/{} still running, skipping", provider, region);
            self.cache.mark_suppressed(provider, region, epoch);
            return self.report(
                provider,
                Some(region),
                RefreshKind::Region,
                started,
                RefreshOutcome::Suppressed,
            );
        };

        self.cache.mark_refreshing(provider, region, epoch);
        let result = self.run_region_cycle(infoer, region, epoch, seed, cancel).await;
        let outcome = self.settle(provider, region, epoch, result);
        self.report(provider, Some(region), RefreshKind::Region, started, outcome)
    }

    /// Returns the number of instance types left without an on-demand price
    /// by batch pricing.
    async fn run_region_cycle(
        &self,
        infoer: &dyn Infoer,
        region: &str,
        epoch: u64,
        seed: Option<&HashMap<InstanceType, Price>>,
        cancel: &CancellationSignal,
    ) -> Result<usize> {
        let provider = infoer.id();
        cancel.check()?;

        let zones = infoer.get_zones(region).await?;
        let classifier = self.classifier(provider);
        let vms: Vec<VmInfo> = infoer
            .get_virtual_machines(region)
            .await?
            .into_iter()
            .map(|vm| classifier.classify(vm))
            .collect();

        let mut prices: HashMap<InstanceType, Price> = seed.cloned().unwrap_or_default();
        let mut unpriced = 0;

        if infoer.capabilities().batch_pricing {
            let missing: Vec<InstanceType> = vms
                .iter()
                .filter(|vm| {
                    vm.on_demand_price.is_none()
                        && prices
                            .get(&vm.instance_type)
                            .and_then(|price| price.on_demand_price)
                            .is_none()
                })
                .map(|vm| vm.instance_type.clone())
                .collect();

            match self.fetcher.fetch(infoer, region, &missing, cancel).await {
                Ok(outcome) => {
                    if let Some(warning) = outcome.partial_data(provider, region) {
                        warn!("{}", warning);
                    }
                    unpriced = outcome.skipped.len();
                    for (instance_type, price) in outcome.prices {
                        prices.entry(instance_type).or_default().on_demand_price = Some(price);
                    }
                }
                Err(CloudInfoError::Cancelled) => return Err(CloudInfoError::Cancelled),
                Err(e) => {
                    warn!(
                        "On-demand pricing of {}/{} aborted, continuing without it: {}",
                        provider, region, e
                    );
                    unpriced = missing.len();
                }
            }
        }

        cancel.check()?;
        match infoer.get_current_prices(region).await {
            Ok(current) => merge_current_prices(&mut prices, current),
            Err(e) => warn!(
                "Failed to retrieve current prices of {}/{}: {}",
                provider, region, e
            ),
        }

        cancel.check()?;
        self.check_registered(provider)?;
        let snapshot = self
            .cache
            .commit_region(provider, region, epoch, vms, zones, prices)
            .ok_or(CloudInfoError::Cancelled)?;
        self.emit_spot_prices(provider, region, &snapshot.prices);
        Ok(unpriced)
    }

    /// Replace the spot prices of an already populated key.
    ///
    /// Spot failures are reported through events only; the key status tracks
    /// full cycles.
    pub async fn refresh_spot_prices(
        &self,
        infoer: &dyn Infoer,
        region: &str,
        cancel: &CancellationSignal,
    ) -> RefreshOutcome {
        let provider = infoer.id();
        let started = Instant::now();

        let Some(_guard) = self.in_flight.try_acquire(provider, region) else {
            debug!("{}/{} busy, skipping spot price refresh", provider, region);
            return self.report(
                provider,
                Some(region),
                RefreshKind::SpotPrices,
                started,
                RefreshOutcome::Suppressed,
            );
        };

        let outcome = match self.run_spot_cycle(infoer, region, cancel).await {
            Ok(()) => RefreshOutcome::Succeeded,
            Err(CloudInfoError::Cancelled) => RefreshOutcome::Cancelled,
            Err(e) => {
                warn!("Spot price refresh of {}/{} failed: {}", provider, region, e);
                RefreshOutcome::Failed {
                    error: e.to_string(),
                }
            }
        };
        self.report(provider, Some(region), RefreshKind::SpotPrices, started, outcome)
    }

    async fn run_spot_cycle(
        &self,
        infoer: &dyn Infoer,
        region: &str,
        cancel: &CancellationSignal,
    ) -> Result<()> {
        let provider = infoer.id();
        let epoch = self.cache.epoch(provider);
        cancel.check()?;

        let current_snapshot =
            self.cache
                .region(provider, region)
                .ok_or_else(|| CloudInfoError::NoDataYet {
                    provider: provider.to_string(),
                    region: region.to_string(),
                })?;

        let current = infoer.get_current_prices(region).await?;

        // Keep on-demand prices, replace every spot price
        let mut prices: HashMap<InstanceType, Price> = current_snapshot
            .prices
            .iter()
            .map(|(instance_type, price)| {
                (
                    instance_type.clone(),
                    Price {
                        on_demand_price: price.on_demand_price,
                        spot_price: Default::default(),
                    },
                )
            })
            .collect();
        merge_current_prices(&mut prices, current);

        cancel.check()?;
        self.check_registered(provider)?;
        let snapshot = self
            .cache
            .commit_prices(provider, region, epoch, prices)
            .ok_or_else(|| {
                if self.cache.epoch(provider) == epoch {
                    CloudInfoError::NoDataYet {
                        provider: provider.to_string(),
                        region: region.to_string(),
                    }
                } else {
                    CloudInfoError::Cancelled
                }
            })?;
        debug!(
            "Renewed spot prices of {}/{} (generation {})",
            provider, region, snapshot.price_generation
        );
        self.emit_spot_prices(provider, region, &snapshot.prices);
        Ok(())
    }

    fn emit_spot_prices(&self, provider: &str, region: &str, prices: &HashMap<InstanceType, Price>) {
        let events: Vec<RefreshEvent> = prices
            .iter()
            .flat_map(|(instance_type, price)| {
                price.spot_price.iter().map(move |(zone, value)| {
                    RefreshEvent::spot_price(provider, region, zone.as_str(), instance_type.as_str(), value)
                })
            })
            .collect();
        if !events.is_empty() {
            self.events.emit_batch(events);
        }
    }
}

/// Fold current prices in: spot prices are replaced, on-demand prices only
/// fill gaps.
fn merge_current_prices(
    prices: &mut HashMap<InstanceType, Price>,
    current: HashMap<InstanceType, Price>,
) {
    for (instance_type, price) in current {
        let entry = prices.entry(instance_type).or_default();
        entry.spot_price = price.spot_price;
        if entry.on_demand_price.is_none() {
            entry.on_demand_price = price.on_demand_price;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SpotPriceInfo;

    #[test]
    fn test_merge_keeps_known_on_demand_prices() {
        let mut prices = HashMap::new();
        prices.insert("m5.large".to_string(), Price::on_demand(0.1));

        let mut current = HashMap::new();
        current.insert(
            "m5.large".to_string(),
            Price {
                on_demand_price: Some(0.5),
                spot_price: SpotPriceInfo::from_iter([("a", 0.02)]),
            },
        );
        current.insert(
            "c5.large".to_string(),
            Price {
                on_demand_price: Some(0.08),
                spot_price: SpotPriceInfo::new(),
            },
        );

        merge_current_prices(&mut prices, current);

        assert_eq!(prices["m5.large"].on_demand_price, Some(0.1));
        assert_eq!(prices["m5.large"].spot_price.get("a"), Some(0.02));
        assert_eq!(prices["c5.large"].on_demand_price, Some(0.08));
    }
}
