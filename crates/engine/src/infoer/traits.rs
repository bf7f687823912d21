//! Provider adapter trait definition.
//!
//! This module defines the `Infoer` trait that every cloud provider adapter
//! implements. The engine depends only on this contract.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;

use crate::errors::{CloudInfoError, Result};
use crate::models::{Image, InstanceType, LocationVersion, Price, RegionId, Service, VmInfo, ZoneId};

use super::capabilities::{InfoerCapabilities, RequestLimits};

/// Full price descriptor returned by [`Infoer::initialize`]: region -> instance type -> price.
pub type PriceDescriptor = HashMap<RegionId, HashMap<InstanceType, Price>>;

/// Trait for cloud provider adapters.
///
/// Every method either returns a fully populated result or a typed
/// [`CloudInfoError`]. Partial success (some instance types priced, others
/// not) is expressed by returning the recovered subset, never by failing the
/// whole call.
///
/// # Example
///
/// ```ignore
/// use async_trait::async_trait;
/// use cloudinfo_engine::infoer::Infoer;
///
/// struct MyCloud {
///     client: MyCloudClient,
/// }
///
/// #[async_trait]
/// impl Infoer for MyCloud {
///     fn id(&self) -> &str {
///         "mycloud"
///     }
///
///     fn has_short_lived_price_info(&self) -> bool {
///         true
///     }
///
///     // ... implement the catalog and price methods
/// }
/// ```
#[async_trait]
pub trait Infoer: Send + Sync {
    /// Unique provider name (e.g., "amazon", "alibaba").
    ///
    /// Used as cache key, in logs and in refresh events.
    fn id(&self) -> &str;

    /// Whether spot prices change often enough to be refreshed on the short
    /// spot-price interval, independently of the VM catalog.
    fn has_short_lived_price_info(&self) -> bool;

    /// Describes the optional capabilities of this adapter.
    fn capabilities(&self) -> InfoerCapabilities {
        InfoerCapabilities::default()
    }

    /// Request limits the engine must respect when calling this adapter.
    fn request_limits(&self) -> RequestLimits {
        RequestLimits::default()
    }

    /// Services offered by the provider.
    fn services(&self) -> Vec<Service> {
        vec![Service::new("compute")]
    }

    /// Called once per renewal so an adapter can download a large price
    /// descriptor. `None` when the adapter has nothing to preload.
    async fn initialize(&self) -> Result<Option<PriceDescriptor>> {
        Ok(None)
    }

    /// Instance types available in a region, with capacity figures and zones.
    async fn get_virtual_machines(&self, region: &str) -> Result<Vec<VmInfo>>;

    /// Current prices of every instance type in a region, spot prices per zone.
    async fn get_current_prices(&self, region: &str) -> Result<HashMap<InstanceType, Price>>;

    /// Availability zones of a region.
    async fn get_zones(&self, region: &str) -> Result<Vec<ZoneId>>;

    /// Regions where the service is offered: region id -> display name.
    async fn get_regions(&self, service: &str) -> Result<BTreeMap<RegionId, String>>;

    /// Fetch on-demand prices for one batch of instance types.
    ///
    /// The result must be aligned with `instance_types`. An adapter whose
    /// provider refuses the whole batch because of one bad member reports
    /// [`ErrorCode::InvalidParameter`](crate::errors::ErrorCode::InvalidParameter).
    async fn get_on_demand_prices(
        &self,
        region: &str,
        instance_types: &[InstanceType],
    ) -> Result<Vec<f64>> {
        let _ = (region, instance_types);
        Err(CloudInfoError::UnsupportedService {
            provider: self.id().to_string(),
            service: "on-demand batch pricing".to_string(),
        })
    }

    /// Machine images supported by a service in a region.
    async fn get_service_images(&self, service: &str, region: &str) -> Result<Vec<Image>> {
        let _ = region;
        Err(CloudInfoError::UnsupportedService {
            provider: self.id().to_string(),
            service: service.to_string(),
        })
    }

    /// Service versions available in a region.
    async fn get_versions(&self, service: &str, region: &str) -> Result<Vec<LocationVersion>> {
        let _ = (service, region);
        Ok(Vec::new())
    }
}
