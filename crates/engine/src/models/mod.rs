//! Cloudinfo models
//!
//! This module contains the core data types of the engine:
//! - `types` - Type aliases for identifiers and the attribute keys
//! - `vm` - Instance type capabilities (VmInfo), Category and NetworkPerfTier
//! - `price` - Price and per-zone spot prices
//! - `product` - Read-side product details projection
//! - `catalog` - Provider, Service, Image, Version descriptors

mod catalog;
mod price;
mod product;
mod types;
mod vm;

pub use catalog::{AttrValue, Image, LocationVersion, Provider, Service, Version};
pub use price::{Price, SpotPriceInfo};
pub use product::{ProductDetails, ZonePrice};
pub use types::{
    InstanceType, ProviderName, RegionId, ZoneId, CPU, INSTANCE_TYPE_CATEGORY, MEMORY,
    NETWORK_PERF_CATEGORY,
};
pub use vm::{attributes, Category, NetworkPerfTier, VmInfo};
