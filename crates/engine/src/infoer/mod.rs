//! Provider adapter abstractions.
//!
//! This module contains:
//! - The `Infoer` trait that all provider adapters implement
//! - Adapter capabilities and request limits
//! - The catalog-backed adapter
//! - The registry of adapters by provider name
//!
//! # Architecture
//!
//! The adapter system is designed to be:
//! - **Provider-agnostic**: The engine never switches on a provider name
//! - **Extensible**: New providers are added by implementing `Infoer`
//! - **Bounded**: Adapters declare their own concurrency ceiling

mod capabilities;
mod catalog;
mod registry;
mod traits;

pub use capabilities::{InfoerCapabilities, RequestLimits};
pub use catalog::{Catalog, CatalogInfoer, CatalogRegion};
pub use registry::InfoerRegistry;
pub use traits::{Infoer, PriceDescriptor};
