//! Cloudinfo aggregation engine
//!
//! Aggregates compute instance capabilities and prices of several cloud
//! providers behind one query surface. Provider data is renewed on a schedule
//! into an in-memory cache, so lookups never wait on a provider.
//!
//! # Architecture
//!
//! ```text
//! +------------------+     +------------------+
//! | RenewalScheduler | --> |    Refresher     |  (one cycle per key)
//! +------------------+     +------------------+
//!                            |       |
//!                            v       v
//!            +--------------+   +-------------------+
//!            |    Infoer    |<--| BatchPriceFetcher |  (batches of 25, per-item fallback)
//!            +--------------+   +-------------------+
//!                            |
//!                            v
//!                  +------------------+
//!                  |   ProductCache   |  (Arc snapshots per provider/region)
//!                  +------------------+
//!                            |
//!                            v
//!                  +------------------+
//!                  |    CloudInfo     |  (read-only queries)
//!                  +------------------+
//! ```
//!
//! # Core Types
//!
//! - [`Infoer`] - Provider adapter contract
//! - [`VmInfo`] - Capabilities of an instance type in a region
//! - [`Price`] - On-demand and per-zone spot prices
//! - [`CloudInfo`] - Query façade and scheduler entry point
//! - [`EngineConfig`] - Renewal cadence, batching and classification rules

pub mod cache;
pub mod classify;
pub mod cloudinfo;
pub mod config;
pub mod errors;
pub mod events;
pub mod infoer;
pub mod models;
pub mod pricing;
pub mod renewal;
pub mod shutdown;

pub use cloudinfo::CloudInfo;
pub use config::{ClassifierConfig, EngineConfig};
pub use errors::{CloudInfoError, ErrorCode, MappingError, Result, RetryClass};
pub use events::{
    LoggingEventSink, MockEventSink, NoOpEventSink, RefreshEvent, RefreshEventSink, RefreshKind,
    RefreshOutcome,
};
pub use infoer::{Catalog, CatalogInfoer, Infoer, InfoerCapabilities, RequestLimits};
pub use models::{
    AttrValue, Category, Image, LocationVersion, NetworkPerfTier, Price, ProductDetails, Provider,
    Service, SpotPriceInfo, Version, VmInfo, ZonePrice,
};
pub use renewal::{RenewalScheduler, SchedulerHandle};
pub use shutdown::CancellationSignal;
