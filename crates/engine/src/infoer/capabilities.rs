//! Adapter capabilities and request limits.
//!
//! This module defines structures describing what a provider adapter can do
//! and how hard the engine may call it.

/// Describes the optional capabilities of a provider adapter.
#[derive(Clone, Debug, Default)]
pub struct InfoerCapabilities {
    /// Whether on-demand prices are fetched per batch of instance types
    /// (`get_on_demand_prices`). Adapters that price VMs inside
    /// `get_virtual_machines` leave this off.
    pub batch_pricing: bool,

    /// Whether the adapter lists machine images.
    pub images: bool,
}

/// Request limits of a provider adapter.
///
/// The adapter owns its true concurrency ceiling (e.g., the size of its SDK
/// worker pool); the engine never issues more concurrent requests than this.
#[derive(Clone, Debug)]
pub struct RequestLimits {
    /// Maximum requests allowed per minute.
    pub requests_per_minute: u32,

    /// Maximum concurrent requests to this provider.
    pub max_concurrency: usize,
}

impl Default for RequestLimits {
    fn default() -> Self {
        Self {
            requests_per_minute: 600,
            max_concurrency: 4,
        }
    }
}
