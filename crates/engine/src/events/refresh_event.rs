//! Refresh event types.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::models::{InstanceType, ProviderName, RegionId, ZoneId};

/// Which part of the cache a cycle renewed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshKind {
    /// Provider-level data: regions, services, images, versions.
    Provider,
    /// Full catalog and price refresh of one region.
    Region,
    /// Spot prices only.
    SpotPrices,
}

/// How a cycle ended.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RefreshOutcome {
    Succeeded,
    /// Committed, but some instance types could not be priced.
    Partial { skipped: usize },
    /// Nothing committed; the previous snapshot keeps being served.
    Failed { error: String },
    /// Another cycle for the same key was still running.
    Suppressed,
    /// Shutdown was requested before commit.
    Cancelled,
}

impl RefreshOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Partial { .. })
    }
}

/// Events emitted by the renewal machinery.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RefreshEvent {
    /// A refresh cycle finished, whatever its outcome.
    CycleCompleted {
        provider: ProviderName,
        /// `None` for provider-level cycles.
        region: Option<RegionId>,
        kind: RefreshKind,
        duration: Duration,
        outcome: RefreshOutcome,
    },

    /// A spot price observed during a refresh.
    SpotPrice {
        provider: ProviderName,
        region: RegionId,
        zone: ZoneId,
        instance_type: InstanceType,
        price: f64,
    },
}

impl RefreshEvent {
    pub fn cycle_completed(
        provider: impl Into<String>,
        region: Option<&str>,
        kind: RefreshKind,
        duration: Duration,
        outcome: RefreshOutcome,
    ) -> Self {
        Self::CycleCompleted {
            provider: provider.into(),
            region: region.map(str::to_string),
            kind,
            duration,
            outcome,
        }
    }

    pub fn spot_price(
        provider: impl Into<String>,
        region: impl Into<String>,
        zone: impl Into<String>,
        instance_type: impl Into<String>,
        price: f64,
    ) -> Self {
        Self::SpotPrice {
            provider: provider.into(),
            region: region.into(),
            zone: zone.into(),
            instance_type: instance_type.into(),
            price,
        }
    }

    pub fn provider(&self) -> &str {
        match self {
            Self::CycleCompleted { provider, .. } | Self::SpotPrice { provider, .. } => provider,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serializes_with_tags() {
        let event = RefreshEvent::cycle_completed(
            "alibaba",
            Some("eu-central-1"),
            RefreshKind::Region,
            Duration::from_millis(1500),
            RefreshOutcome::Failed {
                error: "timeout".to_string(),
            },
        );

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "cycle_completed");
        assert_eq!(json["kind"], "region");
        assert_eq!(json["outcome"]["status"], "failed");
        assert_eq!(event.provider(), "alibaba");
    }

    #[test]
    fn test_committed_outcomes() {
        assert!(RefreshOutcome::Succeeded.is_committed());
        assert!(RefreshOutcome::Partial { skipped: 2 }.is_committed());
        assert!(!RefreshOutcome::Suppressed.is_committed());
        assert!(!RefreshOutcome::Cancelled.is_committed());
    }
}
