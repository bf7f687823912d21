//! Network performance classification.
//!
//! Providers report throughput as free-form strings ("1.2 Gbit/s",
//! "Up to 10 Gigabit", "500 Mbps"). The [`ThresholdMapper`] parses them into
//! Gbit/s and maps the value onto one of the four [`NetworkPerfTier`]s using
//! provider-specific ranges.

use serde::{Deserialize, Serialize};

use crate::errors::MappingError;
use crate::models::NetworkPerfTier;

/// Maps a raw network performance string to a tier.
pub trait NetworkPerfMapper: Send + Sync {
    fn map_network_perf(&self, raw: &str) -> Result<NetworkPerfTier, MappingError>;
}

/// A throughput range `[from, to)` in Gbit/s. `to: None` is unbounded.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TierRange {
    pub tier: NetworkPerfTier,
    pub from: f64,
    #[serde(default)]
    pub to: Option<f64>,
}

impl TierRange {
    pub fn new(tier: NetworkPerfTier, from: f64, to: Option<f64>) -> Self {
        Self { tier, from, to }
    }

    fn contains(&self, gbits: f64) -> bool {
        gbits >= self.from && self.to.map_or(true, |to| gbits < to)
    }
}

/// Range-based network tier mapper.
#[derive(Clone, Debug)]
pub struct ThresholdMapper {
    ranges: Vec<TierRange>,
}

impl ThresholdMapper {
    /// Build a mapper from ranges, validating that they are contiguous,
    /// non-overlapping, start at 0, end unbounded and never lower the tier.
    pub fn new(mut ranges: Vec<TierRange>) -> Result<Self, MappingError> {
        if ranges.is_empty() {
            return Err(MappingError::InvalidThresholds("no ranges".to_string()));
        }

        ranges.sort_by(|a, b| a.from.total_cmp(&b.from));

        if ranges[0].from != 0.0 {
            return Err(MappingError::InvalidThresholds(format!(
                "first range starts at {} instead of 0",
                ranges[0].from
            )));
        }

        for pair in ranges.windows(2) {
            let (prev, next) = (&pair[0], &pair[1]);
            match prev.to {
                None => {
                    return Err(MappingError::InvalidThresholds(format!(
                        "unbounded {} range followed by another range",
                        prev.tier
                    )))
                }
                Some(to) if to != next.from => {
                    return Err(MappingError::InvalidThresholds(format!(
                        "{} ends at {} but {} starts at {}",
                        prev.tier, to, next.tier, next.from
                    )))
                }
                Some(_) => {}
            }
            if next.tier < prev.tier {
                return Err(MappingError::InvalidThresholds(format!(
                    "{} above {} is not monotonic",
                    next.tier, prev.tier
                )));
            }
        }

        for range in &ranges {
            if let Some(to) = range.to {
                if to <= range.from {
                    return Err(MappingError::InvalidThresholds(format!(
                        "empty {} range [{}, {})",
                        range.tier, range.from, to
                    )));
                }
            }
        }

        if ranges[ranges.len() - 1].to.is_some() {
            return Err(MappingError::InvalidThresholds(
                "last range must be unbounded".to_string(),
            ));
        }

        Ok(Self { ranges })
    }

    /// Default thresholds: low (0, 1), medium [1, 5), high [5, 10), extra [10, ∞).
    pub fn standard() -> Self {
        Self {
            ranges: default_ranges(),
        }
    }

    /// Tier for an already parsed throughput in Gbit/s.
    pub fn tier_for(&self, gbits: f64) -> Result<NetworkPerfTier, MappingError> {
        if gbits.is_nan() || gbits <= 0.0 {
            return Err(MappingError::NetworkPerfOutOfRange(gbits));
        }
        self.ranges
            .iter()
            .find(|range| range.contains(gbits))
            .map(|range| range.tier)
            .ok_or(MappingError::NetworkPerfOutOfRange(gbits))
    }

    pub fn ranges(&self) -> &[TierRange] {
        &self.ranges
    }
}

impl Default for ThresholdMapper {
    fn default() -> Self {
        Self::standard()
    }
}

impl NetworkPerfMapper for ThresholdMapper {
    fn map_network_perf(&self, raw: &str) -> Result<NetworkPerfTier, MappingError> {
        let gbits = parse_throughput(raw)?;
        self.tier_for(gbits)
    }
}

/// The standard tier ranges.
pub fn default_ranges() -> Vec<TierRange> {
    vec![
        TierRange::new(NetworkPerfTier::Low, 0.0, Some(1.0)),
        TierRange::new(NetworkPerfTier::Medium, 1.0, Some(5.0)),
        TierRange::new(NetworkPerfTier::High, 5.0, Some(10.0)),
        TierRange::new(NetworkPerfTier::Extra, 10.0, None),
    ]
}

/// Parse a throughput string into Gbit/s.
///
/// Accepts an optional "up to" prefix, a decimal number and a unit
/// (Gbit/s, Gbps, Gigabit, Mbit/s, Mbps, Megabit). A bare number is Gbit/s.
pub fn parse_throughput(raw: &str) -> Result<f64, MappingError> {
    let unparseable = || MappingError::UnparseableNetworkPerf(raw.to_string());

    let normalized = raw.trim().to_ascii_lowercase();
    let rest = normalized
        .strip_prefix("up to")
        .map(str::trim_start)
        .unwrap_or(&normalized);

    let split = rest
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(rest.len());
    let (number, unit) = rest.split_at(split);
    let value: f64 = number.parse().map_err(|_| unparseable())?;

    match unit.trim() {
        "" | "g" | "gb" | "gbit/s" | "gbps" | "gb/s" | "gigabit" | "gigabits" => Ok(value),
        "m" | "mb" | "mbit/s" | "mbps" | "mb/s" | "megabit" | "megabits" => Ok(value / 1000.0),
        _ => Err(unparseable()),
    }
}
