use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::types::ZoneId;

/// Spot price per availability zone for one instance type.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpotPriceInfo(BTreeMap<ZoneId, f64>);

impl SpotPriceInfo {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Record the price for a zone. Negative prices are ignored.
    pub fn insert(&mut self, zone: impl Into<ZoneId>, price: f64) {
        if price >= 0.0 {
            self.0.insert(zone.into(), price);
        }
    }

    pub fn get(&self, zone: &str) -> Option<f64> {
        self.0.get(zone).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ZoneId, f64)> {
        self.0.iter().map(|(zone, price)| (zone, *price))
    }

    /// Average price over the requested zones that have a cached price.
    ///
    /// Zones without a price are excluded from the average; `None` when no
    /// requested zone has one.
    pub fn average_over<S: AsRef<str>>(&self, zones: &[S]) -> Option<f64> {
        let matched: Vec<f64> = zones
            .iter()
            .filter_map(|zone| self.get(zone.as_ref()))
            .collect();

        if matched.is_empty() {
            None
        } else {
            Some(matched.iter().sum::<f64>() / matched.len() as f64)
        }
    }
}

impl<Z: Into<ZoneId>> FromIterator<(Z, f64)> for SpotPriceInfo {
    fn from_iter<T: IntoIterator<Item = (Z, f64)>>(iter: T) -> Self {
        let mut info = Self::new();
        for (zone, price) in iter {
            info.insert(zone, price);
        }
        info
    }
}

/// Price information of one instance type in one region.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Price {
    /// On-demand price, `None` when unknown or not applicable
    #[serde(default, with = "unknown_as_negative")]
    pub on_demand_price: Option<f64>,

    #[serde(default)]
    pub spot_price: SpotPriceInfo,
}

impl Price {
    pub fn on_demand(price: f64) -> Self {
        Self {
            on_demand_price: Some(price),
            spot_price: SpotPriceInfo::new(),
        }
    }

    pub fn spot(spot_price: SpotPriceInfo) -> Self {
        Self {
            on_demand_price: None,
            spot_price,
        }
    }
}

/// Serde adapter writing an unknown price as `-1` and reading any negative
/// number (or null) back as unknown.
pub(crate) mod unknown_as_negative {
    use serde::{Deserialize, Deserializer, Serializer};

    const UNKNOWN: f64 = -1.0;

    pub fn serialize<S: Serializer>(value: &Option<f64>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.unwrap_or(UNKNOWN))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
        let value = Option::<f64>::deserialize(deserializer)?;
        Ok(value.filter(|price| *price >= 0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_average_excludes_unmatched_zones() {
        let spot: SpotPriceInfo = [("z1", 0.10), ("z3", 0.30)].into_iter().collect();

        let avg = spot.average_over(&["z1", "z2"]).unwrap();
        assert!((avg - 0.10).abs() < 1e-9);

        let avg = spot.average_over(&["z1", "z3"]).unwrap();
        assert!((avg - 0.20).abs() < 1e-9);

        assert_eq!(spot.average_over(&["z2"]), None);
        assert_eq!(spot.average_over::<&str>(&[]), None);
    }

    #[test]
    fn test_negative_spot_price_ignored() {
        let mut spot = SpotPriceInfo::new();
        spot.insert("z1", -0.5);
        assert!(spot.is_empty());
    }

    #[test]
    fn test_price_sentinel_round_trip() {
        let price = Price::spot([("z1", 0.2)].into_iter().collect());
        let json = serde_json::to_string(&price).unwrap();
        assert!(json.contains("\"onDemandPrice\":-1.0"));

        let back: Price = serde_json::from_str(&json).unwrap();
        assert_eq!(back, price);

        let missing: Price = serde_json::from_str(r#"{"spotPrice":{}}"#).unwrap();
        assert_eq!(missing.on_demand_price, None);
    }
}
