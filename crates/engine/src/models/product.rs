use serde::{Deserialize, Serialize};

use super::price::Price;
use super::types::ZoneId;
use super::vm::VmInfo;

/// Spot price of a product in a single zone.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ZonePrice {
    pub zone: ZoneId,
    pub price: f64,
}

/// Extended view of an instance type: capabilities plus current pricing.
///
/// Read-side projection only, always derived from a cached [`VmInfo`] and its [`Price`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDetails {
    #[serde(flatten)]
    pub vm: VmInfo,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub burst: bool,

    #[serde(default, rename = "spotPrice", skip_serializing_if = "Vec::is_empty")]
    pub spot_info: Vec<ZonePrice>,
}

impl ProductDetails {
    /// Project a VM and its (optional) price into product details.
    ///
    /// A cached on-demand price wins over the one carried by the VM itself.
    pub fn new(vm: &VmInfo, price: Option<&Price>) -> Self {
        let mut vm = vm.clone();
        let mut spot_info = Vec::new();

        if let Some(price) = price {
            if price.on_demand_price.is_some() {
                vm.on_demand_price = price.on_demand_price;
            }
            spot_info = price
                .spot_price
                .iter()
                .map(|(zone, price)| ZonePrice {
                    zone: zone.clone(),
                    price,
                })
                .collect();
        }

        Self {
            burst: vm.is_burst(),
            vm,
            spot_info,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, SpotPriceInfo};

    #[test]
    fn test_details_derive_burst_and_zone_prices() {
        let mut vm = VmInfo::new("t3.micro", 2.0, 1.0).with_on_demand_price(0.0104);
        vm.category = Category::Burst;
        let price = Price {
            on_demand_price: None,
            spot_price: [("eu-west-1b", 0.004), ("eu-west-1a", 0.003)]
                .into_iter()
                .collect::<SpotPriceInfo>(),
        };

        let details = ProductDetails::new(&vm, Some(&price));

        assert!(details.burst);
        assert_eq!(details.vm.on_demand_price, Some(0.0104));
        assert_eq!(details.spot_info.len(), 2);
        assert_eq!(details.spot_info[0].zone, "eu-west-1a");
    }

    #[test]
    fn test_cached_on_demand_price_wins() {
        let vm = VmInfo::new("m5.large", 2.0, 8.0);
        let details = ProductDetails::new(&vm, Some(&Price::on_demand(0.096)));
        assert_eq!(details.vm.on_demand_price, Some(0.096));
        assert!(details.spot_info.is_empty());
    }
}
