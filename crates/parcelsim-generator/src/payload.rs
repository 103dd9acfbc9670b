//! Optional per-entity item details for flat-snapshot records

use crate::allocation::Allocation;
use chrono::Duration;
use parcelsim_core::{
    Address, Dimensions, ItemDetails, Money, Product, Receiver, Sender, Timestamp,
};
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const CARRIER: &str = "CourierPost";
const COUNTRY: &str = "New Zealand";
const CURRENCY: &str = "NZD";

const LOCATIONS: &[(&str, [&str; 5])] = &[
    ("Auckland", ["2013", "2025", "2024", "2022", "2018"]),
    ("Wellington", ["6011", "6012", "6021", "6022", "6023"]),
    ("Christchurch", ["8011", "8013", "8014", "8022", "8024"]),
    ("Hamilton", ["3200", "3204", "3206", "3210", "3214"]),
    ("Tauranga", ["3110", "3112", "3116", "3118", "3120"]),
];

const STREETS: &[&str] = &["Queen St", "King St", "Victoria St", "Albert St", "High St", "Main St"];
const FIRST_NAMES: &[&str] = &["John", "Jane", "James", "Sarah", "Michael"];
const LAST_NAMES: &[&str] = &["Smith", "Johnson", "Williams", "Brown", "Jones"];

/// (service code, description, service standard, SLA days)
const PRODUCTS: &[(&str, &str, &str, u32)] = &[
    ("CPOLP", "Courier Parcel", "OVERNIGHT", 1),
    ("CPOLR", "Rural Parcel", "2-DAY", 2),
    ("CPOLS", "Saturday Delivery", "SATURDAY", 1),
];
const SATURDAY_SERVICE: &str = "CPOLS";

/// Source of optional item details attached to generated records
pub trait PayloadProvider: Send + Sync {
    /// Details for one entity whose record is stamped `at`
    fn details(
        &self,
        entity_id: &str,
        allocation: &Allocation,
        at: Timestamp,
        rng: &mut dyn RngCore,
    ) -> Option<ItemDetails>;
}

/// Attaches nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPayload;

impl PayloadProvider for NoPayload {
    fn details(&self, _: &str, _: &Allocation, _: Timestamp, _: &mut dyn RngCore) -> Option<ItemDetails> {
        None
    }
}

/// Courier item details: addresses, product options, value and size
#[derive(Debug, Clone, Copy, Default)]
pub struct ItemDetailPayload;

impl ItemDetailPayload {
    fn address(rng: &mut dyn RngCore) -> Address {
        let (city, postcodes) = LOCATIONS[rng.gen_range(0..LOCATIONS.len())];
        Address {
            street: format!(
                "{} {}",
                rng.gen_range(1..=2000),
                STREETS[rng.gen_range(0..STREETS.len())]
            ),
            suburb: format!("{} North", city),
            city: city.to_string(),
            postcode: postcodes[rng.gen_range(0..postcodes.len())].to_string(),
            country: COUNTRY.to_string(),
            address_id: rng.gen_range(1_000_000..=9_999_999u32).to_string(),
            dpid: rng.gen_range(100_000..=999_999u32).to_string(),
        }
    }

    fn product(rng: &mut dyn RngCore, at: Timestamp) -> Product {
        let (code, description, standard, sla_days) = PRODUCTS[rng.gen_range(0..PRODUCTS.len())];
        Product {
            service_code: code.to_string(),
            description: description.to_string(),
            service_standard: standard.to_string(),
            sla_days,
            is_signature_required: rng.gen_bool(0.3),
            is_photo_required: rng.gen_bool(0.4),
            is_age_restricted: rng.gen_bool(0.1),
            is_rural: rng.gen_bool(0.2),
            is_saturday: code == SATURDAY_SERVICE,
            is_evening: rng.gen_bool(0.15),
            is_no_atl: rng.gen_bool(0.05),
            is_dangerous_goods: rng.gen_bool(0.02),
            is_xl: rng.gen_bool(0.1),
            initial_edd: at + Duration::days(i64::from(sla_days)),
        }
    }
}

impl PayloadProvider for ItemDetailPayload {
    fn details(
        &self,
        _entity_id: &str,
        allocation: &Allocation,
        at: Timestamp,
        rng: &mut dyn RngCore,
    ) -> Option<ItemDetails> {
        let merchant = allocation.display_name();
        let receiver_name = format!(
            "{} {}",
            FIRST_NAMES[rng.gen_range(0..FIRST_NAMES.len())],
            LAST_NAMES[rng.gen_range(0..LAST_NAMES.len())]
        );

        Some(ItemDetails {
            carrier: CARRIER.to_string(),
            is_return: rng.gen_bool(0.05),
            custom_item_id: rng.gen_range(20_000_000..=29_999_999u32).to_string(),
            sender: Sender {
                company_name: merchant.to_uppercase(),
                address: Self::address(rng),
            },
            merchant_name: merchant,
            receiver: Receiver {
                name: receiver_name,
                phone: format!("02{}", rng.gen_range(10_000_000..=99_999_999u32)),
                address: Self::address(rng),
            },
            product: Self::product(rng, at),
            value: Money {
                amount: (rng.gen_range(1.0..500.0f64) * 100.0).round() / 100.0,
                currency: CURRENCY.to_string(),
            },
            weight_kg: (rng.gen_range(0.1..30.0f64) * 100.0).round() / 100.0,
            dimensions: Dimensions {
                length_mm: rng.gen_range(100..=1000),
                width_mm: rng.gen_range(100..=1000),
                height_mm: rng.gen_range(100..=1000),
            },
        })
    }
}

/// Payload selection in configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PayloadKind {
    #[default]
    None,
    ItemDetail,
}

impl PayloadKind {
    pub fn provider(&self) -> Box<dyn PayloadProvider> {
        match self {
            PayloadKind::None => Box::new(NoPayload),
            PayloadKind::ItemDetail => Box::new(ItemDetailPayload),
        }
    }
}

impl fmt::Display for PayloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PayloadKind::None => write!(f, "none"),
            PayloadKind::ItemDetail => write!(f, "item-detail"),
        }
    }
}

impl FromStr for PayloadKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "none" => Ok(PayloadKind::None),
            "item-detail" | "item" | "details" => Ok(PayloadKind::ItemDetail),
            other => Err(format!("unknown payload kind: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rand::thread_rng;

    fn allocation(name: Option<&str>) -> Allocation {
        Allocation {
            partition_id: 1_000_013,
            volume: 10,
            id_start: 100_000_001,
            tail: name.is_none(),
            name: name.map(str::to_string),
        }
    }

    #[test]
    fn test_no_payload() {
        let at = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
        assert!(NoPayload
            .details("NZ100000001", &allocation(None), at, &mut thread_rng())
            .is_none());
    }

    #[test]
    fn test_item_details_shape() {
        let at = Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap();
        let mut rng = thread_rng();
        for _ in 0..200 {
            let details = ItemDetailPayload
                .details("NZ100000001", &allocation(Some("Mighty Ape")), at, &mut rng)
                .unwrap();
            assert_eq!(details.carrier, "CourierPost");
            assert_eq!(details.merchant_name, "Mighty Ape");
            assert_eq!(details.sender.company_name, "MIGHTY APE");
            assert_eq!(details.value.currency, "NZD");
            assert!(details.value.amount >= 1.0 && details.value.amount <= 500.0);
            assert!(details.weight_kg >= 0.1 && details.weight_kg <= 30.0);
            assert!(details.receiver.phone.starts_with("02"));
            assert_eq!(details.product.is_saturday, details.product.service_code == "CPOLS");
            assert_eq!(
                details.product.initial_edd,
                at + Duration::days(i64::from(details.product.sla_days))
            );
            assert!((100..=1000).contains(&details.dimensions.height_mm));
        }
    }

    #[test]
    fn test_tail_merchant_name() {
        let at = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
        let details = ItemDetailPayload
            .details("NZ100000001", &allocation(None), at, &mut thread_rng())
            .unwrap();
        assert_eq!(details.merchant_name, "Merchant 1000013");
    }

    #[test]
    fn test_kind_parse() {
        assert_eq!("item_detail".parse::<PayloadKind>().unwrap(), PayloadKind::ItemDetail);
        assert_eq!("none".parse::<PayloadKind>().unwrap(), PayloadKind::None);
        assert!("blob".parse::<PayloadKind>().is_err());
    }
}
