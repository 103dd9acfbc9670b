//! Persisted record shapes
//!
//! Each layout has its own record struct. `Document` is what a container
//! actually holds.

use crate::types::{Layout, PartitionId, Status, Timestamp};
use serde::{Deserialize, Serialize};

/// Flat-snapshot record: exactly one per entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    pub entity_id: String,
    pub partition_id: PartitionId,
    pub status: Status,
    pub event_time: Timestamp,
    #[serde(default)]
    pub details: Option<ItemDetails>,
}

/// Append-only record: one per lifecycle event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub entity_id: String,
    pub partition_id: PartitionId,
    pub timestamp: Timestamp,
    pub status: Status,
}

/// A document stored in a container
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Document {
    Snapshot(SnapshotRecord),
    Event(EventRecord),
}

impl Document {
    pub fn entity_id(&self) -> &str {
        match self {
            Document::Snapshot(r) => &r.entity_id,
            Document::Event(r) => &r.entity_id,
        }
    }

    pub fn partition_id(&self) -> PartitionId {
        match self {
            Document::Snapshot(r) => r.partition_id,
            Document::Event(r) => r.partition_id,
        }
    }

    pub fn status(&self) -> Status {
        match self {
            Document::Snapshot(r) => r.status,
            Document::Event(r) => r.status,
        }
    }

    /// Event time of a snapshot, timestamp of an event
    pub fn time(&self) -> Timestamp {
        match self {
            Document::Snapshot(r) => r.event_time,
            Document::Event(r) => r.timestamp,
        }
    }

    /// The layout this document belongs to
    pub fn layout(&self) -> Layout {
        match self {
            Document::Snapshot(_) => Layout::FlatSnapshot,
            Document::Event(_) => Layout::AppendOnly,
        }
    }
}

impl From<SnapshotRecord> for Document {
    fn from(record: SnapshotRecord) -> Self {
        Document::Snapshot(record)
    }
}

impl From<EventRecord> for Document {
    fn from(record: EventRecord) -> Self {
        Document::Event(record)
    }
}

/// Item details attached to flat-snapshot records
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemDetails {
    pub carrier: String,
    pub is_return: bool,
    pub custom_item_id: String,
    pub merchant_name: String,
    pub sender: Sender,
    pub receiver: Receiver,
    pub product: Product,
    pub value: Money,
    pub weight_kg: f64,
    pub dimensions: Dimensions,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub street: String,
    pub suburb: String,
    pub city: String,
    pub postcode: String,
    pub country: String,
    pub address_id: String,
    pub dpid: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sender {
    pub company_name: String,
    pub address: Address,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receiver {
    pub name: String,
    pub phone: String,
    pub address: Address,
}

/// Delivery product and its option flags
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub service_code: String,
    pub description: String,
    pub service_standard: String,
    pub sla_days: u32,
    pub is_signature_required: bool,
    pub is_photo_required: bool,
    pub is_age_restricted: bool,
    pub is_rural: bool,
    pub is_saturday: bool,
    pub is_evening: bool,
    pub is_no_atl: bool,
    pub is_dangerous_goods: bool,
    pub is_xl: bool,
    /// Initial estimated delivery date
    pub initial_edd: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Money {
    pub amount: f64,
    pub currency: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub length_mm: u32,
    pub width_mm: u32,
    pub height_mm: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_document_accessors() {
        let at = Utc.with_ymd_and_hms(2025, 3, 2, 10, 0, 0).unwrap();
        let doc: Document = EventRecord {
            entity_id: "NZ100000001".to_string(),
            partition_id: 1000011,
            timestamp: at,
            status: Status::InDepot,
        }
        .into();

        assert_eq!(doc.entity_id(), "NZ100000001");
        assert_eq!(doc.partition_id(), 1000011);
        assert_eq!(doc.status(), Status::InDepot);
        assert_eq!(doc.time(), at);
        assert_eq!(doc.layout(), Layout::AppendOnly);
    }

    #[test]
    fn test_snapshot_details_default_to_none() {
        let record = SnapshotRecord {
            entity_id: "NZ100000002".to_string(),
            partition_id: 2000011,
            status: Status::Delivered,
            event_time: Utc.with_ymd_and_hms(2025, 3, 5, 8, 30, 0).unwrap(),
            details: None,
        };

        let json = r#"{"entity_id":"NZ100000002","partition_id":2000011,"status":"delivered","event_time":"2025-03-05T08:30:00Z"}"#;
        let parsed: SnapshotRecord = serde_json::from_str(json).unwrap();
        assert_eq!(parsed, record);
    }
}
