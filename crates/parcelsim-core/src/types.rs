//! Core data types for ParcelSim

use crate::error::{CoreError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// UTC timestamp, second granularity for generated data
pub type Timestamp = DateTime<Utc>;

/// Partition (account) identifier
pub type PartitionId = u64;

/// Tracking status of a parcel.
///
/// Variants are declared in code order, so the derived `Ord` sorts by code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    PickedUp,
    InTransit,
    InDepot,
    OutForDelivery,
    Delivered,
    AttemptedDelivery,
}

impl Status {
    /// Numeric status code as persisted
    pub fn code(&self) -> u16 {
        match self {
            Status::PickedUp => 100,
            Status::InTransit => 200,
            Status::InDepot => 300,
            Status::OutForDelivery => 400,
            Status::Delivered => 500,
            Status::AttemptedDelivery => 600,
        }
    }

    /// Human readable label
    pub fn label(&self) -> &'static str {
        match self {
            Status::PickedUp => "Picked Up",
            Status::InTransit => "In Transit",
            Status::InDepot => "In Depot",
            Status::OutForDelivery => "Out for Delivery",
            Status::Delivered => "Delivered",
            Status::AttemptedDelivery => "Attempted Delivery",
        }
    }

    /// Look up a status by its numeric code
    pub fn from_code(code: u16) -> Result<Self> {
        Self::all()
            .iter()
            .copied()
            .find(|s| s.code() == code)
            .ok_or(CoreError::UnknownStatusCode(code))
    }

    /// Returns all statuses in code order.
    pub fn all() -> &'static [Status] {
        &[
            Status::PickedUp,
            Status::InTransit,
            Status::InDepot,
            Status::OutForDelivery,
            Status::Delivered,
            Status::AttemptedDelivery,
        ]
    }

    /// Whether no further events may follow this status
    pub fn is_terminal(&self) -> bool {
        matches!(self, Status::Delivered)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Status {
    type Err = CoreError;

    /// Accepts a code ("500"), a label ("Delivered") or a snake/kebab-case name.
    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if let Ok(code) = trimmed.parse::<u16>() {
            return Status::from_code(code);
        }

        let normalized: String = trimmed
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();

        Status::all()
            .iter()
            .copied()
            .find(|s| {
                let label: String = s
                    .label()
                    .chars()
                    .filter(|c| c.is_ascii_alphanumeric())
                    .map(|c| c.to_ascii_lowercase())
                    .collect();
                label == normalized
            })
            .ok_or_else(|| CoreError::UnknownStatusLabel(s.to_string()))
    }
}

/// One step of an entity's lifecycle before it is tagged with ids
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    pub status: Status,
    pub at: Timestamp,
}

impl StatusChange {
    pub fn new(status: Status, at: Timestamp) -> Self {
        Self { status, at }
    }
}

/// Persistence layout of a container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Layout {
    /// One record per entity
    FlatSnapshot,
    /// One record per event, keyed by entity id, ordered by time
    AppendOnly,
}

impl Layout {
    pub fn as_str(&self) -> &'static str {
        match self {
            Layout::FlatSnapshot => "flat-snapshot",
            Layout::AppendOnly => "append-only",
        }
    }
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Layout {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "flat" | "flat-snapshot" | "flat_snapshot" | "snapshot" => Ok(Layout::FlatSnapshot),
            "append" | "append-only" | "append_only" | "log" => Ok(Layout::AppendOnly),
            other => Err(CoreError::UnknownLayout(other.to_string())),
        }
    }
}

/// Generation window: events fall in `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: Timestamp,
    pub end: Timestamp,
}

impl TimeWindow {
    /// Create a window. `start > end` is rejected; `start == end` is a
    /// degenerate but valid window where every draw collapses to `start`.
    pub fn new(start: Timestamp, end: Timestamp) -> Result<Self> {
        if start > end {
            return Err(CoreError::InvalidWindow {
                start: start.to_rfc3339(),
                end: end.to_rfc3339(),
            });
        }
        Ok(Self { start, end })
    }

    /// Number of calendar days the window names, counting both end dates.
    ///
    /// 2025-03-01 .. 2025-03-07 is a 7-day window.
    pub fn calendar_days(&self) -> u32 {
        let days = (self.end.date_naive() - self.start.date_naive()).num_days() + 1;
        days.max(0) as u32
    }

    /// Whether draws inside this window collapse to its start
    pub fn is_degenerate(&self) -> bool {
        self.start >= self.end
    }

    pub fn contains(&self, ts: Timestamp) -> bool {
        ts >= self.start && (ts < self.end || (self.is_degenerate() && ts == self.start))
    }
}

/// Inclusive time filter `[from, to]` used by queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeBounds {
    pub from: Timestamp,
    pub to: Timestamp,
}

impl TimeBounds {
    pub fn new(from: Timestamp, to: Timestamp) -> Result<Self> {
        if from > to {
            return Err(CoreError::InvalidTimeBounds {
                from: from.to_rfc3339(),
                to: to.to_rfc3339(),
            });
        }
        Ok(Self { from, to })
    }

    /// Bounds covering whole calendar days, from 00:00:00 of `from` to
    /// 23:59:59 of `to`.
    pub fn whole_days(from: chrono::NaiveDate, to: chrono::NaiveDate) -> Result<Self> {
        let start = from.and_hms_opt(0, 0, 0).map(|t| t.and_utc());
        let end = to.and_hms_opt(23, 59, 59).map(|t| t.and_utc());
        match (start, end) {
            (Some(start), Some(end)) => Self::new(start, end),
            _ => Err(CoreError::InvalidTimeBounds {
                from: from.to_string(),
                to: to.to_string(),
            }),
        }
    }

    pub fn contains(&self, ts: Timestamp) -> bool {
        ts >= self.from && ts <= self.to
    }
}
