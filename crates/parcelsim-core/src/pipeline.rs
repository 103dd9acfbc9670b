//! Aggregation pipeline model
//!
//! A pipeline is an ordered list of stages evaluated by a store against one
//! container. The query planner builds pipelines; the store evaluates them.

use crate::record::Document;
use crate::types::{PartitionId, Status, TimeBounds};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Document field addressable by pipeline stages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    EntityId,
    PartitionId,
    Status,
    Time,
}

impl Field {
    /// Field name as persisted
    pub fn name(&self) -> &'static str {
        match self {
            Field::EntityId => "entity_id",
            Field::PartitionId => "partition_id",
            Field::Status => "status_code",
            Field::Time => "event_time",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// One key of a sort specification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    pub field: Field,
    pub order: SortOrder,
}

impl SortKey {
    pub fn asc(field: Field) -> Self {
        Self {
            field,
            order: SortOrder::Ascending,
        }
    }

    pub fn desc(field: Field) -> Self {
        Self {
            field,
            order: SortOrder::Descending,
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dir = match self.order {
            SortOrder::Ascending => 1,
            SortOrder::Descending => -1,
        };
        write!(f, "{}: {}", self.field, dir)
    }
}

/// Conjunctive match predicate. Absent members match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchSpec {
    pub partitions: Option<BTreeSet<PartitionId>>,
    pub statuses: Option<BTreeSet<Status>>,
    pub time: Option<TimeBounds>,
    /// Only rows flagged latest by a preceding `SetWindowFields` stage
    pub latest_only: bool,
}

impl MatchSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_partitions(mut self, partitions: BTreeSet<PartitionId>) -> Self {
        self.partitions = Some(partitions);
        self
    }

    pub fn with_statuses(mut self, statuses: BTreeSet<Status>) -> Self {
        self.statuses = Some(statuses);
        self
    }

    pub fn with_time(mut self, time: TimeBounds) -> Self {
        self.time = Some(time);
        self
    }

    pub fn latest_only(mut self) -> Self {
        self.latest_only = true;
        self
    }

    /// True when the predicate accepts every row
    pub fn is_empty(&self) -> bool {
        self.partitions.is_none() && self.statuses.is_none() && self.time.is_none() && !self.latest_only
    }

    /// Fields this predicate constrains
    pub fn fields(&self) -> Vec<Field> {
        let mut fields = Vec::new();
        if self.partitions.is_some() {
            fields.push(Field::PartitionId);
        }
        if self.statuses.is_some() {
            fields.push(Field::Status);
        }
        if self.time.is_some() {
            fields.push(Field::Time);
        }
        fields
    }

    /// Evaluate against a document. `is_latest` is the window flag, or
    /// false when no window stage ran.
    pub fn matches(&self, doc: &Document, is_latest: bool) -> bool {
        if self.latest_only && !is_latest {
            return false;
        }
        if let Some(ref partitions) = self.partitions {
            if !partitions.contains(&doc.partition_id()) {
                return false;
            }
        }
        if let Some(ref statuses) = self.statuses {
            if !statuses.contains(&doc.status()) {
                return false;
            }
        }
        if let Some(ref time) = self.time {
            if !time.contains(doc.time()) {
                return false;
            }
        }
        true
    }
}

impl fmt::Display for MatchSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(ref partitions) = self.partitions {
            let ids: Vec<String> = partitions.iter().map(|p| p.to_string()).collect();
            parts.push(format!("{} in [{}]", Field::PartitionId, ids.join(", ")));
        }
        if let Some(ref statuses) = self.statuses {
            let codes: Vec<String> = statuses.iter().map(|s| s.code().to_string()).collect();
            parts.push(format!("{} in [{}]", Field::Status, codes.join(", ")));
        }
        if let Some(ref time) = self.time {
            parts.push(format!(
                "{} in [{}, {}]",
                Field::Time,
                time.from.to_rfc3339(),
                time.to.to_rfc3339()
            ));
        }
        if self.latest_only {
            parts.push("is_latest: true".to_string());
        }
        write!(f, "{{{}}}", parts.join(", "))
    }
}

/// One aggregation stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    /// Keep rows matching the predicate
    Match(MatchSpec),
    /// Sort rows. Rows comparing equal keep the most recently stored first.
    Sort(Vec<SortKey>),
    /// Keep the first row of each run of equal `key` values
    GroupFirst { key: Field },
    /// Rank rows within each `partition_by` group by `sort_by` and flag the
    /// first one as latest. Ties rank the most recently stored row first.
    SetWindowFields {
        partition_by: Field,
        sort_by: Vec<SortKey>,
    },
    /// Replace the row stream with its cardinality
    Count,
}

impl Stage {
    /// Short stage name for logs
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Match(_) => "match",
            Stage::Sort(_) => "sort",
            Stage::GroupFirst { .. } => "group_first",
            Stage::SetWindowFields { .. } => "set_window_fields",
            Stage::Count => "count",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Match(spec) => write!(f, "match{}", spec),
            Stage::Sort(keys) => {
                let keys: Vec<String> = keys.iter().map(|k| k.to_string()).collect();
                write!(f, "sort{{{}}}", keys.join(", "))
            }
            Stage::GroupFirst { key } => write!(f, "group_first{{_id: {}}}", key),
            Stage::SetWindowFields {
                partition_by,
                sort_by,
            } => {
                let keys: Vec<String> = sort_by.iter().map(|k| k.to_string()).collect();
                write!(
                    f,
                    "set_window_fields{{partition_by: {}, sort_by: {{{}}}, output: is_latest}}",
                    partition_by,
                    keys.join(", ")
                )
            }
            Stage::Count => f.write_str("count"),
        }
    }
}

/// Ordered list of stages
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stage
    pub fn stage(mut self, stage: Stage) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn push(&mut self, stage: Stage) {
        self.stages.push(stage);
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Whether the pipeline ends in a count
    pub fn is_count(&self) -> bool {
        matches!(self.stages.last(), Some(Stage::Count))
    }

    /// Render the pipeline on one line
    pub fn describe(&self) -> String {
        self.stages
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .join(" -> ")
    }
}

impl From<Vec<Stage>> for Pipeline {
    fn from(stages: Vec<Stage>) -> Self {
        Self { stages }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{EventRecord, SnapshotRecord};
    use chrono::{TimeZone, Utc};

    fn event(partition: u64, status: Status, day: u32) -> Document {
        EventRecord {
            entity_id: "NZ100000001".to_string(),
            partition_id: partition,
            timestamp: Utc.with_ymd_and_hms(2025, 3, day, 12, 0, 0).unwrap(),
            status,
        }
        .into()
    }

    #[test]
    fn test_empty_match_accepts_everything() {
        let spec = MatchSpec::new();
        assert!(spec.is_empty());
        assert!(spec.matches(&event(1, Status::PickedUp, 1), false));
    }

    #[test]
    fn test_match_conjunction() {
        let bounds = TimeBounds::new(
            Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 3, 3, 23, 59, 59).unwrap(),
        )
        .unwrap();
        let spec = MatchSpec::new()
            .with_partitions([1000011, 1000012].into_iter().collect())
            .with_statuses([Status::Delivered].into_iter().collect())
            .with_time(bounds);

        assert!(spec.matches(&event(1000011, Status::Delivered, 2), false));
        assert!(!spec.matches(&event(1000013, Status::Delivered, 2), false));
        assert!(!spec.matches(&event(1000011, Status::InTransit, 2), false));
        assert!(!spec.matches(&event(1000011, Status::Delivered, 5), false));
        assert_eq!(
            spec.fields(),
            vec![Field::PartitionId, Field::Status, Field::Time]
        );
    }

    #[test]
    fn test_latest_only_requires_flag() {
        let spec = MatchSpec::new().latest_only();
        let doc = event(1, Status::Delivered, 1);
        assert!(!spec.matches(&doc, false));
        assert!(spec.matches(&doc, true));
    }

    #[test]
    fn test_match_uses_snapshot_event_time() {
        let doc: Document = SnapshotRecord {
            entity_id: "NZ100000009".to_string(),
            partition_id: 7,
            status: Status::AttemptedDelivery,
            event_time: Utc.with_ymd_and_hms(2025, 3, 4, 0, 0, 0).unwrap(),
            details: None,
        }
        .into();
        let bounds = TimeBounds::new(
            Utc.with_ymd_and_hms(2025, 3, 4, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 3, 4, 0, 0, 0).unwrap(),
        )
        .unwrap();
        assert!(MatchSpec::new().with_time(bounds).matches(&doc, false));
    }

    #[test]
    fn test_describe() {
        let pipeline = Pipeline::new()
            .stage(Stage::Match(
                MatchSpec::new().with_partitions([1000011].into_iter().collect()),
            ))
            .stage(Stage::Sort(vec![
                SortKey::asc(Field::EntityId),
                SortKey::desc(Field::Time),
            ]))
            .stage(Stage::GroupFirst {
                key: Field::EntityId,
            })
            .stage(Stage::Count);

        assert_eq!(
            pipeline.describe(),
            "match{partition_id in [1000011]} -> sort{entity_id: 1, event_time: -1} \
             -> group_first{_id: entity_id} -> count"
        );
        assert!(pipeline.is_count());
        assert_eq!(pipeline.len(), 4);
    }
}
