//! Secondary index definitions and partition postings
//!
//! Index definitions are metadata: a hint must name one, but evaluation
//! results never depend on which index was used. The only physical structure
//! is the partition postings list, used to prefilter scans when a hint leads
//! with the partition field.

use parcelsim_core::{Field, PartitionId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Compound ascending index over one or more fields
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexSpec {
    fields: Vec<Field>,
}

impl IndexSpec {
    /// Create a new index definition. Field order is significant.
    pub fn new(fields: impl Into<Vec<Field>>) -> Self {
        Self {
            fields: fields.into(),
        }
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn leading_field(&self) -> Option<Field> {
        self.fields.first().copied()
    }

    /// Conventional name, e.g. `partition_id_1_event_time_1`
    pub fn name(&self) -> String {
        self.fields
            .iter()
            .map(|f| format!("{}_1", f.name()))
            .collect::<Vec<_>>()
            .join("_")
    }
}

impl fmt::Display for IndexSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// Partition id -> row positions, in insertion order
#[derive(Debug, Default)]
pub(crate) struct PartitionPostings {
    postings: BTreeMap<PartitionId, Vec<usize>>,
}

impl PartitionPostings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, partition: PartitionId, position: usize) {
        self.postings.entry(partition).or_default().push(position);
    }

    /// Positions of rows in any of `partitions`, ascending
    pub fn lookup(&self, partitions: &BTreeSet<PartitionId>) -> Vec<usize> {
        let mut positions: Vec<usize> = partitions
            .iter()
            .filter_map(|p| self.postings.get(p))
            .flat_map(|list| list.iter().copied())
            .collect();
        positions.sort_unstable();
        positions
    }

    pub fn partition_count(&self) -> usize {
        self.postings.len()
    }
}
