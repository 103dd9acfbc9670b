//! Query model - filters and requests for latest-state counts

use crate::error::{QueryError, Result};
use crate::latest::LatestStrategy;
use parcelsim_core::{Field, Layout, MatchSpec, PartitionId, Status, TimeBounds, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;

/// Filter predicates. Empty sets are normalized to absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryFilter {
    partitions: Option<BTreeSet<PartitionId>>,
    statuses: Option<BTreeSet<Status>>,
    time: Option<TimeBounds>,
}

impl QueryFilter {
    /// Create an empty filter
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict to partitions. An empty iterator clears the restriction.
    pub fn partitions(mut self, partitions: impl IntoIterator<Item = PartitionId>) -> Self {
        let set: BTreeSet<PartitionId> = partitions.into_iter().collect();
        self.partitions = (!set.is_empty()).then_some(set);
        self
    }

    /// Restrict to statuses. An empty iterator clears the restriction.
    pub fn statuses(mut self, statuses: impl IntoIterator<Item = Status>) -> Self {
        let set: BTreeSet<Status> = statuses.into_iter().collect();
        self.statuses = (!set.is_empty()).then_some(set);
        self
    }

    /// Restrict to an inclusive time range
    pub fn time(mut self, bounds: TimeBounds) -> Self {
        self.time = Some(bounds);
        self
    }

    pub fn time_range(self, from: Timestamp, to: Timestamp) -> Result<Self> {
        Ok(self.time(TimeBounds::new(from, to)?))
    }

    pub fn partition_set(&self) -> Option<&BTreeSet<PartitionId>> {
        self.partitions.as_ref()
    }

    pub fn status_set(&self) -> Option<&BTreeSet<Status>> {
        self.statuses.as_ref()
    }

    pub fn time_bounds(&self) -> Option<&TimeBounds> {
        self.time.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.partitions.is_none() && self.statuses.is_none() && self.time.is_none()
    }

    /// Fields with a predicate present
    pub fn present_fields(&self) -> BTreeSet<Field> {
        let mut fields = BTreeSet::new();
        if self.partitions.is_some() {
            fields.insert(Field::PartitionId);
        }
        if self.statuses.is_some() {
            fields.insert(Field::Status);
        }
        if self.time.is_some() {
            fields.insert(Field::Time);
        }
        fields
    }

    /// Match over every present predicate
    pub fn to_match(&self) -> MatchSpec {
        MatchSpec {
            partitions: self.partitions.clone(),
            statuses: self.statuses.clone(),
            time: self.time,
            latest_only: false,
        }
    }

    /// Match over partition and time only, applied before latest-state
    /// reduction on the append-only layout
    pub fn to_prefilter(&self) -> MatchSpec {
        MatchSpec {
            partitions: self.partitions.clone(),
            statuses: None,
            time: self.time,
            latest_only: false,
        }
    }
}

/// A latest-state count request against one container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRequest {
    /// Physical layout of the target container, always explicit
    pub layout: Layout,
    pub filter: QueryFilter,
    pub strategy: LatestStrategy,
    /// Overrides the timeout policy when set
    pub budget: Option<Duration>,
    /// Days covered by the container, used by the timeout policy
    pub window_days: Option<u32>,
}

impl QueryRequest {
    /// Create a new query builder
    pub fn builder(layout: Layout) -> QueryRequestBuilder {
        QueryRequestBuilder::new(layout)
    }
}

/// Query builder for fluent API
pub struct QueryRequestBuilder {
    layout: Layout,
    filter: QueryFilter,
    strategy: LatestStrategy,
    budget: Option<Duration>,
    window_days: Option<u32>,
}

impl QueryRequestBuilder {
    /// Create a new query builder
    pub fn new(layout: Layout) -> Self {
        Self {
            layout,
            filter: QueryFilter::new(),
            strategy: LatestStrategy::default(),
            budget: None,
            window_days: None,
        }
    }

    pub fn filter(mut self, filter: QueryFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn partitions(mut self, partitions: impl IntoIterator<Item = PartitionId>) -> Self {
        self.filter = self.filter.partitions(partitions);
        self
    }

    pub fn statuses(mut self, statuses: impl IntoIterator<Item = Status>) -> Self {
        self.filter = self.filter.statuses(statuses);
        self
    }

    pub fn time(mut self, bounds: TimeBounds) -> Self {
        self.filter = self.filter.time(bounds);
        self
    }

    pub fn strategy(mut self, strategy: LatestStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn budget(mut self, budget: Duration) -> Self {
        self.budget = Some(budget);
        self
    }

    pub fn window_days(mut self, days: u32) -> Self {
        self.window_days = Some(days);
        self
    }

    /// Build the request
    pub fn build(self) -> Result<QueryRequest> {
        if self.window_days == Some(0) {
            return Err(QueryError::InvalidQuery(
                "window_days must be positive".to_string(),
            ));
        }

        Ok(QueryRequest {
            layout: self.layout,
            filter: self.filter,
            strategy: self.strategy,
            budget: self.budget,
            window_days: self.window_days,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_empty_sets_normalize_to_absent() {
        let filter = QueryFilter::new()
            .partitions(Vec::new())
            .statuses(std::iter::empty());
        assert!(filter.is_empty());
        assert!(filter.partition_set().is_none());
        assert!(filter.status_set().is_none());
    }

    #[test]
    fn test_present_fields() {
        let filter = QueryFilter::new()
            .partitions([1000011, 1000012])
            .time_range(
                Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2025, 3, 7, 23, 59, 59).unwrap(),
            )
            .unwrap();

        let fields: Vec<Field> = filter.present_fields().into_iter().collect();
        assert_eq!(fields, vec![Field::PartitionId, Field::Time]);
        assert!(filter.to_prefilter().statuses.is_none());
    }

    #[test]
    fn test_inverted_time_range_rejected() {
        let result = QueryFilter::new().time_range(
            Utc.with_ymd_and_hms(2025, 3, 7, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap(),
        );
        assert!(matches!(result, Err(QueryError::Core(_))));
    }

    #[test]
    fn test_query_builder() {
        let request = QueryRequest::builder(Layout::AppendOnly)
            .partitions([1000011])
            .statuses([Status::Delivered, Status::AttemptedDelivery])
            .strategy(LatestStrategy::SortGroup)
            .window_days(7)
            .build()
            .unwrap();

        assert_eq!(request.layout, Layout::AppendOnly);
        assert_eq!(request.filter.status_set().map(|s| s.len()), Some(2));
        assert_eq!(request.strategy, LatestStrategy::SortGroup);
        assert_eq!(request.window_days, Some(7));

        assert!(QueryRequest::builder(Layout::FlatSnapshot)
            .window_days(0)
            .build()
            .is_err());
    }
}
