//! Query executor
//!
//! Plans a request, derives its execution budget and runs the pipeline on a
//! caller-owned session. Single-shot and blocking: no retries, no partial
//! results.

use crate::error::{QueryError, Result};
use crate::model::QueryRequest;
use crate::planner::{QueryPlan, QueryPlanner};
use parcelsim_core::Layout;
use parcelsim_store::{AggregateOptions, Session, StoreError};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Execution budgets per layout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutPolicy {
    /// Base budget for append-only queries, in seconds
    pub base_secs: u64,
    /// Added per day of the container's window, in seconds
    pub per_day_secs: u64,
    /// Budget for flat-snapshot queries. None means unbounded.
    pub flat_secs: Option<u64>,
}

impl Default for TimeoutPolicy {
    fn default() -> Self {
        Self {
            base_secs: 10,
            per_day_secs: 2,
            flat_secs: None,
        }
    }
}

impl TimeoutPolicy {
    /// Budget for a layout and window length. A request override wins.
    pub fn budget_for(&self, request: &QueryRequest) -> Option<Duration> {
        if let Some(budget) = request.budget {
            return Some(budget);
        }
        match request.layout {
            Layout::AppendOnly => {
                let days = u64::from(request.window_days.unwrap_or(0));
                Some(Duration::from_secs(
                    self.base_secs.saturating_add(self.per_day_secs.saturating_mul(days)),
                ))
            }
            Layout::FlatSnapshot => self.flat_secs.map(Duration::from_secs),
        }
    }
}

/// Result of one executed query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryOutcome {
    pub container: String,
    pub layout: Layout,
    pub count: u64,
    pub elapsed_ms: f64,
    pub index_hint: Option<String>,
    pub pipeline: String,
}

/// Query executor for running requests against a store session
#[derive(Debug, Clone, Default)]
pub struct QueryExecutor {
    planner: QueryPlanner,
    timeouts: TimeoutPolicy,
}

impl QueryExecutor {
    /// Create a new query executor with default budgets
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeouts(mut self, timeouts: TimeoutPolicy) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn timeouts(&self) -> &TimeoutPolicy {
        &self.timeouts
    }

    /// Plan without executing
    pub fn plan(&self, request: &QueryRequest) -> Result<QueryPlan> {
        self.planner.plan(request)
    }

    /// Execute a request. Elapsed time covers planning and execution.
    pub fn execute<S: Session + ?Sized>(
        &self,
        session: &mut S,
        container: &str,
        request: &QueryRequest,
    ) -> Result<QueryOutcome> {
        let start = Instant::now();

        let actual = session.container_layout(container)?;
        if actual != request.layout {
            return Err(QueryError::Store(StoreError::LayoutMismatch {
                container: container.to_string(),
                expected: request.layout,
                actual,
            }));
        }

        let plan = self.planner.plan(request)?;
        let mut options = AggregateOptions::new();
        if let Some(hint) = plan.hint_name() {
            options = options.with_hint(hint);
        }
        if let Some(budget) = self.timeouts.budget_for(request) {
            options = options.with_max_time(budget);
        }
        debug!(container, budget = ?options.max_time, "Executing query");

        let output = match session.aggregate(container, &plan.pipeline, &options) {
            Ok(output) => output,
            Err(e) => {
                let err = QueryError::from(e);
                warn!(container, error = %err, "Query failed");
                return Err(err);
            }
        };

        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
        let count = output.count();
        info!(
            container,
            count,
            elapsed_ms,
            hint = plan.hint_name().as_deref().unwrap_or("none"),
            "Query completed"
        );

        Ok(QueryOutcome {
            container: container.to_string(),
            layout: plan.layout,
            count,
            elapsed_ms,
            index_hint: plan.hint_name(),
            pipeline: plan.pipeline.describe(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parcelsim_core::Status;

    #[test]
    fn test_append_budget_scales_with_days() {
        let policy = TimeoutPolicy::default();
        let request = QueryRequest::builder(Layout::AppendOnly)
            .window_days(7)
            .build()
            .unwrap();
        assert_eq!(policy.budget_for(&request), Some(Duration::from_secs(24)));

        let quarter = QueryRequest::builder(Layout::AppendOnly)
            .window_days(90)
            .build()
            .unwrap();
        assert_eq!(policy.budget_for(&quarter), Some(Duration::from_secs(190)));
    }

    #[test]
    fn test_flat_budget_unbounded_by_default() {
        let request = QueryRequest::builder(Layout::FlatSnapshot)
            .statuses([Status::Delivered])
            .build()
            .unwrap();
        assert_eq!(TimeoutPolicy::default().budget_for(&request), None);

        let policy = TimeoutPolicy {
            flat_secs: Some(5),
            ..Default::default()
        };
        assert_eq!(policy.budget_for(&request), Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_override_wins() {
        let request = QueryRequest::builder(Layout::AppendOnly)
            .window_days(31)
            .budget(Duration::from_millis(250))
            .build()
            .unwrap();
        assert_eq!(
            TimeoutPolicy::default().budget_for(&request),
            Some(Duration::from_millis(250))
        );
    }
}
