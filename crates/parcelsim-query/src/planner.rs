//! Query planner with layout-specific index selection
//!
//! Index choice is a declarative ordered table per layout: the first entry
//! whose fields are all constrained by the filter wins. The hint only narrows
//! the prefilter scan; the pipeline alone defines the result.

use crate::error::Result;
use crate::latest::LatestStrategy;
use crate::model::{QueryFilter, QueryRequest};
use parcelsim_core::{Field, Layout, Pipeline, Stage};
use parcelsim_store::IndexSpec;
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::{debug, warn};

use parcelsim_core::Field::{PartitionId as P, Status as S, Time as T};

/// Flat-snapshot hint table, most selective first
const FLAT_HINTS: &[&[Field]] = &[&[P, S, T], &[P, S], &[P, T], &[S, T], &[T], &[P], &[S]];

/// Append-only prefilter hint table. Status never drives the prefilter
/// because it is evaluated on the latest event only.
const APPEND_HINTS: &[&[Field]] = &[&[P, T], &[T], &[P]];

/// Hint table for a layout
pub fn hint_table(layout: Layout) -> &'static [&'static [Field]] {
    match layout {
        Layout::FlatSnapshot => FLAT_HINTS,
        Layout::AppendOnly => APPEND_HINTS,
    }
}

/// First table entry fully covered by `present`
fn select_hint(table: &[&[Field]], present: &BTreeSet<Field>) -> Option<IndexSpec> {
    table
        .iter()
        .find(|fields| fields.iter().all(|f| present.contains(f)))
        .map(|fields| IndexSpec::new(fields.to_vec()))
}

/// Query plan describing how to execute a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryPlan {
    pub layout: Layout,
    pub strategy: LatestStrategy,
    pub pipeline: Pipeline,
    pub index_hint: Option<IndexSpec>,
}

impl QueryPlan {
    pub fn hint_name(&self) -> Option<String> {
        self.index_hint.as_ref().map(|h| h.name())
    }

    /// Format the query plan for EXPLAIN output
    pub fn explain(&self) -> ExplainOutput {
        ExplainOutput {
            layout: self.layout,
            strategy: (self.layout == Layout::AppendOnly).then_some(self.strategy),
            index_hint: self.hint_name(),
            stages: self.pipeline.stages().iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Whether the latest-state stages run over every event in the container
    pub fn scans_all_events(&self) -> bool {
        self.layout == Layout::AppendOnly
            && !matches!(self.pipeline.stages().first(), Some(Stage::Match(_)))
    }

    /// One-line rendering for logs and reports
    pub fn describe(&self) -> String {
        format!(
            "[{}] hint={} {}",
            self.layout,
            self.hint_name().as_deref().unwrap_or("none"),
            self.pipeline.describe()
        )
    }
}

/// Structured EXPLAIN output for JSON serialization
#[derive(Debug, Clone, Serialize)]
pub struct ExplainOutput {
    pub layout: Layout,
    pub strategy: Option<LatestStrategy>,
    pub index_hint: Option<String>,
    pub stages: Vec<String>,
}

/// Query planner for latest-state counts
#[derive(Debug, Default, Clone)]
pub struct QueryPlanner;

impl QueryPlanner {
    /// Create a new query planner
    pub fn new() -> Self {
        Self
    }

    /// Plan a request
    pub fn plan(&self, request: &QueryRequest) -> Result<QueryPlan> {
        let plan = match request.layout {
            Layout::FlatSnapshot => self.plan_flat(&request.filter),
            Layout::AppendOnly => self.plan_append(&request.filter, request.strategy),
        };

        debug!(plan = %plan.describe(), "Planned query");
        Ok(plan)
    }

    fn plan_flat(&self, filter: &QueryFilter) -> QueryPlan {
        let mut pipeline = Pipeline::new();
        let spec = filter.to_match();
        if !spec.is_empty() {
            pipeline.push(Stage::Match(spec));
        }
        pipeline.push(Stage::Count);

        QueryPlan {
            layout: Layout::FlatSnapshot,
            strategy: LatestStrategy::default(),
            pipeline,
            index_hint: select_hint(FLAT_HINTS, &filter.present_fields()),
        }
    }

    fn plan_append(&self, filter: &QueryFilter, strategy: LatestStrategy) -> QueryPlan {
        let mut pipeline = Pipeline::new();
        let prefilter = filter.to_prefilter();
        if !prefilter.is_empty() {
            pipeline.push(Stage::Match(prefilter));
        }
        for stage in strategy.stages(filter.status_set()) {
            pipeline.push(stage);
        }
        pipeline.push(Stage::Count);

        let mut prefilter_fields = filter.present_fields();
        prefilter_fields.remove(&Field::Status);

        let plan = QueryPlan {
            layout: Layout::AppendOnly,
            strategy,
            pipeline,
            index_hint: select_hint(APPEND_HINTS, &prefilter_fields),
        };
        if plan.scans_all_events() {
            warn!(
                statuses = filter.status_set().map_or(0, |s| s.len()),
                "Latest-state query without partition or time filter scans every event in the container"
            );
        }
        plan
    }
}
