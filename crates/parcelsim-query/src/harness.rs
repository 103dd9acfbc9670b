//! Benchmark harness
//!
//! Runs one fixed query preset against several containers, optionally
//! repeated, and records per-container counts and latency percentiles.

use crate::error::{QueryError, Result};
use crate::executor::{QueryExecutor, QueryOutcome};
use crate::latest::LatestStrategy;
use crate::model::QueryRequest;
use hdrhistogram::Histogram;
use parcelsim_core::{Layout, PartitionId, Status, TimeBounds};
use parcelsim_store::Store;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

/// Query preset applied to every benchmark target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchmarkPreset {
    pub partitions: Vec<PartitionId>,
    pub statuses: Vec<Status>,
    pub time: Option<TimeBounds>,
    pub strategy: LatestStrategy,
}

impl Default for BenchmarkPreset {
    fn default() -> Self {
        Self {
            partitions: (1_000_011..=1_000_015).collect(),
            statuses: vec![Status::Delivered, Status::AttemptedDelivery],
            time: None,
            strategy: LatestStrategy::default(),
        }
    }
}

impl BenchmarkPreset {
    /// Request for one target
    pub fn request(&self, target: &BenchmarkTarget) -> Result<QueryRequest> {
        let mut builder = QueryRequest::builder(target.layout)
            .partitions(self.partitions.iter().copied())
            .statuses(self.statuses.iter().copied())
            .strategy(self.strategy)
            .window_days(target.window_days);
        if let Some(time) = self.time {
            builder = builder.time(time);
        }
        builder.build()
    }
}

/// One container to benchmark
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BenchmarkTarget {
    pub container: String,
    pub layout: Layout,
    pub window_days: u32,
}

impl BenchmarkTarget {
    pub fn new(container: impl Into<String>, layout: Layout, window_days: u32) -> Self {
        Self {
            container: container.into(),
            layout,
            window_days,
        }
    }
}

/// Latency statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatencyStats {
    pub count: u64,
    pub min_us: u64,
    pub max_us: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
}

impl LatencyStats {
    /// Computes latency statistics from a histogram.
    pub fn from_histogram(histogram: &Histogram<u64>) -> Self {
        if histogram.is_empty() {
            return Self::default();
        }

        Self {
            count: histogram.len(),
            min_us: histogram.min(),
            max_us: histogram.max(),
            mean_us: histogram.mean() as u64,
            p50_us: histogram.value_at_quantile(0.50),
            p95_us: histogram.value_at_quantile(0.95),
            p99_us: histogram.value_at_quantile(0.99),
        }
    }

    /// Formats latency as a human-readable string.
    pub fn format_ms(&self) -> String {
        if self.count == 0 {
            "N/A".to_string()
        } else {
            format!(
                "p50={:.1}ms p95={:.1}ms p99={:.1}ms",
                self.p50_us as f64 / 1000.0,
                self.p95_us as f64 / 1000.0,
                self.p99_us as f64 / 1000.0
            )
        }
    }
}

/// Per-container benchmark result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkResult {
    pub target: BenchmarkTarget,
    /// First successful outcome
    pub outcome: Option<QueryOutcome>,
    pub latency: LatencyStats,
    /// Failure that stopped this target, if any
    pub error: Option<String>,
}

impl BenchmarkResult {
    pub fn succeeded(&self) -> bool {
        self.error.is_none() && self.outcome.is_some()
    }
}

/// Results for every target, in target order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkReport {
    pub preset: BenchmarkPreset,
    pub iterations: usize,
    pub results: Vec<BenchmarkResult>,
    pub total_duration: Duration,
}

impl BenchmarkReport {
    pub fn failures(&self) -> usize {
        self.results.iter().filter(|r| !r.succeeded()).count()
    }
}

/// Runs the preset across targets
#[derive(Debug, Clone)]
pub struct Benchmark {
    executor: QueryExecutor,
    preset: BenchmarkPreset,
    iterations: usize,
}

impl Benchmark {
    /// Create a new benchmark running each target once
    pub fn new(executor: QueryExecutor, preset: BenchmarkPreset) -> Self {
        Self {
            executor,
            preset,
            iterations: 1,
        }
    }

    /// Builder method to set repeat count. Zero is treated as one.
    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations.max(1);
        self
    }

    /// Run every target. A failing target is recorded and does not stop the
    /// others.
    pub fn run<S: Store>(&self, store: &S, targets: &[BenchmarkTarget]) -> Result<BenchmarkReport> {
        let started = std::time::Instant::now();
        let mut results = Vec::with_capacity(targets.len());

        for target in targets {
            results.push(self.run_target(store, target)?);
        }

        let report = BenchmarkReport {
            preset: self.preset.clone(),
            iterations: self.iterations,
            results,
            total_duration: started.elapsed(),
        };
        info!(
            targets = targets.len(),
            failures = report.failures(),
            "Benchmark completed"
        );
        Ok(report)
    }

    fn run_target<S: Store>(&self, store: &S, target: &BenchmarkTarget) -> Result<BenchmarkResult> {
        let mut histogram = Histogram::<u64>::new_with_bounds(1, 3_600_000_000, 3)
            .map_err(|e| QueryError::Histogram(e.to_string()))?;
        let mut first: Option<QueryOutcome> = None;
        let mut error = None;

        match self.preset.request(target) {
            Ok(request) => match store.open_session() {
                Ok(mut session) => {
                    for iteration in 0..self.iterations {
                        match self
                            .executor
                            .execute(&mut session, &target.container, &request)
                        {
                            Ok(outcome) => {
                                histogram.saturating_record((outcome.elapsed_ms * 1000.0) as u64);
                                if first.is_none() {
                                    first = Some(outcome);
                                }
                            }
                            Err(e) => {
                                warn!(
                                    container = %target.container,
                                    iteration,
                                    error = %e,
                                    "Benchmark query failed"
                                );
                                error = Some(e.to_string());
                                break;
                            }
                        }
                    }
                }
                Err(e) => error = Some(QueryError::from(e).to_string()),
            },
            Err(e) => error = Some(e.to_string()),
        }

        Ok(BenchmarkResult {
            target: target.clone(),
            outcome: first,
            latency: LatencyStats::from_histogram(&histogram),
            error,
        })
    }
}
