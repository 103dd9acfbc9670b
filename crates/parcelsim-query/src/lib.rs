//! ParcelSim Query - Latest-state query engine for tracking data
//!
//! This crate provides query capabilities:
//! - Typed filters and requests
//! - Index selection from declarative per-layout tables
//! - Latest-state reduction strategies for the append-only layout
//! - Budgeted execution against a store session
//! - A multi-container benchmark harness with latency percentiles

pub mod error;
pub mod executor;
pub mod harness;
pub mod latest;
pub mod model;
pub mod planner;

pub use error::{QueryError, Result};
pub use executor::{QueryExecutor, QueryOutcome, TimeoutPolicy};
pub use harness::{
    Benchmark, BenchmarkPreset, BenchmarkReport, BenchmarkResult, BenchmarkTarget, LatencyStats,
};
pub use latest::LatestStrategy;
pub use model::{QueryFilter, QueryRequest, QueryRequestBuilder};
pub use planner::{ExplainOutput, QueryPlan, QueryPlanner};
