//! Synthetic parcel-tracking data generator for ParcelSim benchmarking.
//!
//! This crate synthesizes per-parcel event histories, spreads a target
//! population across merchant partitions and bulk-loads it into a store with
//! a bounded worker pool. The `parcelsim` binary drives generation, single
//! queries and the multi-container benchmark.
//!
//! # Layouts
//! - `flat-snapshot`: one record per parcel with an independently drawn status
//! - `append-only`: one record per lifecycle event
//!
//! # Usage
//! ```bash
//! # Populate the one-week containers at 1% of the standard volume
//! parcelsim generate --window 1_week --scale 0.01
//!
//! # Count parcels whose latest status is Delivered
//! parcelsim query --window 1_week --layout append --statuses delivered
//!
//! # Run the standard preset across every container, five times each
//! parcelsim benchmark --iterations 5 --output bench.md
//! ```

pub mod allocation;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod loader;
pub mod payload;
pub mod producer;
pub mod report;
pub mod workload;

pub use allocation::{allocate, Allocation, AllocationConfig, AllocationPlan, FixedPartition};
pub use config::{AppConfig, GeneratorConfig, GeneratorSettings, ReportingWindow};
pub use error::{GenerateError, Result};
pub use lifecycle::{Lifecycle, LifecycleParams, Transition};
pub use loader::{ChunkFailure, LoadReport, Loader};
pub use payload::{ItemDetailPayload, NoPayload, PayloadKind, PayloadProvider};
pub use producer::{plan_work, Batch, BatchProducer, IdFormat, WorkItem};
pub use report::Report;
pub use workload::{run_generation, run_windows};
