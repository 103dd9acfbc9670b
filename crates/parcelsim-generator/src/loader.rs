//! Parallel bulk loader
//!
//! One rayon job per work item. Each job opens its own session, produces its
//! batch and inserts it. A failed chunk is recorded and logged; it neither
//! stops its siblings nor gets retried.

use crate::error::{GenerateError, Result};
use crate::producer::{BatchProducer, WorkItem};
use indicatif::{ProgressBar, ProgressStyle};
use parcelsim_core::{Layout, PartitionId, PoolConfig};
use parcelsim_store::{Session, Store, StoreError};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// A chunk that did not reach the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkFailure {
    pub partition_id: PartitionId,
    pub chunk_index: usize,
    pub entities: u64,
    pub reason: String,
}

/// Counters shared by loader jobs.
#[derive(Debug, Default)]
pub struct LoadStats {
    pub chunks_committed: AtomicU64,
    pub chunks_failed: AtomicU64,
    pub entities: AtomicU64,
    pub documents: AtomicU64,
    pub rejected: AtomicU64,
}

impl LoadStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&self, entities: u64, documents: u64) {
        self.chunks_committed.fetch_add(1, Ordering::Relaxed);
        self.entities.fetch_add(entities, Ordering::Relaxed);
        self.documents.fetch_add(documents, Ordering::Relaxed);
    }

    /// Documents stored and refused by a chunk that is not committed
    pub fn record_rejected(&self, documents: u64, rejected: u64) {
        self.documents.fetch_add(documents, Ordering::Relaxed);
        self.rejected.fetch_add(rejected, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.chunks_failed.fetch_add(1, Ordering::Relaxed);
    }
}

/// Outcome of loading one container
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadReport {
    pub container: String,
    pub layout: Layout,
    /// Entities the configuration asked for
    pub configured_entities: u64,
    pub chunks_total: usize,
    pub chunks_failed: usize,
    pub committed_entities: u64,
    /// Persisted documents: one per entity or one per event
    pub committed_documents: u64,
    pub rejected_documents: u64,
    pub failures: Vec<ChunkFailure>,
    pub elapsed: Duration,
}

impl LoadReport {
    /// Configured minus committed entities
    pub fn discrepancy(&self) -> i64 {
        self.configured_entities as i64 - self.committed_entities as i64
    }

    pub fn is_complete(&self) -> bool {
        self.chunks_failed == 0 && self.discrepancy() == 0
    }

    pub fn documents_per_second(&self) -> f64 {
        if self.elapsed.as_secs_f64() > 0.0 {
            self.committed_documents as f64 / self.elapsed.as_secs_f64()
        } else {
            0.0
        }
    }
}

/// Dispatches work items on a bounded pool
pub struct Loader {
    producer: BatchProducer,
    pool: PoolConfig,
    progress: bool,
}

impl Loader {
    /// Create a new loader with the progress bar enabled
    pub fn new(producer: BatchProducer, pool: PoolConfig) -> Self {
        Self {
            producer,
            pool,
            progress: true,
        }
    }

    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    /// Load every item into `container`. Errors only when the pool cannot be
    /// built; chunk failures are part of the report.
    pub fn run<S: Store>(&self, store: &S, container: &str, items: Vec<WorkItem>) -> Result<LoadReport> {
        let started = Instant::now();
        let workers = self.pool.effective_workers();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("parcelsim-loader-{}", i))
            .build()
            .map_err(|e| GenerateError::InvalidConfig(format!("worker pool: {}", e)))?;

        let configured_entities: u64 = items.iter().map(|i| i.entities).sum();
        let stats = LoadStats::new();
        let progress = self.progress_bar(items.len() as u64, container);

        info!(
            container,
            layout = %self.producer.layout(),
            chunks = items.len(),
            workers,
            "Starting load"
        );

        let mut failures: Vec<ChunkFailure> = pool.install(|| {
            items
                .par_iter()
                .filter_map(|item| {
                    let outcome = self.load_chunk(store, container, item, &stats);
                    progress.inc(1);
                    outcome.err()
                })
                .collect()
        });
        progress.finish_and_clear();
        failures.sort_by_key(|f| (f.partition_id, f.chunk_index));

        let report = LoadReport {
            container: container.to_string(),
            layout: self.producer.layout(),
            configured_entities,
            chunks_total: items.len(),
            chunks_failed: failures.len(),
            committed_entities: stats.entities.load(Ordering::Relaxed),
            committed_documents: stats.documents.load(Ordering::Relaxed),
            rejected_documents: stats.rejected.load(Ordering::Relaxed),
            failures,
            elapsed: started.elapsed(),
        };

        info!(
            container,
            committed = report.committed_documents,
            failed_chunks = report.chunks_failed,
            elapsed_secs = report.elapsed.as_secs_f64(),
            "Load finished"
        );
        if report.discrepancy() != 0 {
            warn!(
                container,
                discrepancy = report.discrepancy(),
                "Committed entities differ from configuration"
            );
        }

        Ok(report)
    }

    fn load_chunk<S: Store>(
        &self,
        store: &S,
        container: &str,
        item: &WorkItem,
        stats: &LoadStats,
    ) -> std::result::Result<(), ChunkFailure> {
        let attempt = || -> std::result::Result<(u64, u64), StoreError> {
            let mut session = store.open_session()?;
            let batch = self.producer.produce(item, &mut rand::thread_rng());
            let outcome = session.insert_many(container, batch.documents)?;
            Ok((outcome.inserted, outcome.rejected))
        };

        let reason = match attempt() {
            Ok((inserted, 0)) => {
                stats.record_success(item.entities, inserted);
                debug!(
                    partition = item.partition_id(),
                    chunk = item.chunk_index,
                    inserted,
                    "Chunk committed"
                );
                return Ok(());
            }
            // Partially stored chunks still count as failed
            Ok((inserted, rejected)) => {
                stats.record_rejected(inserted, rejected);
                format!(
                    "{} of {} documents rejected by {}",
                    rejected,
                    inserted + rejected,
                    container
                )
            }
            Err(e) => e.to_string(),
        };

        stats.record_failure();
        warn!(
            partition = item.partition_id(),
            chunk = item.chunk_index,
            entities = item.entities,
            error = %reason,
            "Chunk failed"
        );
        Err(ChunkFailure {
            partition_id: item.partition_id(),
            chunk_index: item.chunk_index,
            entities: item.entities,
            reason,
        })
    }

    fn progress_bar(&self, len: u64, container: &str) -> ProgressBar {
        if !self.progress {
            return ProgressBar::hidden();
        }
        let bar = ProgressBar::new(len);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] {msg} [{bar:40.cyan/blue}] {pos}/{len} chunks")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );
        bar.set_message(container.to_string());
        bar
    }
}
