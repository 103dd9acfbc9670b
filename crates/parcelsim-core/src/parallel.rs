//! Worker pool configuration for bulk loads.
//!
//! The pool size is a fixed cap chosen up front. It is never derived from
//! the volume being loaded.

use serde::{Deserialize, Serialize};

/// Configuration for the bulk-load worker pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Number of worker threads.
    /// Set to 0 to use the number of CPU cores.
    /// Default: 24
    pub workers: usize,

    /// Maximum number of entities produced and written per chunk.
    /// Default: 10,000
    pub batch_size: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: 24,
            batch_size: 10_000,
        }
    }
}

impl PoolConfig {
    /// Creates a new PoolConfig with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the effective number of worker threads.
    /// Returns num_cpus if workers is 0.
    pub fn effective_workers(&self) -> usize {
        if self.workers == 0 {
            num_cpus::get()
        } else {
            self.workers
        }
    }

    /// Returns the effective batch size, never below one entity.
    pub fn effective_batch_size(&self) -> usize {
        self.batch_size.max(1)
    }

    /// Creates a configuration with a single worker.
    pub fn sequential() -> Self {
        Self {
            workers: 1,
            ..Self::default()
        }
    }

    /// Builder method to set the worker count.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Builder method to set the batch size.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }
}
