//! Store and session traits
//!
//! A `Store` hands out sessions; every worker or caller opens its own.
//! Sessions are never shared across threads.

use crate::error::Result;
use crate::index::IndexSpec;
use parcelsim_core::{Document, Layout, Pipeline};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Options for a single aggregation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregateOptions {
    /// Name of the index to use. Must exist on the container.
    pub hint: Option<String>,
    /// Maximum execution time. `None` means unbounded.
    pub max_time: Option<Duration>,
}

impl AggregateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn with_max_time(mut self, max_time: Duration) -> Self {
        self.max_time = Some(max_time);
        self
    }
}

/// Result of an aggregation
#[derive(Debug, Clone, PartialEq)]
pub enum AggregateOutput {
    /// Pipeline ended in a count stage
    Count(u64),
    /// Surviving documents in pipeline order
    Documents(Vec<Document>),
}

impl AggregateOutput {
    /// Row count regardless of output shape
    pub fn count(&self) -> u64 {
        match self {
            AggregateOutput::Count(n) => *n,
            AggregateOutput::Documents(docs) => docs.len() as u64,
        }
    }
}

/// Result of an unordered bulk insert
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsertOutcome {
    pub inserted: u64,
    /// Documents skipped because they did not fit the container
    pub rejected: u64,
}

/// A connection-like handle owned by one caller
pub trait Session: Send {
    /// Create an empty container with the given layout
    fn create_container(&mut self, name: &str, layout: Layout) -> Result<()>;

    /// Drop a container. Returns false when it did not exist.
    fn drop_container(&mut self, name: &str) -> Result<bool>;

    fn container_layout(&self, name: &str) -> Result<Layout>;

    fn list_containers(&self) -> Result<Vec<String>>;

    /// Define a secondary index. Defining an existing index is a no-op.
    fn create_index(&mut self, container: &str, index: IndexSpec) -> Result<()>;

    fn list_indexes(&self, container: &str) -> Result<Vec<IndexSpec>>;

    /// Unordered, best-effort bulk insert
    fn insert_many(&mut self, container: &str, documents: Vec<Document>) -> Result<InsertOutcome>;

    fn count_documents(&self, container: &str) -> Result<u64>;

    /// Evaluate a pipeline against a container
    fn aggregate(
        &mut self,
        container: &str,
        pipeline: &Pipeline,
        options: &AggregateOptions,
    ) -> Result<AggregateOutput>;
}

/// Shared store handle
pub trait Store: Send + Sync {
    type Session: Session;

    /// Open a new session
    fn open_session(&self) -> Result<Self::Session>;
}
