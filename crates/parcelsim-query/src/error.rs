//! Query error types

use parcelsim_store::StoreError;
use std::time::Duration;
use thiserror::Error;

/// Query errors
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Query on {container} exceeded its budget of {budget:?}")]
    Timeout { container: String, budget: Duration },

    #[error("Store error: {0}")]
    Store(StoreError),

    #[error("Latency histogram error: {0}")]
    Histogram(String),

    #[error("Core error: {0}")]
    Core(#[from] parcelsim_core::CoreError),
}

/// Result type for query operations
pub type Result<T> = std::result::Result<T, QueryError>;

impl From<StoreError> for QueryError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::TimedOut { container, budget } => QueryError::Timeout { container, budget },
            other => QueryError::Store(other),
        }
    }
}

impl QueryError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, QueryError::Timeout { .. })
    }
}
