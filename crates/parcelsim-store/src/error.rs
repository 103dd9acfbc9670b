//! Store error types

use parcelsim_core::Layout;
use std::time::Duration;
use thiserror::Error;

/// Store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Container not found: {0}")]
    ContainerNotFound(String),

    #[error("Container already exists: {0}")]
    ContainerExists(String),

    #[error("Index not found on {container}: {index}")]
    IndexNotFound { container: String, index: String },

    #[error("Layout mismatch on {container}: expected {expected}, got {actual}")]
    LayoutMismatch {
        container: String,
        expected: Layout,
        actual: Layout,
    },

    #[error("Invalid pipeline: {0}")]
    InvalidPipeline(String),

    #[error("Operation on {container} exceeded time limit of {budget:?}")]
    TimedOut { container: String, budget: Duration },

    #[error("Write rejected: {0}")]
    WriteRejected(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl StoreError {
    /// Whether this error is a max-execution-time failure
    pub fn is_timeout(&self) -> bool {
        matches!(self, StoreError::TimedOut { .. })
    }
}

/// Result type for store operations
pub type Result<T> = std::result::Result<T, StoreError>;

impl From<bincode::Error> for StoreError {
    fn from(e: bincode::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}
