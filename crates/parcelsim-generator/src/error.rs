//! Generator error types

use parcelsim_core::CoreError;
use parcelsim_store::StoreError;
use thiserror::Error;

/// Result type for generator operations
pub type Result<T> = std::result::Result<T, GenerateError>;

/// Generator errors. Configuration variants are raised before any chunk is
/// dispatched.
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("Fixed partitions need {planned} entities but the total is {total}")]
    VolumeConflict { total: u64, planned: u64 },

    #[error("Invalid window: {0}")]
    InvalidWindow(String),

    #[error("Partition id {0} is used by both a fixed and a tail partition")]
    PartitionIdCollision(u64),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl GenerateError {
    /// Whether the error was detected before any write
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            GenerateError::VolumeConflict { .. }
                | GenerateError::InvalidWindow(_)
                | GenerateError::PartitionIdCollision(_)
                | GenerateError::InvalidConfig(_)
        )
    }
}
