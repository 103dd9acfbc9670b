//! Error types for parcelsim-core

use thiserror::Error;

/// Core error types
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Unknown status code: {0}")]
    UnknownStatusCode(u16),

    #[error("Unknown status label: {0}")]
    UnknownStatusLabel(String),

    #[error("Unknown layout: {0}")]
    UnknownLayout(String),

    #[error("Invalid time bounds: from {from} is after to {to}")]
    InvalidTimeBounds { from: String, to: String },

    #[error("Invalid window: start {start} is after end {end}")]
    InvalidWindow { start: String, end: String },
}

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, CoreError>;
