//! ParcelSim Store - Document store seam for tracking data
//!
//! This crate provides:
//! - `Store` / `Session`: the trait seam the generator and query layer use
//! - `MemoryStore`: an in-memory implementation with secondary-index
//!   definitions, pipeline evaluation and execution-time budgets
//! - Provisioning of containers and per-layout index sets
//! - Bincode snapshot persistence

pub mod error;
mod eval;
pub mod index;
pub mod memory;
pub mod provision;
mod snapshot;
pub mod store;

pub use error::{Result, StoreError};
pub use index::IndexSpec;
pub use memory::{MemorySession, MemoryStore};
pub use provision::{index_set, provision};
pub use store::{AggregateOptions, AggregateOutput, InsertOutcome, Session, Store};
