//! ParcelSim Core - Core types for the parcel tracking benchmark
//!
//! This crate provides the fundamental data types shared by the generator,
//! the store and the query layer:
//! - `Status`: the closed set of tracking statuses with their numeric codes
//! - `TimeWindow` / `TimeBounds`: generation windows and query time filters
//! - `Layout`: flat snapshot vs append-only persistence
//! - `SnapshotRecord` / `EventRecord` / `Document`: persisted record shapes
//! - `Pipeline` / `Stage`: the aggregation pipeline model
//! - `PoolConfig`: worker pool sizing for bulk loads

pub mod error;
pub mod parallel;
pub mod pipeline;
pub mod record;
pub mod types;

pub use error::{CoreError, Result};
pub use parallel::PoolConfig;
pub use pipeline::{Field, MatchSpec, Pipeline, SortKey, SortOrder, Stage};
pub use record::{
    Address, Dimensions, Document, EventRecord, ItemDetails, Money, Product, Receiver, Sender,
    SnapshotRecord,
};
pub use types::*;
