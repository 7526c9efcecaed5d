//! Chart-ready projection of the aggregation table.
//!
//! This crate handles:
//! - View spec validation (pivots, displayed columns, aggregates)
//! - Projection of table buckets onto row and column pivots
//! - Snapshot deltas for append-style renderer updates

pub mod spec;
pub mod snapshot;
pub mod projector;

pub use spec::ViewSpec;
pub use snapshot::{CellUpdate, Series, SnapshotDelta, ViewSnapshot};
pub use projector::project;
