//! Incremental grouping and aggregation for the quote pivot system.
//!
//! This crate handles:
//! - Group key derivation from normalized rows
//! - Per-key running aggregate state (counts, sums, distinct values)
//! - The append-only aggregation table

pub mod key;
pub mod bucket;
pub mod table;

pub use key::{DerivedRow, GroupKey, KeyDeriver};
pub use bucket::AggregateBucket;
pub use table::AggregationTable;
