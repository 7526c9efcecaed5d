//! Record ingestion for the quote pivot system.
//!
//! This crate handles:
//! - Normalization of raw quote records into table rows
//! - Batch delivery into a row sink (the aggregation table)
//! - Batch observers and ingestion statistics

pub mod normalizer;
pub mod buffer;

pub use normalizer::{normalize, normalize_batch};
pub use buffer::{BatchReport, IngestionBuffer, IngestionStats, RowSink};
