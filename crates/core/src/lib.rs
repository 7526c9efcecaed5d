//! Core types and configuration for the quote pivot system.
//!
//! This crate provides shared types used across all other crates:
//! - Quote record schema (raw and normalized rows)
//! - Column and aggregate vocabulary for pivots and views
//! - Configuration structures
//! - Common error types

pub mod config;
pub mod error;
pub mod types;

pub use config::{Config, PivotConfig, StreamConfig, ViewConfig};
pub use error::{Error, Result};
pub use types::*;
