//! Streaming harness for the quote pivot system.
//!
//! This crate provides:
//! - The single-writer stream engine (ingest, aggregate, project)
//! - Batch sources (simulated quote feed, JSON replay)
//! - A timer-driven driver publishing snapshots

pub mod engine;
pub mod source;
pub mod driver;

pub use engine::{EngineState, StreamEngine};
pub use source::{BatchSource, ReplaySource, SimulatedSource};
pub use driver::{DriveOutcome, StopReason, StreamDriver};
