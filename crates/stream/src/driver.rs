//! Timer-driven delivery loop.
//!
//! One task pulls a batch from the source on every tick and applies it to the
//! engine, so batches reach the table strictly in delivery order with a
//! single writer. Stopping only stops scheduling; engine state is kept.

use crate::engine::StreamEngine;
use crate::source::BatchSource;
use quote_view::ViewSnapshot;
use std::ops::ControlFlow;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Why the driver returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// The source has no more batches.
    Exhausted,
    /// The configured tick limit was reached.
    MaxTicks,
    /// A stop was signalled.
    Stopped,
    /// The snapshot consumer asked to stop.
    Consumer,
    /// The engine halted on a fatal error.
    Fatal(String),
}

/// Summary of a driver run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriveOutcome {
    /// Batches applied during this run.
    pub applied: u64,
    /// Batches rejected with a non-fatal error.
    pub rejected: u64,
    pub reason: StopReason,
}

/// Schedules batch delivery at a fixed cadence.
#[derive(Debug, Clone)]
pub struct StreamDriver {
    period: Duration,
    max_ticks: Option<u64>,
}

impl StreamDriver {
    /// Driver ticking every `period`, optionally bounded to `max_ticks` cycles.
    pub fn new(period: Duration, max_ticks: Option<u64>) -> Self {
        Self { period, max_ticks }
    }

    /// Run until the source is exhausted, the tick limit is hit, `stop` flips
    /// to `true`, the engine halts, or `on_snapshot` returns `Break`.
    /// `on_snapshot` sees every new snapshot.
    pub async fn run<S, F>(
        &self,
        engine: &mut StreamEngine,
        source: &mut S,
        mut stop: watch::Receiver<bool>,
        mut on_snapshot: F,
    ) -> DriveOutcome
    where
        S: BatchSource + ?Sized,
        F: FnMut(&ViewSnapshot) -> ControlFlow<()>,
    {
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut ticks = 0u64;
        let mut applied = 0u64;
        let mut rejected = 0u64;
        info!(period_ms = self.period.as_millis() as u64, "stream started");

        let reason = loop {
            if *stop.borrow() {
                break StopReason::Stopped;
            }
            if self.max_ticks.is_some_and(|max| ticks >= max) {
                break StopReason::MaxTicks;
            }

            tokio::select! {
                _ = ticker.tick() => {}
                changed = stop.changed() => {
                    if changed.is_err() || *stop.borrow() {
                        break StopReason::Stopped;
                    }
                    continue;
                }
            }
            ticks += 1;

            let Some(batch) = source.next_batch() else {
                break StopReason::Exhausted;
            };

            match engine.process_batch(&batch) {
                Ok(snapshot) => {
                    applied += 1;
                    debug!(tick = ticks, records = batch.len(), "tick applied");
                    if on_snapshot(snapshot).is_break() {
                        break StopReason::Consumer;
                    }
                }
                Err(err) if err.is_fatal() => break StopReason::Fatal(err.to_string()),
                Err(err) => {
                    if engine.is_halted() {
                        break StopReason::Fatal(err.to_string());
                    }
                    rejected += 1;
                    warn!(tick = ticks, error = %err, "batch rejected");
                }
            }
        };

        info!(applied, rejected, ?reason, "stream stopped");
        DriveOutcome {
            applied,
            rejected,
            reason,
        }
    }
}
