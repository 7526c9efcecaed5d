//! Batch ingestion.
//!
//! Each delivery cycle hands the buffer zero or more raw records. The buffer
//! normalizes them in order and forwards the whole batch to a [`RowSink`] in a
//! single call. Observers are notified only once the sink has accepted the
//! complete batch.

use crate::normalizer::normalize_batch;
use quote_core::{NormalizedRow, RawRecord, Result};
use serde::Serialize;
use tracing::{debug, warn};

/// Destination of normalized rows.
///
/// `append` must apply the batch entirely or not at all.
pub trait RowSink {
    /// Append rows in order.
    fn append(&mut self, rows: &[NormalizedRow]) -> Result<()>;
}

impl RowSink for Vec<NormalizedRow> {
    fn append(&mut self, rows: &[NormalizedRow]) -> Result<()> {
        self.extend_from_slice(rows);
        Ok(())
    }
}

/// A fully applied batch, passed to observers.
#[derive(Debug, Clone, Copy)]
pub struct BatchReport<'a> {
    /// Sequence number of the batch, starting at 1.
    pub sequence: u64,
    /// Rows appended by this batch.
    pub rows: &'a [NormalizedRow],
}

/// Statistics about ingested batches.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestionStats {
    /// Batches applied.
    pub batches: u64,
    /// Batches that carried no records.
    pub empty_batches: u64,
    /// Batches rejected by the sink.
    pub failed_batches: u64,
    /// Rows applied.
    pub rows: u64,
    /// Applied rows whose ask side was absent.
    pub missing_ask: u64,
    /// Applied rows whose bid side was absent.
    pub missing_bid: u64,
}

impl IngestionStats {
    /// Reset statistics.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

type BatchHandler = Box<dyn FnMut(&BatchReport<'_>) + Send>;

/// Normalizes delivered batches and forwards them to a sink.
#[derive(Default)]
pub struct IngestionBuffer {
    handlers: Vec<BatchHandler>,
    sequence: u64,
    stats: IngestionStats,
}

impl IngestionBuffer {
    /// Create an empty buffer with no observers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer invoked after every applied batch.
    pub fn on_batch<F>(&mut self, handler: F)
    where
        F: FnMut(&BatchReport<'_>) + Send + 'static,
    {
        self.handlers.push(Box::new(handler));
    }

    /// Normalize a batch and append it to the sink.
    ///
    /// On error nothing is counted and no observer runs; the sink is expected
    /// to have rejected the batch as a whole.
    pub fn ingest<S>(&mut self, batch: &[RawRecord], sink: &mut S) -> Result<Vec<NormalizedRow>>
    where
        S: RowSink + ?Sized,
    {
        let rows = normalize_batch(batch);

        if let Err(err) = sink.append(&rows) {
            self.stats.failed_batches += 1;
            warn!(
                sequence = self.sequence + 1,
                records = batch.len(),
                error = %err,
                "batch rejected"
            );
            return Err(err);
        }

        self.sequence += 1;
        self.stats.batches += 1;
        self.stats.rows += rows.len() as u64;
        if batch.is_empty() {
            self.stats.empty_batches += 1;
        }
        self.stats.missing_ask += batch.iter().filter(|r| r.top_ask.is_none()).count() as u64;
        self.stats.missing_bid += batch.iter().filter(|r| r.top_bid.is_none()).count() as u64;

        debug!(sequence = self.sequence, rows = rows.len(), "batch applied");

        let report = BatchReport {
            sequence: self.sequence,
            rows: &rows,
        };
        for handler in &mut self.handlers {
            handler(&report);
        }

        Ok(rows)
    }

    /// Sequence number of the last applied batch (0 before any batch).
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Get ingestion statistics.
    pub fn stats(&self) -> &IngestionStats {
        &self.stats
    }

    /// Number of registered observers.
    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quote_core::{Error, QuoteSide, RawTimestamp};
    use std::sync::{Arc, Mutex};

    struct RejectingSink;

    impl RowSink for RejectingSink {
        fn append(&mut self, _rows: &[NormalizedRow]) -> Result<()> {
            Err(Error::invalid_key("rejected"))
        }
    }

    fn make_record(stock: &str, ask: Option<f64>) -> RawRecord {
        RawRecord {
            stock: stock.to_string(),
            top_ask: ask.map(|price| QuoteSide { price, size: 1.0 }),
            top_bid: None,
            timestamp: RawTimestamp::from("2019-02-01 12:21:51.141248"),
        }
    }

    #[test]
    fn test_ingest_forwards_in_order() {
        let mut buffer = IngestionBuffer::new();
        let mut sink: Vec<NormalizedRow> = Vec::new();

        let rows = buffer
            .ingest(&[make_record("ABC", Some(1.0)), make_record("DEF", None)], &mut sink)
            .unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(sink, rows);
        assert_eq!(sink[0].stock, "ABC");
        assert_eq!(sink[1].top_ask_price, 0.0);
        assert_eq!(buffer.sequence(), 1);
    }

    #[test]
    fn test_observers_see_complete_batches() {
        let mut buffer = IngestionBuffer::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        buffer.on_batch(move |report| {
            seen_clone
                .lock()
                .unwrap()
                .push((report.sequence, report.rows.len()));
        });

        let mut sink: Vec<NormalizedRow> = Vec::new();
        buffer.ingest(&[make_record("ABC", Some(1.0))], &mut sink).unwrap();
        buffer.ingest(&[], &mut sink).unwrap();
        buffer
            .ingest(&[make_record("ABC", Some(2.0)), make_record("DEF", Some(3.0))], &mut sink)
            .unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![(1, 1), (2, 0), (3, 2)]);
        assert_eq!(buffer.handler_count(), 1);
    }

    #[test]
    fn test_rejected_batch_is_not_reported() {
        let mut buffer = IngestionBuffer::new();
        let calls = Arc::new(Mutex::new(0u32));
        let calls_clone = Arc::clone(&calls);
        buffer.on_batch(move |_| *calls_clone.lock().unwrap() += 1);

        let result = buffer.ingest(&[make_record("ABC", Some(1.0))], &mut RejectingSink);

        assert!(result.unwrap_err().is_fatal());
        assert_eq!(*calls.lock().unwrap(), 0);
        assert_eq!(buffer.sequence(), 0);
        assert_eq!(buffer.stats().batches, 0);
        assert_eq!(buffer.stats().failed_batches, 1);
    }

    #[test]
    fn test_stats() {
        let mut buffer = IngestionBuffer::new();
        let mut sink: Vec<NormalizedRow> = Vec::new();

        buffer
            .ingest(&[make_record("ABC", Some(1.0)), make_record("DEF", None)], &mut sink)
            .unwrap();
        buffer.ingest(&[], &mut sink).unwrap();

        let stats = buffer.stats();
        assert_eq!(stats.batches, 2);
        assert_eq!(stats.empty_batches, 1);
        assert_eq!(stats.rows, 2);
        assert_eq!(stats.missing_ask, 1);
        assert_eq!(stats.missing_bid, 2);
    }
}
