//! Append-only aggregation table.
//!
//! Maps group keys to running buckets, in first-seen key order, and keeps the
//! ordered history of accepted rows so buckets can be re-derived under a
//! different pivot configuration.

use crate::bucket::AggregateBucket;
use crate::key::{DerivedRow, GroupKey, KeyDeriver};
use quote_core::{AggregateFn, Column, Error, NormalizedRow, PivotConfig, Result};
use quote_ingestion::RowSink;
use std::collections::HashMap;
use tracing::{debug, error, trace};

/// Incrementally maintained group-by table.
#[derive(Debug, Clone)]
pub struct AggregationTable {
    pivot: PivotConfig,
    deriver: KeyDeriver,
    /// Buckets in first-seen order of their key.
    buckets: Vec<(GroupKey, AggregateBucket)>,
    /// Key -> position in `buckets`.
    index: HashMap<GroupKey, usize>,
    /// Every accepted row, in append order.
    history: Vec<NormalizedRow>,
}

impl AggregationTable {
    /// Create an empty table.
    pub fn new(pivot: PivotConfig) -> Result<Self> {
        let deriver = KeyDeriver::new(&pivot)?;
        Ok(Self {
            pivot,
            deriver,
            buckets: Vec::new(),
            index: HashMap::new(),
            history: Vec::new(),
        })
    }

    /// Append a batch of rows.
    ///
    /// Keys for the whole batch are derived before anything is touched, and the
    /// rows are folded into per-key delta buckets holding only this batch. The
    /// live buckets change only if every row was keyed and every delta is
    /// consistent; each delta is then merged in place, so the cost is linear in
    /// the batch and independent of history.
    pub fn append(&mut self, rows: &[NormalizedRow]) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }

        let derived = self.derive_all(rows)?;

        let mut deltas: Vec<(GroupKey, AggregateBucket)> = Vec::new();
        let mut delta_index: HashMap<GroupKey, usize> = HashMap::new();
        for (row, DerivedRow { key, timestamp }) in rows.iter().zip(derived) {
            let pos = match delta_index.get(&key) {
                Some(&pos) => pos,
                None => {
                    delta_index.insert(key.clone(), deltas.len());
                    deltas.push((key, AggregateBucket::new()));
                    deltas.len() - 1
                }
            };
            deltas[pos].1.add(row, timestamp);
        }

        for (key, delta) in &deltas {
            delta
                .check_consistency()
                .map_err(|err| bucket_error(key, err))?;
        }

        let mut updated = 0usize;
        let mut new_buckets = 0usize;
        for (key, delta) in deltas {
            match self.index.get(&key) {
                Some(&pos) => {
                    let bucket = &mut self.buckets[pos].1;
                    bucket.merge(&delta);
                    // Merging two consistent buckets keeps the invariant, so
                    // this only trips on a corrupted live bucket.
                    bucket
                        .check_consistency()
                        .map_err(|err| bucket_error(&key, err))?;
                    updated += 1;
                }
                None => {
                    trace!(key = %key, "new bucket");
                    self.index.insert(key.clone(), self.buckets.len());
                    self.buckets.push((key, delta));
                    new_buckets += 1;
                }
            }
        }
        self.history.extend_from_slice(rows);

        debug!(
            rows = rows.len(),
            updated,
            new_buckets,
            total_buckets = self.buckets.len(),
            "rows appended"
        );
        Ok(())
    }

    /// Derive keys for a batch, failing on the first unkeyable row.
    fn derive_all(&self, rows: &[NormalizedRow]) -> Result<Vec<DerivedRow>> {
        rows.iter()
            .enumerate()
            .map(|(i, row)| {
                self.deriver.derive(row).map_err(|err| match err {
                    Error::InvalidKey(msg) => {
                        Error::invalid_key(format!("row {i} (stock {:?}): {msg}", row.stock))
                    }
                    other => other,
                })
            })
            .collect()
    }

    /// Re-derive every bucket from the row history under a new pivot configuration.
    ///
    /// The table is left untouched if the history cannot be keyed under `pivot`.
    pub fn rebuild(&mut self, pivot: PivotConfig) -> Result<()> {
        let mut rebuilt = AggregationTable::new(pivot)?;
        rebuilt.append(&self.history)?;
        debug!(
            rows = rebuilt.history.len(),
            buckets = rebuilt.buckets.len(),
            "table rebuilt"
        );
        *self = rebuilt;
        Ok(())
    }

    /// Bucket for a key.
    pub fn bucket(&self, key: &GroupKey) -> Option<&AggregateBucket> {
        self.index.get(key).map(|&pos| &self.buckets[pos].1)
    }

    /// Buckets in first-seen order of their key.
    pub fn buckets(&self) -> impl Iterator<Item = (&GroupKey, &AggregateBucket)> {
        self.buckets.iter().map(|(key, bucket)| (key, bucket))
    }

    /// Keys in first-seen order.
    pub fn keys(&self) -> impl Iterator<Item = &GroupKey> {
        self.buckets.iter().map(|(key, _)| key)
    }

    /// Aggregate of one bucket. An unseen key behaves as an empty bucket.
    pub fn aggregate(&self, key: &GroupKey, column: Column, func: AggregateFn) -> Result<f64> {
        match self.bucket(key) {
            Some(bucket) => bucket.aggregate(column, func),
            None => AggregateBucket::new().aggregate(column, func),
        }
    }

    /// Number of buckets.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    /// Is the table empty?
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Number of rows appended so far.
    pub fn row_count(&self) -> usize {
        self.history.len()
    }

    /// Accepted rows in append order.
    pub fn rows(&self) -> &[NormalizedRow] {
        &self.history
    }

    /// Active pivot configuration.
    pub fn pivot(&self) -> &PivotConfig {
        &self.pivot
    }

    /// Group key dimensions in order.
    pub fn dimensions(&self) -> &[Column] {
        self.deriver.dimensions()
    }

    /// Key a row would be grouped under.
    pub fn key_of(&self, row: &NormalizedRow) -> Result<GroupKey> {
        self.deriver.derive(row).map(|d| d.key)
    }
}

/// Log a bucket invariant failure and tag the error with its key.
fn bucket_error(key: &GroupKey, err: Error) -> Error {
    error!(key = %key, error = %err, "bucket invariant violated");
    match err {
        Error::Invariant(msg) => Error::invariant(format!("bucket [{key}]: {msg}")),
        other => other,
    }
}

impl RowSink for AggregationTable {
    fn append(&mut self, rows: &[NormalizedRow]) -> Result<()> {
        AggregationTable::append(self, rows)
    }
}
