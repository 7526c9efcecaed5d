//! Running aggregate state of one group key.

use chrono::{DateTime, Utc};
use ordered_float::OrderedFloat;
use quote_core::{AggregateFn, Column, Error, NormalizedRow, Result};
use std::collections::HashSet;

/// Running state from which every exposed aggregate is computed in O(1).
///
/// Rows are only ever added, so there is no decrement path.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregateBucket {
    count: u64,
    sum_ask: f64,
    sum_bid: f64,
    stocks: HashSet<String>,
    timestamps: HashSet<DateTime<Utc>>,
    ask_prices: HashSet<OrderedFloat<f64>>,
    bid_prices: HashSet<OrderedFloat<f64>>,
}

impl AggregateBucket {
    /// Create an empty bucket.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one row.
    pub fn add(&mut self, row: &NormalizedRow, timestamp: DateTime<Utc>) {
        self.count += 1;
        self.sum_ask += row.top_ask_price;
        self.sum_bid += row.top_bid_price;
        if !self.stocks.contains(&row.stock) {
            self.stocks.insert(row.stock.clone());
        }
        self.timestamps.insert(timestamp);
        self.ask_prices.insert(OrderedFloat(row.top_ask_price));
        self.bid_prices.insert(OrderedFloat(row.top_bid_price));
    }

    /// Fold another bucket into this one (roll-up across a dimension).
    pub fn merge(&mut self, other: &AggregateBucket) {
        self.count += other.count;
        self.sum_ask += other.sum_ask;
        self.sum_bid += other.sum_bid;
        self.stocks.extend(other.stocks.iter().cloned());
        self.timestamps.extend(other.timestamps.iter().copied());
        self.ask_prices.extend(other.ask_prices.iter().copied());
        self.bid_prices.extend(other.bid_prices.iter().copied());
    }

    /// Number of rows.
    #[inline]
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Is the bucket empty?
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Running sum of a price column.
    pub fn sum(&self, column: Column) -> Option<f64> {
        match column {
            Column::TopAskPrice => Some(self.sum_ask),
            Column::TopBidPrice => Some(self.sum_bid),
            Column::Stock | Column::Timestamp => None,
        }
    }

    /// Average of a price column; NaN when the bucket is empty.
    pub fn avg(&self, column: Column) -> Option<f64> {
        let sum = self.sum(column)?;
        if self.count == 0 {
            Some(f64::NAN)
        } else {
            Some(sum / self.count as f64)
        }
    }

    /// Number of distinct values seen in a column.
    pub fn distinct_count(&self, column: Column) -> usize {
        match column {
            Column::Stock => self.stocks.len(),
            Column::Timestamp => self.timestamps.len(),
            Column::TopAskPrice => self.ask_prices.len(),
            Column::TopBidPrice => self.bid_prices.len(),
        }
    }

    /// Distinct stock symbols seen, in no particular order.
    pub fn stocks(&self) -> impl Iterator<Item = &str> {
        self.stocks.iter().map(String::as_str)
    }

    /// Apply an aggregate function to a column.
    pub fn aggregate(&self, column: Column, func: AggregateFn) -> Result<f64> {
        let value = match func {
            AggregateFn::Sum => self.sum(column),
            AggregateFn::Avg => self.avg(column),
            AggregateFn::Count => Some(self.count as f64),
            AggregateFn::DistinctCount => Some(self.distinct_count(column) as f64),
        };
        value.ok_or(Error::UnsupportedAggregate { column, func })
    }

    /// Verify that the distinct trackers agree with the row count.
    pub fn check_consistency(&self) -> Result<()> {
        for column in Column::ALL {
            let distinct = self.distinct_count(column) as u64;
            if distinct > self.count {
                return Err(Error::invariant(format!(
                    "{distinct} distinct {column} values but only {} rows",
                    self.count
                )));
            }
            if self.count > 0 && distinct == 0 {
                return Err(Error::invariant(format!(
                    "{} rows but no tracked {column} values",
                    self.count
                )));
            }
        }
        if self.count == 0 && (self.sum_ask != 0.0 || self.sum_bid != 0.0) {
            return Err(Error::invariant("empty bucket with non-zero sums"));
        }
        Ok(())
    }
}
