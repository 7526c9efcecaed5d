//! Core data types for the quote pivot system.

use crate::error::{Error, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Timestamp in milliseconds since Unix epoch (UTC).
pub type TimestampMs = i64;

/// Naive formats emitted by the quote server, interpreted as UTC.
const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// Floor a timestamp to the start of its bucket.
///
/// Fails with [`Error::InvalidKey`] when the bucket start is not representable.
#[inline]
pub fn floor_to_bucket(ts: DateTime<Utc>, bucket_ms: i64) -> Result<DateTime<Utc>> {
    let ms = ts.timestamp_millis();
    let floored = ms.div_euclid(bucket_ms) * bucket_ms;
    DateTime::from_timestamp_millis(floored).ok_or_else(|| {
        Error::invalid_key(format!(
            "timestamp {ts} floors to {floored} ms, outside the representable range"
        ))
    })
}

/// One side of the top of book.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuoteSide {
    /// Best price on this side.
    pub price: f64,
    /// Size available at the best price.
    #[serde(default)]
    pub size: f64,
}

/// Timestamp exactly as the data source delivered it.
///
/// Parsing is deferred to group key derivation so that normalization never fails.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawTimestamp {
    /// Milliseconds since Unix epoch.
    EpochMs(i64),
    /// Text such as `2019-02-01 12:21:51.141248` or RFC 3339.
    Text(String),
}

impl RawTimestamp {
    /// Parse into a UTC instant.
    pub fn parse(&self) -> Result<DateTime<Utc>> {
        match self {
            RawTimestamp::EpochMs(ms) => DateTime::from_timestamp_millis(*ms)
                .ok_or_else(|| Error::invalid_key(format!("epoch timestamp out of range: {ms}"))),
            RawTimestamp::Text(text) => {
                let text = text.trim();
                if text.is_empty() {
                    return Err(Error::invalid_key("empty timestamp"));
                }
                if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
                    return Ok(ts.with_timezone(&Utc));
                }
                NAIVE_FORMATS
                    .iter()
                    .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
                    .map(|naive| naive.and_utc())
                    .ok_or_else(|| Error::invalid_key(format!("unparseable timestamp: {text:?}")))
            }
        }
    }
}

impl From<DateTime<Utc>> for RawTimestamp {
    fn from(ts: DateTime<Utc>) -> Self {
        RawTimestamp::Text(ts.format("%Y-%m-%d %H:%M:%S%.6f").to_string())
    }
}

impl From<&str> for RawTimestamp {
    fn from(text: &str) -> Self {
        RawTimestamp::Text(text.to_string())
    }
}

impl fmt::Display for RawTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawTimestamp::EpochMs(ms) => write!(f, "{ms}"),
            RawTimestamp::Text(text) => f.write_str(text),
        }
    }
}

/// One observed market event, as delivered by the data source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    /// Stock symbol.
    pub stock: String,
    /// Best ask, if one was quoted.
    #[serde(default)]
    pub top_ask: Option<QuoteSide>,
    /// Best bid, if one was quoted.
    #[serde(default)]
    pub top_bid: Option<QuoteSide>,
    /// Event time.
    pub timestamp: RawTimestamp,
}

/// Canonical row stored in the aggregation table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRow {
    /// Stock symbol.
    pub stock: String,
    /// Best ask price, 0.0 when no ask was quoted.
    pub top_ask_price: f64,
    /// Best bid price, 0.0 when no bid was quoted.
    pub top_bid_price: f64,
    /// Event time, unchanged from the raw record.
    pub timestamp: RawTimestamp,
}

impl NormalizedRow {
    /// Numeric value of a price column, `None` for non-numeric columns.
    #[inline]
    pub fn price(&self, column: Column) -> Option<f64> {
        match column {
            Column::TopAskPrice => Some(self.top_ask_price),
            Column::TopBidPrice => Some(self.top_bid_price),
            Column::Stock | Column::Timestamp => None,
        }
    }
}

/// A column of the row schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Column {
    Stock,
    TopAskPrice,
    TopBidPrice,
    Timestamp,
}

impl Column {
    /// All columns in schema order.
    pub const ALL: [Column; 4] = [
        Column::Stock,
        Column::TopAskPrice,
        Column::TopBidPrice,
        Column::Timestamp,
    ];

    /// Column name on the wire.
    pub fn name(self) -> &'static str {
        match self {
            Column::Stock => "stock",
            Column::TopAskPrice => "top_ask_price",
            Column::TopBidPrice => "top_bid_price",
            Column::Timestamp => "timestamp",
        }
    }

    /// Is this a float column?
    pub fn is_numeric(self) -> bool {
        matches!(self, Column::TopAskPrice | Column::TopBidPrice)
    }

    /// Can rows be grouped by this column?
    pub fn is_dimension(self) -> bool {
        !self.is_numeric()
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Aggregate function applied to a column within a bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AggregateFn {
    #[serde(rename = "sum")]
    Sum,
    /// Running sum over running count; NaN for an empty bucket.
    #[serde(rename = "avg")]
    Avg,
    #[serde(rename = "count")]
    Count,
    /// Cardinality of the distinct values seen, not the row count.
    #[serde(rename = "distinct count", alias = "distinct_count")]
    DistinctCount,
}

impl AggregateFn {
    /// Function name on the wire.
    pub fn name(self) -> &'static str {
        match self {
            AggregateFn::Sum => "sum",
            AggregateFn::Avg => "avg",
            AggregateFn::Count => "count",
            AggregateFn::DistinctCount => "distinct count",
        }
    }

    /// Whether this function can be applied to the column.
    pub fn supports(self, column: Column) -> bool {
        match self {
            AggregateFn::Sum | AggregateFn::Avg => column.is_numeric(),
            AggregateFn::Count | AggregateFn::DistinctCount => true,
        }
    }
}

impl fmt::Display for AggregateFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Rendering mode of a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViewKind {
    /// One line per column-pivot value, x-axis is the row pivot.
    #[serde(rename = "y_line")]
    YLine,
}

/// Typed value of one grouping dimension.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeyValue {
    Stock(String),
    Timestamp(DateTime<Utc>),
}

impl KeyValue {
    /// The column this value belongs to.
    pub fn column(&self) -> Column {
        match self {
            KeyValue::Stock(_) => Column::Stock,
            KeyValue::Timestamp(_) => Column::Timestamp,
        }
    }
}

impl fmt::Display for KeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyValue::Stock(stock) => f.write_str(stock),
            KeyValue::Timestamp(ts) => write!(f, "{}", ts.format("%Y-%m-%d %H:%M:%S%.3f")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_server_timestamp() {
        let ts = RawTimestamp::from("2019-02-01 12:21:51.141248").parse().unwrap();
        assert_eq!(ts.timestamp(), 1549023711);
        assert_eq!(ts.timestamp_subsec_micros(), 141248);
    }

    #[test]
    fn test_parse_rfc3339_and_epoch() {
        let text = RawTimestamp::from("2024-01-01T00:01:30.500Z").parse().unwrap();
        let epoch = RawTimestamp::EpochMs(1704067290500).parse().unwrap();
        assert_eq!(text, epoch);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(RawTimestamp::from("yesterday").parse().unwrap_err().is_fatal());
        assert!(RawTimestamp::from("   ").parse().is_err());
        assert!(RawTimestamp::EpochMs(i64::MAX).parse().is_err());
    }

    #[test]
    fn test_floor_to_bucket() {
        // 2024-01-01 00:01:30.500 -> 2024-01-01 00:01:00.000
        let ts = Utc.timestamp_millis_opt(1704067290500).unwrap();
        let floored = floor_to_bucket(ts, 60_000).unwrap();
        assert_eq!(floored.timestamp_millis(), 1704067260000);

        let before_epoch = Utc.timestamp_millis_opt(-1).unwrap();
        let err = floor_to_bucket(before_epoch, i64::MAX / 2).unwrap_err();
        assert!(matches!(err, Error::InvalidKey(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_raw_record_wire_shape() {
        let json = r#"{
            "stock": "ABC",
            "top_ask": {"price": 121.2, "size": 36},
            "top_bid": null,
            "timestamp": "2019-02-01 12:21:51.141248"
        }"#;
        let record: RawRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.stock, "ABC");
        assert_eq!(record.top_ask.map(|q| q.price), Some(121.2));
        assert!(record.top_bid.is_none());

        let missing_sides: RawRecord =
            serde_json::from_str(r#"{"stock": "DEF", "timestamp": 1704067290500}"#).unwrap();
        assert!(missing_sides.top_ask.is_none());
        assert_eq!(missing_sides.timestamp, RawTimestamp::EpochMs(1704067290500));
    }

    #[test]
    fn test_aggregate_wire_names() {
        let f: AggregateFn = serde_json::from_str(r#""distinct count""#).unwrap();
        assert_eq!(f, AggregateFn::DistinctCount);
        let f: AggregateFn = serde_json::from_str(r#""distinct_count""#).unwrap();
        assert_eq!(f, AggregateFn::DistinctCount);
        assert_eq!(serde_json::to_string(&AggregateFn::Avg).unwrap(), r#""avg""#);
    }

    #[test]
    fn test_aggregate_support() {
        assert!(AggregateFn::Avg.supports(Column::TopAskPrice));
        assert!(!AggregateFn::Sum.supports(Column::Stock));
        assert!(AggregateFn::DistinctCount.supports(Column::Timestamp));
        assert!(Column::Timestamp.is_dimension());
        assert!(!Column::TopBidPrice.is_dimension());
    }
}
