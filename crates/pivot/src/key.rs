//! Group key derivation.

use chrono::{DateTime, Utc};
use quote_core::{floor_to_bucket, Column, Error, KeyValue, NormalizedRow, PivotConfig, Result};
use serde::Serialize;
use std::fmt;

/// Dimension values identifying one aggregation bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct GroupKey(Vec<KeyValue>);

impl GroupKey {
    /// Build a key from values in dimension order.
    pub fn new(values: Vec<KeyValue>) -> Self {
        Self(values)
    }

    /// Values in dimension order.
    pub fn values(&self) -> &[KeyValue] {
        &self.0
    }

    /// Value of the given dimension, if it is part of the key.
    pub fn get(&self, column: Column) -> Option<&KeyValue> {
        self.0.iter().find(|v| v.column() == column)
    }

    /// Sub-key over the given dimensions, in the order given.
    ///
    /// Returns `None` if any requested dimension is not part of this key.
    pub fn project(&self, columns: &[Column]) -> Option<GroupKey> {
        columns
            .iter()
            .map(|&c| self.get(c).cloned())
            .collect::<Option<Vec<_>>>()
            .map(GroupKey)
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, value) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" | ")?;
            }
            write!(f, "{value}")?;
        }
        Ok(())
    }
}

/// A row with its key and parsed timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedRow {
    /// Bucket key.
    pub key: GroupKey,
    /// Exact event time (before any bucketing).
    pub timestamp: DateTime<Utc>,
}

/// Derives group keys under a pivot configuration.
#[derive(Debug, Clone)]
pub struct KeyDeriver {
    dimensions: Vec<Column>,
    bucket_ms: Option<i64>,
}

impl KeyDeriver {
    /// Create a deriver from a validated pivot configuration.
    pub fn new(config: &PivotConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            dimensions: config.dimensions.clone(),
            bucket_ms: config.timestamp_bucket_ms,
        })
    }

    /// Key dimensions in order.
    pub fn dimensions(&self) -> &[Column] {
        &self.dimensions
    }

    /// Derive the key of a row.
    ///
    /// Every row must carry a stock symbol and a parseable timestamp, whether
    /// or not they are key dimensions: both feed the distinct-value trackers.
    pub fn derive(&self, row: &NormalizedRow) -> Result<DerivedRow> {
        if row.stock.trim().is_empty() {
            return Err(Error::invalid_key("empty stock symbol"));
        }
        let timestamp = row.timestamp.parse()?;

        let values = self
            .dimensions
            .iter()
            .map(|dim| match dim {
                Column::Stock => Ok(KeyValue::Stock(row.stock.clone())),
                Column::Timestamp => match self.bucket_ms {
                    Some(ms) => floor_to_bucket(timestamp, ms).map(KeyValue::Timestamp),
                    None => Ok(KeyValue::Timestamp(timestamp)),
                },
                other => Err(Error::invalid_key(format!("{other} is not a dimension"))),
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(DerivedRow {
            key: GroupKey(values),
            timestamp,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quote_core::RawTimestamp;

    fn make_row(stock: &str, ts: &str) -> NormalizedRow {
        NormalizedRow {
            stock: stock.to_string(),
            top_ask_price: 1.0,
            top_bid_price: 1.0,
            timestamp: RawTimestamp::from(ts),
        }
    }

    #[test]
    fn test_default_dimensions() {
        let deriver = KeyDeriver::new(&PivotConfig::default()).unwrap();
        let derived = deriver.derive(&make_row("ABC", "2019-02-01 12:21:51.141248")).unwrap();

        assert_eq!(derived.key.values().len(), 2);
        assert_eq!(derived.key.get(Column::Stock), Some(&KeyValue::Stock("ABC".into())));
        assert_eq!(
            derived.key.get(Column::Timestamp),
            Some(&KeyValue::Timestamp(derived.timestamp))
        );
    }

    #[test]
    fn test_equal_rows_equal_keys() {
        let deriver = KeyDeriver::new(&PivotConfig::default()).unwrap();
        let a = deriver.derive(&make_row("ABC", "2019-02-01 12:21:51.141248")).unwrap();
        // Same instant in another notation.
        let b = deriver.derive(&make_row("ABC", "2019-02-01T12:21:51.141248Z")).unwrap();
        let c = deriver.derive(&make_row("DEF", "2019-02-01 12:21:51.141248")).unwrap();

        assert_eq!(a.key, b.key);
        assert_ne!(a.key, c.key);
    }

    #[test]
    fn test_timestamp_bucketing() {
        let config = PivotConfig {
            dimensions: vec![Column::Timestamp],
            timestamp_bucket_ms: Some(60_000),
        };
        let deriver = KeyDeriver::new(&config).unwrap();
        let a = deriver.derive(&make_row("ABC", "2019-02-01 12:21:01.000")).unwrap();
        let b = deriver.derive(&make_row("DEF", "2019-02-01 12:21:59.999")).unwrap();

        assert_eq!(a.key, b.key);
        assert_ne!(a.timestamp, b.timestamp);
        assert_eq!(a.key.to_string(), "2019-02-01 12:21:00.000");
    }

    #[test]
    fn test_unrepresentable_bucket_start_is_fatal() {
        let config = PivotConfig {
            dimensions: vec![Column::Stock, Column::Timestamp],
            timestamp_bucket_ms: Some(i64::MAX / 2),
        };
        let deriver = KeyDeriver::new(&config).unwrap();
        let row = NormalizedRow {
            timestamp: RawTimestamp::EpochMs(-1),
            ..make_row("ABC", "")
        };

        let err = deriver.derive(&row).unwrap_err();
        assert!(matches!(err, Error::InvalidKey(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_unkeyable_rows_are_fatal() {
        let deriver = KeyDeriver::new(&PivotConfig::default()).unwrap();
        let bad_ts = deriver.derive(&make_row("ABC", "12/31/99")).unwrap_err();
        let no_stock = deriver.derive(&make_row("  ", "2019-02-01 12:21:51")).unwrap_err();
        assert!(bad_ts.is_fatal());
        assert!(no_stock.is_fatal());
    }

    #[test]
    fn test_timestamp_checked_when_not_a_dimension() {
        let config = PivotConfig {
            dimensions: vec![Column::Stock],
            timestamp_bucket_ms: None,
        };
        let deriver = KeyDeriver::new(&config).unwrap();
        assert!(deriver.derive(&make_row("ABC", "garbage")).is_err());
    }

    #[test]
    fn test_project() {
        let deriver = KeyDeriver::new(&PivotConfig::default()).unwrap();
        let derived = deriver.derive(&make_row("ABC", "2019-02-01 12:21:51")).unwrap();

        let by_time = derived.key.project(&[Column::Timestamp]).unwrap();
        assert_eq!(by_time.values(), &[KeyValue::Timestamp(derived.timestamp)]);

        let swapped = derived.key.project(&[Column::Timestamp, Column::Stock]).unwrap();
        assert_eq!(swapped.values()[1], KeyValue::Stock("ABC".into()));

        assert_eq!(derived.key.project(&[]).unwrap().values().len(), 0);
        assert!(by_time.project(&[Column::Stock]).is_none());
    }
}
