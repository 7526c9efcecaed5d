//! Configuration structures for the quote pivot system.

use crate::error::{Error, Result};
use crate::types::{AggregateFn, Column, ViewKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Main configuration for the streaming pivot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Grouping configuration of the aggregation table.
    pub pivot: PivotConfig,
    /// View handed to the renderer.
    pub view: ViewConfig,
    /// Demo stream harness configuration.
    pub stream: StreamConfig,
}

impl Config {
    /// Parse and validate a JSON configuration.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON configuration file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<()> {
        self.pivot.validate()?;
        self.stream.validate()
    }
}

/// Grouping dimensions of the aggregation table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PivotConfig {
    /// Dimensions forming the group key, in key order.
    pub dimensions: Vec<Column>,
    /// Timestamp bucket width in ms. `None` groups by exact timestamp.
    pub timestamp_bucket_ms: Option<i64>,
}

impl Default for PivotConfig {
    fn default() -> Self {
        Self {
            dimensions: vec![Column::Stock, Column::Timestamp],
            timestamp_bucket_ms: None,
        }
    }
}

impl PivotConfig {
    /// Check that the dimensions form a usable key.
    pub fn validate(&self) -> Result<()> {
        if self.dimensions.is_empty() {
            return Err(Error::config("pivot.dimensions must not be empty"));
        }
        for (i, dim) in self.dimensions.iter().enumerate() {
            if !dim.is_dimension() {
                return Err(Error::config(format!("{dim} cannot be a grouping dimension")));
            }
            if self.dimensions[..i].contains(dim) {
                return Err(Error::config(format!("duplicate grouping dimension {dim}")));
            }
        }
        if let Some(ms) = self.timestamp_bucket_ms {
            if ms <= 0 {
                return Err(Error::config("pivot.timestamp_bucket_ms must be positive"));
            }
        }
        Ok(())
    }

    /// Is the column part of the group key?
    pub fn has_dimension(&self, column: Column) -> bool {
        self.dimensions.contains(&column)
    }
}

/// Declarative view consumed by the chart renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    /// Chart type.
    #[serde(rename = "view")]
    pub kind: ViewKind,
    /// Dimensions along the x-axis.
    pub row_pivots: Vec<Column>,
    /// Dimensions splitting the data into series.
    pub column_pivots: Vec<Column>,
    /// Displayed measures.
    pub columns: Vec<Column>,
    /// Aggregate function per column.
    pub aggregates: BTreeMap<Column, AggregateFn>,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            kind: ViewKind::YLine,
            row_pivots: vec![Column::Timestamp],
            column_pivots: vec![Column::Stock],
            columns: vec![Column::TopAskPrice],
            aggregates: BTreeMap::from([
                (Column::Stock, AggregateFn::DistinctCount),
                (Column::TopAskPrice, AggregateFn::Avg),
                (Column::TopBidPrice, AggregateFn::Avg),
                (Column::Timestamp, AggregateFn::DistinctCount),
            ]),
        }
    }
}

/// Demo harness configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Delay between delivery cycles (ms).
    pub poll_interval_ms: u64,
    /// Symbols quoted by the simulated source.
    pub symbols: Vec<String>,
    /// Starting price of every simulated symbol.
    pub start_price: f64,
    /// Stop after this many cycles (`None` = run until interrupted).
    pub max_ticks: Option<u64>,
    /// RNG seed for reproducible runs.
    pub seed: Option<u64>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 100,
            symbols: vec!["ABC".to_string(), "DEF".to_string()],
            start_price: 100.0,
            max_ticks: None,
            seed: None,
        }
    }
}

impl StreamConfig {
    /// Check the harness settings.
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(Error::config("stream.poll_interval_ms must be positive"));
        }
        if self.symbols.iter().any(|s| s.trim().is_empty()) {
            return Err(Error::config("stream.symbols must not contain empty names"));
        }
        if !(self.start_price.is_finite() && self.start_price > 0.0) {
            return Err(Error::config("stream.start_price must be a positive number"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.pivot.dimensions, vec![Column::Stock, Column::Timestamp]);
        assert_eq!(config.view.row_pivots, vec![Column::Timestamp]);
        assert_eq!(config.view.aggregates[&Column::TopAskPrice], AggregateFn::Avg);
        assert_eq!(config.stream.poll_interval_ms, 100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_view_config_wire_shape() {
        let json = r#"{
            "view": {
                "view": "y_line",
                "row_pivots": ["timestamp"],
                "column_pivots": ["stock"],
                "columns": ["top_ask_price"],
                "aggregates": {
                    "stock": "distinct count",
                    "top_ask_price": "avg",
                    "top_bid_price": "avg",
                    "timestamp": "distinct count"
                }
            }
        }"#;
        let config = Config::from_json_str(json).unwrap();
        assert_eq!(config.view, ViewConfig::default());
        assert_eq!(config.pivot, PivotConfig::default());
    }

    #[test]
    fn test_invalid_pivot_dimensions() {
        let empty = PivotConfig { dimensions: vec![], timestamp_bucket_ms: None };
        assert!(empty.validate().is_err());

        let numeric = PivotConfig {
            dimensions: vec![Column::TopAskPrice],
            timestamp_bucket_ms: None,
        };
        assert!(numeric.validate().is_err());

        let duplicate = PivotConfig {
            dimensions: vec![Column::Stock, Column::Stock],
            timestamp_bucket_ms: None,
        };
        assert!(duplicate.validate().is_err());

        let bad_bucket = PivotConfig {
            timestamp_bucket_ms: Some(0),
            ..PivotConfig::default()
        };
        assert!(bad_bucket.validate().is_err());
    }

    #[test]
    fn test_invalid_stream_config() {
        let json = r#"{"stream": {"poll_interval_ms": 0}}"#;
        assert!(matches!(Config::from_json_str(json), Err(Error::Config(_))));
    }
}
