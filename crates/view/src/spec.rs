//! Validated view definition.

use quote_core::{AggregateFn, Column, Error, Result, ViewConfig, ViewKind};

/// A view the projector can evaluate.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewSpec {
    config: ViewConfig,
}

impl ViewSpec {
    /// Validate a view configuration.
    pub fn new(config: ViewConfig) -> Result<Self> {
        let pivots = config.row_pivots.iter().chain(&config.column_pivots);
        for (i, &pivot) in pivots.clone().enumerate() {
            if !pivot.is_dimension() {
                return Err(Error::config(format!("{pivot} cannot be used as a pivot")));
            }
            if pivots.clone().take(i).any(|&p| p == pivot) {
                return Err(Error::config(format!("{pivot} is pivoted more than once")));
            }
        }
        if config.columns.is_empty() {
            return Err(Error::config("view must display at least one column"));
        }
        for &column in &config.columns {
            if !config.aggregates.contains_key(&column) {
                return Err(Error::config(format!("no aggregate configured for {column}")));
            }
        }
        for (&column, &func) in &config.aggregates {
            if !func.supports(column) {
                return Err(Error::UnsupportedAggregate { column, func });
            }
        }
        Ok(Self { config })
    }

    /// Check that every pivot is a dimension of the table being projected.
    pub fn validate_for(&self, dimensions: &[Column]) -> Result<()> {
        for pivot in self.config.row_pivots.iter().chain(&self.config.column_pivots) {
            if !dimensions.contains(pivot) {
                return Err(Error::config(format!(
                    "view pivots on {pivot}, which the table does not group by"
                )));
            }
        }
        Ok(())
    }

    /// Chart kind.
    pub fn kind(&self) -> ViewKind {
        self.config.kind
    }

    /// Dimensions laid out as chart rows.
    pub fn row_pivots(&self) -> &[Column] {
        &self.config.row_pivots
    }

    /// Dimensions split into separate series.
    pub fn column_pivots(&self) -> &[Column] {
        &self.config.column_pivots
    }

    /// Displayed measures, in display order.
    pub fn columns(&self) -> &[Column] {
        &self.config.columns
    }

    /// Aggregate applied to a column.
    pub fn aggregate_for(&self, column: Column) -> Option<AggregateFn> {
        self.config.aggregates.get(&column).copied()
    }

    /// Underlying configuration.
    pub fn config(&self) -> &ViewConfig {
        &self.config
    }
}

impl Default for ViewSpec {
    fn default() -> Self {
        Self {
            config: ViewConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_view_is_valid() {
        let spec = ViewSpec::new(ViewConfig::default()).unwrap();
        assert_eq!(spec, ViewSpec::default());
        assert_eq!(spec.kind(), ViewKind::YLine);
        assert_eq!(spec.aggregate_for(Column::TopAskPrice), Some(AggregateFn::Avg));
        assert!(spec.validate_for(&[Column::Stock, Column::Timestamp]).is_ok());
        assert!(spec.validate_for(&[Column::Timestamp]).is_err());
    }

    #[test]
    fn test_rejects_numeric_pivot() {
        let config = ViewConfig {
            row_pivots: vec![Column::TopBidPrice],
            ..ViewConfig::default()
        };
        assert!(matches!(ViewSpec::new(config), Err(Error::Config(_))));
    }

    #[test]
    fn test_rejects_repeated_pivot() {
        let config = ViewConfig {
            row_pivots: vec![Column::Stock],
            column_pivots: vec![Column::Stock],
            ..ViewConfig::default()
        };
        assert!(ViewSpec::new(config).is_err());
    }

    #[test]
    fn test_rejects_column_without_aggregate() {
        let mut config = ViewConfig::default();
        config.aggregates.remove(&Column::TopAskPrice);
        assert!(ViewSpec::new(config).is_err());

        let empty = ViewConfig {
            columns: vec![],
            ..ViewConfig::default()
        };
        assert!(ViewSpec::new(empty).is_err());
    }

    #[test]
    fn test_rejects_unsupported_aggregate() {
        let mut config = ViewConfig::default();
        config.aggregates.insert(Column::Stock, AggregateFn::Avg);
        assert!(matches!(
            ViewSpec::new(config),
            Err(Error::UnsupportedAggregate { column: Column::Stock, func: AggregateFn::Avg })
        ));
    }
}
