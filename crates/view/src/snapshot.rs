//! Renderer-facing snapshot of the pivoted view.

use quote_core::{AggregateFn, Column, ViewKind};
use quote_pivot::GroupKey;
use serde::Serialize;

/// One aggregated value; `None` means "no data" (missing bucket or NaN average).
pub type Cell = Option<f64>;

/// One plotted line: a column-pivot value crossed with a displayed column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    /// Column-pivot values identifying the series.
    pub key: GroupKey,
    /// Displayed column.
    pub column: Column,
    /// Aggregate applied to the column.
    pub aggregate: AggregateFn,
    /// Legend label, e.g. `ABC|top_ask_price`.
    pub label: String,
    /// One value per snapshot row.
    pub values: Vec<Cell>,
}

/// Read-only projection of the aggregation table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewSnapshot {
    pub kind: ViewKind,
    pub row_pivots: Vec<Column>,
    pub column_pivots: Vec<Column>,
    /// Row-pivot keys (x-axis), in first-seen order.
    pub rows: Vec<GroupKey>,
    /// Series in first-seen order of their column-pivot key.
    pub series: Vec<Series>,
}

impl ViewSnapshot {
    /// Number of rows (x-axis points).
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Find a series by its legend label.
    pub fn series_by_label(&self, label: &str) -> Option<&Series> {
        self.series.iter().find(|s| s.label == label)
    }

    /// Value at a row/series position.
    pub fn cell(&self, row: usize, series: usize) -> Cell {
        self.series.get(series)?.values.get(row).copied().flatten()
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Changes needed to turn `previous` into this snapshot.
    ///
    /// Rows and series only ever get appended while the view is unchanged, so
    /// the delta lists new rows, new series, and changed cells of the existing
    /// series. When `previous` is not a prefix of this snapshot (the view or
    /// the table pivot changed) the delta asks for a full refresh instead.
    pub fn diff(&self, previous: &ViewSnapshot) -> SnapshotDelta {
        let same_view = self.kind == previous.kind
            && self.row_pivots == previous.row_pivots
            && self.column_pivots == previous.column_pivots;
        let rows_extend = previous.rows.len() <= self.rows.len()
            && previous.rows[..] == self.rows[..previous.rows.len()];
        let series_extend = previous.series.len() <= self.series.len()
            && previous
                .series
                .iter()
                .zip(&self.series)
                .all(|(old, new)| old.label == new.label && old.aggregate == new.aggregate);

        if !(same_view && rows_extend && series_extend) {
            return SnapshotDelta::refresh(self);
        }

        let mut updated = Vec::new();
        for (index, (old, new)) in previous.series.iter().zip(&self.series).enumerate() {
            for (row, &value) in new.values.iter().enumerate() {
                if old.values.get(row).copied().flatten() != value {
                    updated.push(CellUpdate {
                        row,
                        series: index,
                        value,
                    });
                }
            }
        }

        SnapshotDelta {
            full_refresh: false,
            new_rows: self.rows[previous.rows.len()..].to_vec(),
            new_series: self.series[previous.series.len()..].to_vec(),
            updated,
        }
    }
}

/// One changed value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CellUpdate {
    pub row: usize,
    pub series: usize,
    pub value: Cell,
}

/// Append-style update between two snapshots.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnapshotDelta {
    /// The renderer must drop its data and load `new_rows`/`new_series` whole.
    pub full_refresh: bool,
    /// Rows appended at the end.
    pub new_rows: Vec<GroupKey>,
    /// Series appended at the end, with all their values.
    pub new_series: Vec<Series>,
    /// Changed or newly filled cells of pre-existing series.
    pub updated: Vec<CellUpdate>,
}

impl SnapshotDelta {
    fn refresh(snapshot: &ViewSnapshot) -> Self {
        Self {
            full_refresh: true,
            new_rows: snapshot.rows.clone(),
            new_series: snapshot.series.clone(),
            updated: Vec::new(),
        }
    }

    /// Does the delta carry no change?
    pub fn is_empty(&self) -> bool {
        !self.full_refresh
            && self.new_rows.is_empty()
            && self.new_series.is_empty()
            && self.updated.is_empty()
    }
}
