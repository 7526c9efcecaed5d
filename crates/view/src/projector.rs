//! View projection.
//!
//! Rolls table buckets up onto the view's row and column pivots. Buckets already
//! hold maintained aggregates, so a projection costs O(buckets x columns) and
//! never touches the row history.

use crate::snapshot::{Cell, Series, ViewSnapshot};
use crate::spec::ViewSpec;
use quote_core::{Error, Result};
use quote_pivot::{AggregateBucket, AggregationTable, GroupKey};
use std::borrow::Cow;
use std::collections::HashMap;
use tracing::trace;

/// Ordered set of keys, indexed by first appearance.
#[derive(Default)]
struct KeyAxis {
    keys: Vec<GroupKey>,
    index: HashMap<GroupKey, usize>,
}

impl KeyAxis {
    fn position(&mut self, key: GroupKey) -> usize {
        if let Some(&pos) = self.index.get(&key) {
            return pos;
        }
        let pos = self.keys.len();
        self.index.insert(key.clone(), pos);
        self.keys.push(key);
        pos
    }
}

/// Project the table onto a view.
///
/// Deterministic in the table state: row and series order follow the
/// first-seen order of table keys, so repeated calls without an intervening
/// append return equal snapshots.
pub fn project(table: &AggregationTable, spec: &ViewSpec) -> Result<ViewSnapshot> {
    spec.validate_for(table.dimensions())?;

    let mut rows = KeyAxis::default();
    let mut groups = KeyAxis::default();
    let mut cells: HashMap<(usize, usize), Cow<'_, AggregateBucket>> = HashMap::new();

    for (key, bucket) in table.buckets() {
        let (row_key, group_key) = key
            .project(spec.row_pivots())
            .zip(key.project(spec.column_pivots()))
            .ok_or_else(|| Error::invariant(format!("bucket [{key}] lacks a pivot dimension")))?;
        let cell = (rows.position(row_key), groups.position(group_key));
        match cells.get_mut(&cell) {
            Some(merged) => merged.to_mut().merge(bucket),
            None => {
                cells.insert(cell, Cow::Borrowed(bucket));
            }
        }
    }

    let mut series = Vec::with_capacity(groups.keys.len() * spec.columns().len());
    for (group, group_key) in groups.keys.into_iter().enumerate() {
        for &column in spec.columns() {
            let aggregate = spec
                .aggregate_for(column)
                .ok_or_else(|| Error::config(format!("no aggregate configured for {column}")))?;

            let values = (0..rows.keys.len())
                .map(|row| {
                    cells
                        .get(&(row, group))
                        .map(|bucket| bucket.aggregate(column, aggregate))
                        .transpose()
                        .map(|value: Cell| value.filter(|v| !v.is_nan()))
                })
                .collect::<Result<Vec<Cell>>>()?;

            series.push(Series {
                label: series_label(&group_key, column.name()),
                key: group_key.clone(),
                column,
                aggregate,
                values,
            });
        }
    }

    trace!(
        buckets = table.len(),
        rows = rows.keys.len(),
        series = series.len(),
        "view projected"
    );

    Ok(ViewSnapshot {
        kind: spec.kind(),
        row_pivots: spec.row_pivots().to_vec(),
        column_pivots: spec.column_pivots().to_vec(),
        rows: rows.keys,
        series,
    })
}

/// Legend label: column-pivot values and the column name, `|`-separated.
fn series_label(group: &GroupKey, column: &str) -> String {
    group
        .values()
        .iter()
        .map(|v| v.to_string())
        .chain(std::iter::once(column.to_string()))
        .collect::<Vec<_>>()
        .join("|")
}
