//! Schema diff between the input and output table of a stage.
//!
//! Added and removed columns are decided by name. A column present on both
//! sides counts as modified when its fingerprint differs: dtype, length and
//! the values at a fixed strided sample of rows. The sample positions depend
//! only on the column length, so a given (before, after) pair always yields
//! the same diff.

use crate::types::Shape;
use crate::utils::{is_float_dtype, is_numeric_dtype, is_unsigned_dtype};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Signed change in rows and columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShapeDelta {
    pub rows: i64,
    pub columns: i64,
}

impl ShapeDelta {
    pub fn between(before: Shape, after: Shape) -> Self {
        Self {
            rows: after.rows as i64 - before.rows as i64,
            columns: after.columns as i64 - before.columns as i64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDiff {
    pub columns_added: Vec<String>,
    pub columns_removed: Vec<String>,
    pub columns_modified: Vec<String>,
    pub input_shape: Shape,
    pub output_shape: Shape,
    pub shape_delta: ShapeDelta,
}

impl SchemaDiff {
    pub fn is_unchanged(&self) -> bool {
        self.columns_added.is_empty()
            && self.columns_removed.is_empty()
            && self.columns_modified.is_empty()
            && self.input_shape == self.output_shape
    }
}

/// Computes [`SchemaDiff`]s with a bounded per-column sample.
#[derive(Debug, Clone, Copy)]
pub struct SchemaDiffEngine {
    sample_rows: usize,
}

impl SchemaDiffEngine {
    /// `sample_rows` bounds how many rows per column are fingerprinted.
    /// The first and last row are always included.
    pub fn new(sample_rows: usize) -> Self {
        Self {
            sample_rows: sample_rows.max(2),
        }
    }

    pub fn diff(&self, before: &DataFrame, after: &DataFrame) -> PolarsResult<SchemaDiff> {
        let before_names: BTreeSet<String> = names(before);
        let after_names: BTreeSet<String> = names(after);

        let columns_added = after_names.difference(&before_names).cloned().collect();
        let columns_removed = before_names.difference(&after_names).cloned().collect();

        let mut columns_modified = Vec::new();
        for name in before_names.intersection(&after_names) {
            let old = before.column(name)?.as_materialized_series();
            let new = after.column(name)?.as_materialized_series();
            if self.fingerprint(old)? != self.fingerprint(new)? {
                columns_modified.push(name.clone());
            }
        }

        let input_shape = Shape::of(before);
        let output_shape = Shape::of(after);
        Ok(SchemaDiff {
            columns_added,
            columns_removed,
            columns_modified,
            input_shape,
            output_shape,
            shape_delta: ShapeDelta::between(input_shape, output_shape),
        })
    }

    /// Hash of dtype, length and sampled values.
    pub fn fingerprint(&self, series: &Series) -> PolarsResult<u64> {
        let mut hasher = DefaultHasher::new();
        series.dtype().to_string().hash(&mut hasher);
        series.len().hash(&mut hasher);

        let rows = sample_positions(series.len(), self.sample_rows);
        if is_float_dtype(series.dtype()) {
            let values = series.cast(&DataType::Float64)?;
            let values = values.f64()?;
            for &row in &rows {
                values.get(row).map(f64::to_bits).hash(&mut hasher);
            }
        } else if is_unsigned_dtype(series.dtype()) {
            let values = series.cast(&DataType::UInt64)?;
            let values = values.u64()?;
            for &row in &rows {
                values.get(row).hash(&mut hasher);
            }
        } else if is_numeric_dtype(series.dtype()) {
            // integers keep their exact value; Float64 loses precision above 2^53
            let values = series.cast(&DataType::Int64)?;
            let values = values.i64()?;
            for &row in &rows {
                values.get(row).hash(&mut hasher);
            }
        } else {
            let values = series.cast(&DataType::String)?;
            let values = values.str()?;
            for &row in &rows {
                values.get(row).hash(&mut hasher);
            }
        }
        Ok(hasher.finish())
    }
}

fn names(df: &DataFrame) -> BTreeSet<String> {
    df.get_column_names().iter().map(|n| n.to_string()).collect()
}

/// Evenly spaced row positions, at most `max` of them, first and last included.
fn sample_positions(len: usize, max: usize) -> Vec<usize> {
    if len <= max {
        return (0..len).collect();
    }
    let mut positions: Vec<usize> = (0..max).map(|i| i * (len - 1) / (max - 1)).collect();
    positions.dedup();
    positions
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_added_removed_modified() {
        let before = df!(
            "age" => [Some(20.0), None, Some(40.0)],
            "city" => ["Oslo", "Rome", "Oslo"],
            "id" => [1i64, 2, 3]
        )
        .unwrap();
        let after = df!(
            "age" => [20.0, 30.0, 40.0],
            "id" => [1i64, 2, 3],
            "city_Oslo" => [1.0, 0.0, 1.0],
            "city_Rome" => [0.0, 1.0, 0.0]
        )
        .unwrap();

        let diff = SchemaDiffEngine::new(1024).diff(&before, &after).unwrap();
        assert_eq!(diff.columns_added, vec!["city_Oslo", "city_Rome"]);
        assert_eq!(diff.columns_removed, vec!["city"]);
        assert_eq!(diff.columns_modified, vec!["age"]);
        assert_eq!(diff.shape_delta, ShapeDelta { rows: 0, columns: 1 });
        assert!(!diff.is_unchanged());
    }

    #[test]
    fn test_dtype_change_is_a_modification() {
        let before = df!("x" => [1i64, 2, 3]).unwrap();
        let after = df!("x" => [1.0, 2.0, 3.0]).unwrap();
        let diff = SchemaDiffEngine::new(8).diff(&before, &after).unwrap();
        assert_eq!(diff.columns_modified, vec!["x"]);
    }

    #[test]
    fn test_diff_is_deterministic() {
        let before = df!("x" => (0..5000).map(|v| v as f64).collect::<Vec<_>>()).unwrap();
        let after = df!("x" => (0..5000).map(|v| v as f64 * 2.0).collect::<Vec<_>>()).unwrap();

        let engine = SchemaDiffEngine::new(64);
        let first = engine.diff(&before, &after).unwrap();
        let second = engine.diff(&before, &after).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.columns_modified, vec!["x"]);

        let same = engine.diff(&before, &before).unwrap();
        assert!(same.is_unchanged());
    }

    #[test]
    fn test_large_integer_change_is_detected() {
        let base = 1i64 << 53;
        let before = df!("x" => [base, 1]).unwrap();
        let after = df!("x" => [base + 1, 1]).unwrap();
        let diff = SchemaDiffEngine::new(1024).diff(&before, &after).unwrap();
        assert_eq!(diff.columns_modified, vec!["x"]);

        let before = df!("y" => [u64::MAX, 0]).unwrap();
        let after = df!("y" => [u64::MAX - 1, 0]).unwrap();
        let diff = SchemaDiffEngine::new(1024).diff(&before, &after).unwrap();
        assert_eq!(diff.columns_modified, vec!["y"]);
    }

    #[test]
    fn test_last_row_is_always_sampled() {
        let positions = sample_positions(10_000, 16);
        assert_eq!(positions.len(), 16);
        assert_eq!(positions[0], 0);
        assert_eq!(*positions.last().unwrap(), 9_999);
        assert_eq!(sample_positions(3, 16), vec![0, 1, 2]);

        let mut values: Vec<f64> = vec![1.0; 10_000];
        let before = df!("x" => values.clone()).unwrap();
        values[9_999] = 2.0;
        let after = df!("x" => values).unwrap();
        let diff = SchemaDiffEngine::new(16).diff(&before, &after).unwrap();
        assert_eq!(diff.columns_modified, vec!["x"]);
    }
}
