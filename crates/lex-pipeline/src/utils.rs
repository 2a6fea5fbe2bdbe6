//! Shared utilities for reading and rebuilding polars columns.
//!
//! Filters work on plain `Vec<Option<f64>>` / `Vec<Option<String>>` buffers
//! extracted here and hand the results back as new columns, so the input
//! frame is never mutated.

use polars::prelude::*;
use std::collections::HashMap;

// =============================================================================
// Data Type Utilities
// =============================================================================

/// Check if a DataType is numeric (integer or float).
#[inline]
pub fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

/// Check if a DataType is a floating point type.
#[inline]
pub fn is_float_dtype(dtype: &DataType) -> bool {
    matches!(dtype, DataType::Float32 | DataType::Float64)
}

/// Check if a DataType is an unsigned integer type.
#[inline]
pub fn is_unsigned_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::UInt8 | DataType::UInt16 | DataType::UInt32 | DataType::UInt64
    )
}

/// Column names of a frame as owned strings, in frame order.
pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names()
        .iter()
        .map(|name| name.to_string())
        .collect()
}

// =============================================================================
// Missing Value Utilities
// =============================================================================

/// Count missing values: nulls, plus NaN for floating columns.
pub fn missing_count(series: &Series) -> PolarsResult<usize> {
    let nulls = series.null_count();
    if !is_float_dtype(series.dtype()) {
        return Ok(nulls);
    }
    let values = series.cast(&DataType::Float64)?;
    let nans = values
        .f64()?
        .into_iter()
        .filter(|v| v.is_some_and(f64::is_nan))
        .count();
    Ok(nulls + nans)
}

// =============================================================================
// Extraction Utilities
// =============================================================================

/// Extract a numeric Series as `f64` values. NaN is mapped to `None`.
pub fn numeric_values(series: &Series) -> PolarsResult<Vec<Option<f64>>> {
    let values = series.cast(&DataType::Float64)?;
    Ok(values
        .f64()?
        .into_iter()
        .map(|v| v.filter(|x| !x.is_nan()))
        .collect())
}

/// Extract any Series as strings. Nulls stay `None`.
pub fn string_values(series: &Series) -> PolarsResult<Vec<Option<String>>> {
    let values = series.cast(&DataType::String)?;
    Ok(values
        .str()?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect())
}

/// Build a Float64 column from optional values.
pub fn float_column(name: &str, values: Vec<Option<f64>>) -> Column {
    Column::from(Series::new(name.into(), values))
}

/// Build a String column from optional values.
pub fn string_column(name: &str, values: Vec<Option<String>>) -> Column {
    Column::from(Series::new(name.into(), values))
}

// =============================================================================
// Statistics Utilities
// =============================================================================

/// Mean of the present values.
pub fn mean(values: &[Option<f64>]) -> Option<f64> {
    let present: Vec<f64> = values.iter().flatten().copied().collect();
    if present.is_empty() {
        return None;
    }
    Some(present.iter().sum::<f64>() / present.len() as f64)
}

/// Median of the present values (average of the two middle values for even counts).
pub fn median(values: &[Option<f64>]) -> Option<f64> {
    let mut present: Vec<f64> = values.iter().flatten().copied().collect();
    if present.is_empty() {
        return None;
    }
    present.sort_by(f64::total_cmp);
    let mid = present.len() / 2;
    if present.len() % 2 == 0 {
        Some((present[mid - 1] + present[mid]) / 2.0)
    } else {
        Some(present[mid])
    }
}

/// Population standard deviation of the present values.
pub fn population_std(values: &[Option<f64>]) -> Option<f64> {
    let mu = mean(values)?;
    let present: Vec<f64> = values.iter().flatten().copied().collect();
    let variance = present.iter().map(|v| (v - mu).powi(2)).sum::<f64>() / present.len() as f64;
    Some(variance.sqrt())
}

/// Minimum and maximum of the present values.
pub fn min_max(values: &[Option<f64>]) -> Option<(f64, f64)> {
    values.iter().flatten().fold(None, |acc, &v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    })
}

/// Most frequent present value. Ties resolve to the lexicographically smallest
/// value so the result is deterministic.
pub fn string_mode(values: &[Option<String>]) -> Option<String> {
    let mut value_counts: HashMap<&str, usize> = HashMap::new();
    for val in values.iter().flatten() {
        *value_counts.entry(val.as_str()).or_insert(0) += 1;
    }

    value_counts
        .into_iter()
        .max_by(|(a_val, a_count), (b_val, b_count)| {
            a_count.cmp(b_count).then_with(|| b_val.cmp(a_val))
        })
        .map(|(val, _)| val.to_string())
}

/// Sorted distinct present values.
pub fn distinct_sorted(values: &[Option<String>]) -> Vec<String> {
    let mut distinct: Vec<String> = values.iter().flatten().cloned().collect();
    distinct.sort();
    distinct.dedup();
    distinct
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_numeric_dtype() {
        assert!(is_numeric_dtype(&DataType::Int64));
        assert!(is_numeric_dtype(&DataType::Float64));
        assert!(!is_numeric_dtype(&DataType::String));
        assert!(!is_numeric_dtype(&DataType::Boolean));
    }

    #[test]
    fn test_missing_count_includes_nan() {
        let series = Series::new("x".into(), &[Some(1.0), None, Some(f64::NAN), Some(4.0)]);
        assert_eq!(missing_count(&series).unwrap(), 2);

        let strings = Series::new("s".into(), &[Some("a"), None, Some("b")]);
        assert_eq!(missing_count(&strings).unwrap(), 1);
    }

    #[test]
    fn test_numeric_values_maps_nan_to_none() {
        let series = Series::new("x".into(), &[Some(1i64), None, Some(3)]);
        assert_eq!(numeric_values(&series).unwrap(), vec![Some(1.0), None, Some(3.0)]);

        let floats = Series::new("f".into(), &[f64::NAN, 2.5]);
        assert_eq!(numeric_values(&floats).unwrap(), vec![None, Some(2.5)]);
    }

    #[test]
    fn test_median_and_mean() {
        let values = vec![Some(3.0), None, Some(1.0), Some(2.0), Some(10.0)];
        assert_eq!(median(&values), Some(2.5));
        assert_eq!(mean(&values), Some(4.0));
        assert_eq!(median(&[None]), None);
    }

    #[test]
    fn test_population_std_and_min_max() {
        let values = vec![Some(2.0), Some(4.0), Some(4.0), Some(4.0), Some(5.0), Some(5.0), Some(7.0), Some(9.0)];
        assert_eq!(population_std(&values), Some(2.0));
        assert_eq!(min_max(&values), Some((2.0, 9.0)));
    }

    #[test]
    fn test_string_mode_is_deterministic_on_ties() {
        let values: Vec<Option<String>> = ["b", "a", "b", "a", "c"]
            .iter()
            .map(|s| Some(s.to_string()))
            .collect();
        assert_eq!(string_mode(&values), Some("a".to_string()));
    }

    #[test]
    fn test_distinct_sorted() {
        let values = vec![Some("z".to_string()), None, Some("a".to_string()), Some("z".to_string())];
        assert_eq!(distinct_sorted(&values), vec!["a".to_string(), "z".to_string()]);
    }
}
