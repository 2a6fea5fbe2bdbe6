//! Feature scaling of numeric columns.

use super::params::{ParameterSchema, ParameterSpec, str_param};
use super::Filter;
use crate::error::FilterExecutionError;
use crate::packet::{DataPacket, stats_key};
use crate::schema::{ColumnKind, TableSchema};
use crate::types::{IssueCode, Parameters, ValidationIssue};
use crate::utils::{float_column, mean, min_max, numeric_values, population_std};
use polars::prelude::*;
use serde_json::json;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Method {
    /// `(x - mean) / std`, population standard deviation.
    Standard,
    /// `(x - min) / (max - min)`.
    MinMax,
}

impl Method {
    fn from_params(params: &Parameters) -> Result<Self, FilterExecutionError> {
        match str_param(params, "method", "standard")? {
            "standard" => Ok(Self::Standard),
            "minmax" => Ok(Self::MinMax),
            other => Err(FilterExecutionError::InvalidParameter {
                name: "method".to_string(),
                reason: format!("unsupported scaling method '{other}'"),
            }),
        }
    }

    /// Offset and divisor for one column. A zero spread maps to divisor 1 so
    /// constant columns come out as all zeros.
    fn coefficients(self, values: &[Option<f64>]) -> (f64, f64) {
        let (offset, spread) = match self {
            Self::Standard => (
                mean(values).unwrap_or(0.0),
                population_std(values).unwrap_or(0.0),
            ),
            Self::MinMax => match min_max(values) {
                Some((lo, hi)) => (lo, hi - lo),
                None => (0.0, 0.0),
            },
        };
        let divisor = if spread.abs() < f64::EPSILON { 1.0 } else { spread };
        (offset, divisor)
    }
}

/// Rescales every numeric column. Categorical columns pass through.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScaleFilter;

impl Filter for ScaleFilter {
    fn kind(&self) -> &'static str {
        "scale"
    }

    fn display_name(&self) -> &'static str {
        "Scale Numeric Features"
    }

    fn declare_parameters(&self) -> ParameterSchema {
        ParameterSchema::new(vec![ParameterSpec::choice(
            "method",
            &["standard", "minmax"],
            "standard",
            "Standardize to zero mean and unit variance, or rescale to [0, 1]",
        )])
    }

    fn project_schema(&self, input: &TableSchema, _params: &Parameters) -> TableSchema {
        input.clone()
    }

    fn validate_against_data(&self, input: &TableSchema, _params: &Parameters) -> Vec<ValidationIssue> {
        if input.numeric_columns().next().is_none() {
            return vec![ValidationIssue::warning(
                IssueCode::NoNumericColumns,
                "Scale is enabled, but no numeric columns will be present at this stage.",
            )];
        }
        Vec::new()
    }

    fn apply(&self, packet: &DataPacket, params: &Parameters) -> Result<DataPacket, FilterExecutionError> {
        self.ensure_applicable(packet, params)?;
        let method = Method::from_params(params)?;
        let df = packet.table();

        let mut columns = Vec::with_capacity(df.width());
        let mut scaled_columns = Vec::new();
        let mut constant_columns = Vec::new();

        for column in df.get_columns() {
            let series = column.as_materialized_series();
            if ColumnKind::of(series.dtype()) != ColumnKind::Numeric {
                columns.push(column.clone());
                continue;
            }

            let name = series.name().to_string();
            let values = numeric_values(series)?;
            let (offset, divisor) = method.coefficients(&values);
            if divisor == 1.0 && values.iter().flatten().all(|v| *v == offset) {
                constant_columns.push(name.clone());
            }
            debug!("Scaling '{}' with offset {} and divisor {}", name, offset, divisor);

            let scaled = values
                .into_iter()
                .map(|v| v.map(|x| (x - offset) / divisor))
                .collect();
            columns.push(float_column(&name, scaled));
            scaled_columns.push(name);
        }

        let table = DataFrame::new(columns)?;
        let stats = json!({
            "method": str_param(params, "method", "standard")?,
            "scaled_columns": scaled_columns,
            "constant_columns": constant_columns,
        });

        Ok(packet.with_table(table).with_metadata(stats_key(self.kind()), stats))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn values(packet: &DataPacket, name: &str) -> Vec<Option<f64>> {
        numeric_values(packet.table().column(name).unwrap().as_materialized_series()).unwrap()
    }

    #[test]
    fn test_standard_scaling() {
        let input = DataPacket::new(
            df!(
                "x" => [1.0, 2.0, 3.0],
                "label" => ["a", "b", "c"]
            )
            .unwrap(),
        );
        let out = ScaleFilter.apply(&input, &Parameters::new()).unwrap();

        let x = values(&out, "x");
        let std = (2.0f64 / 3.0).sqrt();
        assert!((x[0].unwrap() + 1.0 / std).abs() < 1e-12);
        assert!(x[1].unwrap().abs() < 1e-12);
        assert_eq!(out.table().column("label").unwrap().dtype(), &DataType::String);
    }

    #[test]
    fn test_minmax_keeps_nulls_and_handles_constants() {
        let input = DataPacket::new(
            df!(
                "x" => [Some(10i64), None, Some(20), Some(15)],
                "flat" => [4.0, 4.0, 4.0, 4.0]
            )
            .unwrap(),
        );
        let mut params = Parameters::new();
        params.insert("method".to_string(), json!("minmax"));

        let out = ScaleFilter.apply(&input, &params).unwrap();
        assert_eq!(values(&out, "x"), vec![Some(0.0), None, Some(1.0), Some(0.5)]);
        assert_eq!(values(&out, "flat"), vec![Some(0.0); 4]);

        let stats = out.stats_for("scale").unwrap();
        assert_eq!(stats["constant_columns"], json!(["flat"]));
        assert_eq!(stats["scaled_columns"], json!(["x", "flat"]));
    }

    #[test]
    fn test_warns_without_numeric_columns() {
        let schema = TableSchema::from_frame(&df!("s" => ["a", "b"]).unwrap()).unwrap();
        let issues = ScaleFilter.validate_against_data(&schema, &Parameters::new());
        assert_eq!(issues[0].code, IssueCode::NoNumericColumns);
        assert!(!issues[0].is_error());
    }
}
