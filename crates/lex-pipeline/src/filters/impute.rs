//! Missing value imputation.
//!
//! Numeric columns are filled with a statistic of their present values,
//! categorical columns with their most frequent value or a constant
//! category. The schema is unchanged apart from missing counts.

use super::params::{ParameterSchema, ParameterSpec, str_param};
use super::Filter;
use crate::error::FilterExecutionError;
use crate::packet::{DataPacket, stats_key};
use crate::schema::{ColumnKind, TableSchema};
use crate::types::{IssueCode, Parameters, ValidationIssue};
use crate::utils::{
    float_column, mean, median, missing_count, numeric_values, string_column, string_mode,
    string_values,
};
use polars::prelude::*;
use serde_json::json;
use tracing::debug;

/// Category used by the constant strategy and as fallback for columns without
/// any observed value.
pub const CONSTANT_CATEGORY: &str = "Unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NumericStrategy {
    Median,
    Mean,
    Zero,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CategoricalStrategy {
    MostFrequent,
    Constant,
}

#[derive(Debug, Clone, Copy)]
struct Settings {
    numeric: NumericStrategy,
    categorical: CategoricalStrategy,
}

impl Settings {
    fn from_params(params: &Parameters) -> Result<Self, FilterExecutionError> {
        let numeric = match str_param(params, "numeric_strategy", "median")? {
            "median" => NumericStrategy::Median,
            "mean" => NumericStrategy::Mean,
            "zero" => NumericStrategy::Zero,
            other => return Err(invalid("numeric_strategy", other)),
        };
        let categorical = match str_param(params, "categorical_strategy", "most_frequent")? {
            "most_frequent" => CategoricalStrategy::MostFrequent,
            "constant" => CategoricalStrategy::Constant,
            other => return Err(invalid("categorical_strategy", other)),
        };
        Ok(Self { numeric, categorical })
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            numeric: NumericStrategy::Median,
            categorical: CategoricalStrategy::MostFrequent,
        }
    }
}

fn invalid(name: &str, value: &str) -> FilterExecutionError {
    FilterExecutionError::InvalidParameter {
        name: name.to_string(),
        reason: format!("unsupported strategy '{value}'"),
    }
}

/// Fills missing values column by column.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImputeFilter;

impl Filter for ImputeFilter {
    fn kind(&self) -> &'static str {
        "impute"
    }

    fn display_name(&self) -> &'static str {
        "Impute Missing Values"
    }

    fn declare_parameters(&self) -> ParameterSchema {
        ParameterSchema::new(vec![
            ParameterSpec::choice(
                "numeric_strategy",
                &["median", "mean", "zero"],
                "median",
                "Statistic used to fill numeric columns",
            ),
            ParameterSpec::choice(
                "categorical_strategy",
                &["most_frequent", "constant"],
                "most_frequent",
                "Fill categorical columns with their mode or with the 'Unknown' category",
            ),
        ])
    }

    fn project_schema(&self, input: &TableSchema, params: &Parameters) -> TableSchema {
        let settings = Settings::from_params(params).unwrap_or_default();
        let mut output = input.clone();
        for column in &mut output.columns {
            if column.kind == ColumnKind::Categorical && column.has_missing() {
                let adds_constant = settings.categorical == CategoricalStrategy::Constant
                    || column.categories.is_empty();
                if adds_constant && !column.categories.iter().any(|c| c == CONSTANT_CATEGORY) {
                    column.categories.push(CONSTANT_CATEGORY.to_string());
                    column.categories.sort();
                }
            }
            column.missing = 0;
        }
        output
    }

    fn validate_against_data(&self, input: &TableSchema, _params: &Parameters) -> Vec<ValidationIssue> {
        if input.total_missing() == 0 {
            return vec![ValidationIssue::warning(
                IssueCode::NothingToImpute,
                "Impute is enabled, but no missing values will be present at this stage.",
            )];
        }
        Vec::new()
    }

    fn apply(&self, packet: &DataPacket, params: &Parameters) -> Result<DataPacket, FilterExecutionError> {
        self.ensure_applicable(packet, params)?;
        let settings = Settings::from_params(params)?;
        let df = packet.table();

        let mut columns = Vec::with_capacity(df.width());
        let mut imputed_columns = Vec::new();
        let mut missing_before = 0usize;

        for column in df.get_columns() {
            let series = column.as_materialized_series();
            let name = series.name().to_string();
            let missing = missing_count(series)?;
            missing_before += missing;

            if missing == 0 {
                columns.push(column.clone());
                continue;
            }

            let filled = match ColumnKind::of(series.dtype()) {
                ColumnKind::Numeric => {
                    let values = numeric_values(series)?;
                    let fill = match settings.numeric {
                        NumericStrategy::Median => median(&values),
                        NumericStrategy::Mean => mean(&values),
                        NumericStrategy::Zero => Some(0.0),
                    }
                    .unwrap_or(0.0);
                    debug!("Filling {} missing values in '{}' with {}", missing, name, fill);
                    float_column(&name, values.into_iter().map(|v| Some(v.unwrap_or(fill))).collect())
                }
                ColumnKind::Categorical => {
                    let values = string_values(series)?;
                    let fill = match settings.categorical {
                        CategoricalStrategy::MostFrequent => string_mode(&values),
                        CategoricalStrategy::Constant => None,
                    }
                    .unwrap_or_else(|| CONSTANT_CATEGORY.to_string());
                    debug!("Filling {} missing values in '{}' with '{}'", missing, name, fill);
                    string_column(
                        &name,
                        values.into_iter().map(|v| Some(v.unwrap_or_else(|| fill.clone()))).collect(),
                    )
                }
            };
            imputed_columns.push(name);
            columns.push(filled);
        }

        let table = DataFrame::new(columns)?;
        let missing_after: usize = table
            .get_columns()
            .iter()
            .map(|c| missing_count(c.as_materialized_series()))
            .sum::<PolarsResult<usize>>()?;

        let stats = json!({
            "missing_before": missing_before,
            "missing_after": missing_after,
            "imputed_columns": imputed_columns,
            "numeric_strategy": str_param(params, "numeric_strategy", "median")?,
            "categorical_strategy": str_param(params, "categorical_strategy", "most_frequent")?,
        });

        Ok(packet.with_table(table).with_metadata(stats_key(self.kind()), stats))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn packet() -> DataPacket {
        DataPacket::new(
            df!(
                "age" => [Some(20.0), None, Some(40.0), Some(30.0)],
                "city" => [Some("Oslo"), Some("Rome"), None, Some("Oslo")],
                "id" => [1i64, 2, 3, 4]
            )
            .unwrap(),
        )
    }

    #[test]
    fn test_median_and_mode_fill() {
        let out = ImputeFilter.apply(&packet(), &Parameters::new()).unwrap();
        let table = out.table();

        let age = numeric_values(table.column("age").unwrap().as_materialized_series()).unwrap();
        assert_eq!(age, vec![Some(20.0), Some(30.0), Some(40.0), Some(30.0)]);

        let city = string_values(table.column("city").unwrap().as_materialized_series()).unwrap();
        assert_eq!(city[2], Some("Oslo".to_string()));

        let stats = out.stats_for("impute").unwrap();
        assert_eq!(stats["missing_before"], 2);
        assert_eq!(stats["missing_after"], 0);
        assert_eq!(stats["imputed_columns"], json!(["age", "city"]));
    }

    #[test]
    fn test_untouched_columns_keep_dtype() {
        let out = ImputeFilter.apply(&packet(), &Parameters::new()).unwrap();
        assert_eq!(out.table().column("id").unwrap().dtype(), &DataType::Int64);
    }

    #[test]
    fn test_constant_strategy_projects_new_category() {
        let mut params = Parameters::new();
        params.insert("categorical_strategy".to_string(), json!("constant"));

        let schema = TableSchema::from_frame(packet().table()).unwrap();
        let projected = ImputeFilter.project_schema(&schema, &params);
        assert_eq!(projected.total_missing(), 0);
        assert_eq!(
            projected.column("city").unwrap().categories,
            vec!["Oslo".to_string(), "Rome".to_string(), "Unknown".to_string()]
        );

        let out = ImputeFilter.apply(&packet(), &params).unwrap();
        let city = string_values(out.table().column("city").unwrap().as_materialized_series()).unwrap();
        assert_eq!(city[2], Some("Unknown".to_string()));
    }

    #[test]
    fn test_warns_when_nothing_to_impute() {
        let schema = TableSchema::from_frame(&df!("x" => [1.0, 2.0]).unwrap()).unwrap();
        let issues = ImputeFilter.validate_against_data(&schema, &Parameters::new());
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].code, IssueCode::NothingToImpute);
        assert!(!issues[0].is_error());
    }
}
