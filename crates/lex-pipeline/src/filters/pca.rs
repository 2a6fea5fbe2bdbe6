//! PCA feature extraction.
//!
//! Replaces every column with `PC1..PCk`. The input must be fully numeric
//! and complete, which in practice means impute and encode ran upstream.

use super::params::{ParameterSchema, ParameterSpec, usize_param};
use super::Filter;
use crate::error::FilterExecutionError;
use crate::numeric::{PcaError, fit_pca};
use crate::packet::{DataPacket, stats_key};
use crate::schema::{ColumnSchema, TableSchema};
use crate::types::{IssueCode, Parameters, ValidationIssue};
use crate::utils::{float_column, numeric_values};
use crate::validation::numeric_input_issue;
use ndarray::Array2;
use polars::prelude::*;
use serde_json::json;
use tracing::debug;

pub const DEFAULT_COMPONENTS: usize = 5;

fn component_name(index: usize) -> String {
    format!("PC{}", index + 1)
}

/// Projects the numeric table onto its leading principal components.
#[derive(Debug, Clone, Copy, Default)]
pub struct PcaFilter;

impl Filter for PcaFilter {
    fn kind(&self) -> &'static str {
        "pca"
    }

    fn display_name(&self) -> &'static str {
        "PCA Feature Extraction"
    }

    fn declare_parameters(&self) -> ParameterSchema {
        ParameterSchema::new(vec![ParameterSpec::integer(
            "n_components",
            1,
            None,
            DEFAULT_COMPONENTS as i64,
            "Number of principal components to keep",
        )])
    }

    fn project_schema(&self, input: &TableSchema, params: &Parameters) -> TableSchema {
        let k = usize_param(params, "n_components", DEFAULT_COMPONENTS).unwrap_or(DEFAULT_COMPONENTS);
        let columns = (0..k).map(|i| ColumnSchema::numeric(component_name(i), 0)).collect();
        TableSchema::new(input.n_rows, columns)
    }

    fn validate_against_data(&self, input: &TableSchema, params: &Parameters) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();

        if let Some(issue) = numeric_input_issue(input, self.kind()) {
            issues.push(issue);
        }

        let missing: usize = input.numeric_columns().map(|c| c.missing).sum();
        if missing > 0 {
            issues.push(
                ValidationIssue::error(
                    IssueCode::SchemaIncompatibility,
                    format!("PCA cannot handle missing values, but {missing} will be present at this stage. Run 'Impute' before PCA."),
                )
                .with_detail("constraint", "requires_complete_input")
                .with_detail("missing_values", missing),
            );
        }

        let n_components = match usize_param(params, "n_components", DEFAULT_COMPONENTS) {
            Ok(n) => n,
            // reported as InvalidParameter by structural validation
            Err(_) => return issues,
        };
        let n_samples = input.n_rows;
        let n_features = input.numeric_columns().count();
        let max_allowed = n_samples.min(n_features);

        if max_allowed == 0 {
            issues.push(
                ValidationIssue::error(
                    IssueCode::SchemaIncompatibility,
                    "PCA cannot run because there will be no valid features or samples at this stage.",
                )
                .with_detail("constraint", "n_components <= min(n_samples, n_features)")
                .with_detail("n_samples", n_samples)
                .with_detail("n_features", n_features),
            );
        } else if n_components > max_allowed {
            issues.push(
                ValidationIssue::error(
                    IssueCode::SchemaIncompatibility,
                    format!(
                        "PCA n_components ({n_components}) exceeds the maximum allowed value min(n_samples={n_samples}, n_features={n_features}) = {max_allowed}. Reduce n_components or provide more data."
                    ),
                )
                .with_detail("constraint", "n_components <= min(n_samples, n_features)")
                .with_detail("n_components", n_components)
                .with_detail("n_samples", n_samples)
                .with_detail("n_features", n_features)
                .with_detail("max_allowed", max_allowed),
            );
        }

        issues
    }

    fn apply(&self, packet: &DataPacket, params: &Parameters) -> Result<DataPacket, FilterExecutionError> {
        self.ensure_applicable(packet, params)?;
        let n_components = usize_param(params, "n_components", DEFAULT_COMPONENTS)?;
        let df = packet.table();
        let (n_samples, n_features) = (df.height(), df.width());

        let mut matrix = Array2::<f64>::zeros((n_samples, n_features));
        for (j, column) in df.get_columns().iter().enumerate() {
            let values = numeric_values(column.as_materialized_series())?;
            for (i, value) in values.into_iter().enumerate() {
                matrix[[i, j]] = value.ok_or_else(|| {
                    FilterExecutionError::Numerical(format!(
                        "missing value in column '{}' at row {}",
                        column.name(),
                        i
                    ))
                })?;
            }
        }

        let fit = fit_pca(&matrix, n_components).map_err(|e| match &e {
            PcaError::InvalidComponentCount { .. } => FilterExecutionError::InvalidParameter {
                name: "n_components".to_string(),
                reason: e.to_string(),
            },
            _ => FilterExecutionError::Numerical(e.to_string()),
        })?;
        let scores = fit.transform(&matrix);
        debug!(
            "PCA reduced {} features to {} components",
            n_features,
            fit.n_components()
        );

        let columns: Vec<Column> = scores
            .columns()
            .into_iter()
            .enumerate()
            .map(|(j, scores)| {
                float_column(&component_name(j), scores.iter().map(|v| Some(*v)).collect())
            })
            .collect();
        let table = DataFrame::new(columns)?;

        let stats = json!({
            "input_features": n_features,
            "output_features": fit.n_components(),
            "n_components_used": fit.n_components(),
            "explained_variance_ratio": fit.explained_variance_ratio,
        });

        Ok(packet.with_table(table).with_metadata(stats_key(self.kind()), stats))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::column_names;
    use pretty_assertions::assert_eq;

    fn params(n: usize) -> Parameters {
        let mut params = Parameters::new();
        params.insert("n_components".to_string(), json!(n));
        params
    }

    fn numeric_packet() -> DataPacket {
        DataPacket::new(
            df!(
                "a" => [1.0, 2.0, 3.0, 4.0, 5.0],
                "b" => [2.0, 4.1, 5.9, 8.2, 9.9],
                "c" => [5.0, 3.0, 4.0, 1.0, 2.0]
            )
            .unwrap(),
        )
    }

    #[test]
    fn test_apply_replaces_columns_with_components() {
        let out = PcaFilter.apply(&numeric_packet(), &params(2)).unwrap();
        assert_eq!(column_names(out.table()), vec!["PC1", "PC2"]);
        assert_eq!(out.shape().rows, 5);

        let stats = out.stats_for("pca").unwrap();
        assert_eq!(stats["input_features"], 3);
        assert_eq!(stats["n_components_used"], 2);
        let ratio = stats["explained_variance_ratio"].as_array().unwrap();
        assert!(ratio[0].as_f64().unwrap() > 0.8);
    }

    #[test]
    fn test_too_many_components_is_reported_with_values() {
        let schema = numeric_packet().schema().unwrap();
        let issues = PcaFilter.validate_against_data(&schema, &params(50));

        assert_eq!(issues.len(), 1);
        let issue = &issues[0];
        assert_eq!(issue.code, IssueCode::SchemaIncompatibility);
        assert_eq!(issue.details["n_components"], 50);
        assert_eq!(issue.details["max_allowed"], 3);
        assert!(issue.message.contains("min(n_samples=5, n_features=3) = 3"));
    }

    #[test]
    fn test_categorical_and_missing_inputs_are_incompatible() {
        let packet = DataPacket::new(
            df!(
                "x" => [Some(1.0), None, Some(3.0)],
                "city" => ["Oslo", "Rome", "Oslo"]
            )
            .unwrap(),
        );
        let issues = PcaFilter.validate_against_data(&packet.schema().unwrap(), &params(1));
        assert_eq!(issues.len(), 2);
        assert!(issues.iter().all(|i| i.is_error()));

        let err = PcaFilter.apply(&packet, &params(1)).unwrap_err();
        assert_eq!(err.error_code(), "UNRESOLVED_ISSUE");
    }

    #[test]
    fn test_constant_input_is_a_numerical_failure() {
        let packet = DataPacket::new(df!("a" => [1.0, 1.0, 1.0], "b" => [2.0, 2.0, 2.0]).unwrap());
        let err = PcaFilter.apply(&packet, &params(1)).unwrap_err();
        assert_eq!(err.error_code(), "NUMERICAL_FAILURE");
    }

    #[test]
    fn test_projection_yields_component_columns() {
        let projected = PcaFilter.project_schema(&numeric_packet().schema().unwrap(), &params(2));
        assert_eq!(projected.numeric_names(), vec!["PC1".to_string(), "PC2".to_string()]);
        assert_eq!(projected.n_rows, 5);
    }
}
