//! Checks that depend on the dataset.
//!
//! Filters are never executed here. The uploaded schema is projected forward
//! stage by stage with each kind's declared effect, and every stage checks
//! the schema it would actually see.

use crate::config::{FilterSpec, RunConfig, enabled_in_order};
use crate::registry::Registry;
use crate::schema::TableSchema;
use crate::types::{IssueCode, ValidationIssue};
use tracing::debug;

/// Issue raised when a stage needing numeric input would see categorical columns.
pub fn numeric_input_issue(schema: &TableSchema, kind: &str) -> Option<ValidationIssue> {
    let categorical = schema.categorical_names();
    if categorical.is_empty() {
        return None;
    }
    Some(
        ValidationIssue::error(
            IssueCode::SchemaIncompatibility,
            format!(
                "'{kind}' needs numeric features, but {} categorical column(s) will be present at this stage: {}. Run 'encode' first.",
                categorical.len(),
                categorical.join(", ")
            ),
        )
        .with_detail("constraint", "requires_numeric_input")
        .with_detail("categorical_columns", categorical),
    )
}

pub struct DataAwareValidator;

impl DataAwareValidator {
    pub fn check(
        schema: &TableSchema,
        specs: &[FilterSpec],
        registry: &Registry,
        config: &RunConfig,
    ) -> Vec<ValidationIssue> {
        if schema.is_empty() {
            return vec![
                ValidationIssue::error(IssueCode::EmptyDataset, "Dataset is empty or not loaded.")
                    .with_detail("rows", schema.n_rows)
                    .with_detail("columns", schema.n_columns()),
            ];
        }

        let stages = enabled_in_order(specs);
        let mut issues = Vec::new();
        issues.extend(Self::check_missing_values(schema, &stages, config));
        issues.extend(Self::check_stages(schema, &stages, registry));
        issues
    }

    fn check_missing_values(
        schema: &TableSchema,
        stages: &[&FilterSpec],
        config: &RunConfig,
    ) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();

        let missing_total = schema.total_missing();
        if missing_total > 0 && !stages.iter().any(|s| s.kind == "impute") {
            issues.push(
                ValidationIssue::warning(
                    IssueCode::MissingValues,
                    format!("Dataset contains {missing_total} missing values, but 'impute' is not enabled."),
                )
                .with_detail("missing_values", missing_total),
            );
        }

        for column in &schema.columns {
            let ratio = column.missing as f64 / schema.n_rows as f64;
            if ratio > config.missing_warning_threshold {
                issues.push(
                    ValidationIssue::warning(
                        IssueCode::HighMissingRatio,
                        format!(
                            "Column '{}' has {:.1}% missing values.",
                            column.name,
                            ratio * 100.0
                        ),
                    )
                    .with_detail("column", column.name.as_str())
                    .with_detail("missing_ratio", ratio)
                    .with_detail("threshold", config.missing_warning_threshold),
                );
            }
        }

        issues
    }

    fn check_stages(
        schema: &TableSchema,
        stages: &[&FilterSpec],
        registry: &Registry,
    ) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        let mut projected = schema.clone();

        for spec in stages {
            // unknown kinds are reported by structural validation
            let Ok(entry) = registry.get(&spec.kind) else {
                continue;
            };
            let filter = entry.create();
            let (params, _) = entry.parameters.resolve(&spec.parameters);

            let mut stage_issues = filter.validate_against_data(&projected, &params);
            if entry.requires_numeric_input() {
                if let Some(issue) = numeric_input_issue(&projected, &spec.kind) {
                    let already_reported = stage_issues.iter().any(|i| {
                        i.code == issue.code && i.details.get("constraint") == issue.details.get("constraint")
                    });
                    if !already_reported {
                        stage_issues.push(issue);
                    }
                }
            }
            issues.extend(stage_issues.into_iter().map(|i| i.at_stage(spec.order)));

            projected = filter.project_schema(&projected, &params);
            debug!(
                "Projected schema after '{}' (stage {}): {} rows, {} columns",
                spec.kind,
                spec.order,
                projected.n_rows,
                projected.n_columns()
            );
        }

        issues
    }
}
