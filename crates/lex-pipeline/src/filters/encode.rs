//! One-hot encoding of categorical columns.
//!
//! Numeric columns are kept in their original order, followed by one
//! `Float64` indicator column per category, named `<column>_<category>`.
//! A missing value is encoded as the category `missing`.

use super::params::{ParameterSchema, ParameterSpec, str_param};
use super::Filter;
use crate::error::FilterExecutionError;
use crate::packet::{DataPacket, stats_key};
use crate::schema::{ColumnKind, ColumnSchema, TableSchema};
use crate::types::{IssueCode, Parameters, ValidationIssue};
use crate::utils::{float_column, string_values};
use polars::prelude::*;
use serde_json::json;
use std::collections::BTreeMap;
use tracing::debug;

/// Category name given to missing values.
pub const MISSING_CATEGORY: &str = "missing";

fn drop_first(params: &Parameters) -> Result<bool, FilterExecutionError> {
    match str_param(params, "drop", "none")? {
        "none" => Ok(false),
        "first" => Ok(true),
        other => Err(FilterExecutionError::InvalidParameter {
            name: "drop".to_string(),
            reason: format!("unsupported value '{other}'"),
        }),
    }
}

/// Categories that become indicator columns, in output order.
fn encoded_categories(mut categories: Vec<String>, has_missing: bool, drop_first: bool) -> Vec<String> {
    if has_missing && !categories.iter().any(|c| c == MISSING_CATEGORY) {
        categories.push(MISSING_CATEGORY.to_string());
        categories.sort();
    }
    if drop_first && categories.len() > 1 {
        categories.remove(0);
    }
    categories
}

fn indicator_name(column: &str, category: &str) -> String {
    format!("{column}_{category}")
}

/// Output names occurring more than once, sorted.
fn duplicate_names(schema: &TableSchema) -> Vec<String> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for column in &schema.columns {
        *counts.entry(column.name.as_str()).or_default() += 1;
    }
    counts
        .into_iter()
        .filter(|(_, n)| *n > 1)
        .map(|(name, _)| name.to_string())
        .collect()
}

/// Replaces categorical columns with one-hot indicator columns.
#[derive(Debug, Clone, Copy, Default)]
pub struct EncodeFilter;

impl Filter for EncodeFilter {
    fn kind(&self) -> &'static str {
        "encode"
    }

    fn display_name(&self) -> &'static str {
        "One-Hot Encode Categoricals"
    }

    fn declare_parameters(&self) -> ParameterSchema {
        ParameterSchema::new(vec![ParameterSpec::choice(
            "drop",
            &["none", "first"],
            "none",
            "Drop the first category of each column to avoid collinear indicators",
        )])
    }

    fn project_schema(&self, input: &TableSchema, params: &Parameters) -> TableSchema {
        let drop = drop_first(params).unwrap_or(false);
        let mut columns: Vec<ColumnSchema> = input.numeric_columns().cloned().collect();
        for column in input.categorical_columns() {
            for category in encoded_categories(column.categories.clone(), column.has_missing(), drop) {
                columns.push(ColumnSchema::numeric(indicator_name(&column.name, &category), 0));
            }
        }
        TableSchema::new(input.n_rows, columns)
    }

    fn validate_against_data(&self, input: &TableSchema, params: &Parameters) -> Vec<ValidationIssue> {
        if input.categorical_columns().next().is_none() {
            return vec![ValidationIssue::warning(
                IssueCode::NoCategoricalColumns,
                "Encode is enabled, but no categorical columns will be present at this stage.",
            )];
        }

        let clashes = duplicate_names(&self.project_schema(input, params));
        if !clashes.is_empty() {
            return vec![
                ValidationIssue::error(
                    IssueCode::SchemaIncompatibility,
                    format!(
                        "Encoding would produce duplicate column names: {}. Rename the clashing columns or categories first.",
                        clashes.join(", ")
                    ),
                )
                .with_detail("constraint", "unique_output_columns")
                .with_detail("duplicate_columns", clashes),
            ];
        }
        Vec::new()
    }

    fn apply(&self, packet: &DataPacket, params: &Parameters) -> Result<DataPacket, FilterExecutionError> {
        self.ensure_applicable(packet, params)?;
        let drop = drop_first(params)?;
        let df = packet.table();

        let mut kept = Vec::new();
        let mut encoded = Vec::new();
        let mut removed = Vec::new();
        let mut generated = Vec::new();

        for column in df.get_columns() {
            let series = column.as_materialized_series();
            if ColumnKind::of(series.dtype()) == ColumnKind::Numeric {
                kept.push(column.clone());
                continue;
            }

            let name = series.name().to_string();
            let values = string_values(series)?;
            let has_missing = values.iter().any(Option::is_none);
            let mut categories: Vec<String> = values.iter().flatten().cloned().collect();
            categories.sort();
            categories.dedup();

            let categories = encoded_categories(categories, has_missing, drop);
            let count = categories.len();
            for category in categories {
                let indicator: Vec<Option<f64>> = values
                    .iter()
                    .map(|v| {
                        let value = v.as_deref().unwrap_or(MISSING_CATEGORY);
                        Some(if value == category { 1.0 } else { 0.0 })
                    })
                    .collect();
                let indicator_name = indicator_name(&name, &category);
                encoded.push(float_column(&indicator_name, indicator));
                generated.push(indicator_name);
            }
            debug!("Encoded '{}' into {} indicator columns", name, count);
            removed.push(name);
        }

        if removed.is_empty() {
            let stats = json!({"note": "No categorical columns found.", "generated_columns": []});
            return Ok(packet
                .with_table(df.clone())
                .with_metadata(stats_key(self.kind()), stats));
        }

        kept.extend(encoded);
        let table = DataFrame::new(kept)?;
        let stats = json!({
            "encoded_columns": removed,
            "generated_columns": generated,
            "drop": str_param(params, "drop", "none")?,
        });

        Ok(packet
            .with_table(table)
            .with_metadata("encode.generated_columns", json!(generated))
            .with_metadata(stats_key(self.kind()), stats))
    }
}
