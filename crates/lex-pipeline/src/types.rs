//! Shared value types: validation issues, stage records and table previews.

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Filter parameters, keyed by parameter name.
pub type Parameters = BTreeMap<String, serde_json::Value>;

/// Severity of a [`ValidationIssue`]. Errors block execution, warnings do not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Error,
}

/// Machine-readable reason attached to every [`ValidationIssue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueCode {
    // structural
    EmptyPipeline,
    OrderingViolation,
    SingletonViolation,
    UnknownFilterKind,
    InvalidParameter,
    // data-aware
    SchemaIncompatibility,
    EmptyDataset,
    MissingValues,
    HighMissingRatio,
    NothingToImpute,
    NoCategoricalColumns,
    NoNumericColumns,
}

impl IssueCode {
    /// Stable string form, identical to the serialized representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EmptyPipeline => "EMPTY_PIPELINE",
            Self::OrderingViolation => "ORDERING_VIOLATION",
            Self::SingletonViolation => "SINGLETON_VIOLATION",
            Self::UnknownFilterKind => "UNKNOWN_FILTER_KIND",
            Self::InvalidParameter => "INVALID_PARAMETER",
            Self::SchemaIncompatibility => "SCHEMA_INCOMPATIBILITY",
            Self::EmptyDataset => "EMPTY_DATASET",
            Self::MissingValues => "MISSING_VALUES",
            Self::HighMissingRatio => "HIGH_MISSING_RATIO",
            Self::NothingToImpute => "NOTHING_TO_IMPUTE",
            Self::NoCategoricalColumns => "NO_CATEGORICAL_COLUMNS",
            Self::NoNumericColumns => "NO_NUMERIC_COLUMNS",
        }
    }

    /// Whether the issue originates from configuration-only checks.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::EmptyPipeline
                | Self::OrderingViolation
                | Self::SingletonViolation
                | Self::UnknownFilterKind
                | Self::InvalidParameter
        )
    }
}

impl std::fmt::Display for IssueCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single problem found while validating a pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub severity: Severity,
    /// Position (`order`) of the offending filter, if the issue is stage-specific.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage_index: Option<usize>,
    pub message: String,
    pub code: IssueCode,
    /// The constraint that was violated and the concrete values compared.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub details: BTreeMap<String, serde_json::Value>,
}

impl ValidationIssue {
    pub fn error(code: IssueCode, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, code, message)
    }

    pub fn warning(code: IssueCode, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, code, message)
    }

    pub fn new(severity: Severity, code: IssueCode, message: impl Into<String>) -> Self {
        Self {
            severity,
            stage_index: None,
            message: message.into(),
            code,
            details: BTreeMap::new(),
        }
    }

    /// Attach the stage position the issue refers to.
    pub fn at_stage(mut self, stage_index: usize) -> Self {
        self.stage_index = Some(stage_index);
        self
    }

    /// Attach a detail value (constraint name, compared values, ...).
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// All issues found by structural and data-aware validation.
///
/// A report without error-level issues means the pipeline is accepted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_issues(issues: Vec<ValidationIssue>) -> Self {
        Self { issues }
    }

    pub fn push(&mut self, issue: ValidationIssue) {
        self.issues.push(issue);
    }

    pub fn extend(&mut self, issues: impl IntoIterator<Item = ValidationIssue>) {
        self.issues.extend(issues);
    }

    pub fn errors(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(|i| i.is_error())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(|i| !i.is_error())
    }

    pub fn has_errors(&self) -> bool {
        self.issues.iter().any(ValidationIssue::is_error)
    }

    /// No error-level issue present; warnings are allowed.
    pub fn is_accepted(&self) -> bool {
        !self.has_errors()
    }

    /// Check whether any issue carries the given code.
    pub fn has_code(&self, code: IssueCode) -> bool {
        self.issues.iter().any(|i| i.code == code)
    }

    /// All issues carrying the given code.
    pub fn with_code(&self, code: IssueCode) -> Vec<&ValidationIssue> {
        self.issues.iter().filter(|i| i.code == code).collect()
    }
}

/// A (rows, columns) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Shape {
    pub rows: usize,
    pub columns: usize,
}

impl Shape {
    pub fn new(rows: usize, columns: usize) -> Self {
        Self { rows, columns }
    }

    pub fn of(df: &DataFrame) -> Self {
        Self::new(df.height(), df.width())
    }
}

impl std::fmt::Display for Shape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.rows, self.columns)
    }
}

/// Small stringified sample of a table, renderable without recomputation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TablePreview {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl TablePreview {
    /// Capture at most `max_rows` leading rows of `df`. Missing cells render as `null`.
    pub fn capture(df: &DataFrame, max_rows: usize) -> PolarsResult<Self> {
        let head = df.head(Some(max_rows));
        let columns: Vec<String> = head
            .get_column_names()
            .iter()
            .map(|name| name.to_string())
            .collect();

        let mut rendered: Vec<Vec<String>> = Vec::with_capacity(head.width());
        for column in head.get_columns() {
            let as_text = column.as_materialized_series().cast(&DataType::String)?;
            let values = as_text.str()?;
            rendered.push(
                values
                    .into_iter()
                    .map(|v| v.unwrap_or("null").to_string())
                    .collect(),
            );
        }

        let rows = (0..head.height())
            .map(|row| rendered.iter().map(|col| col[row].clone()).collect())
            .collect();

        Ok(Self { columns, rows })
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// One committed entry of a packet's execution history.
///
/// Created by the executor immediately after a filter applies successfully
/// and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageRecord {
    /// Position (`order`) of the filter in the pipeline configuration.
    pub position: usize,
    /// Registry kind of the filter (e.g. `"scale"`).
    pub filter_name: String,
    pub display_name: String,
    /// Parameters applied, defaults included.
    pub parameters: Parameters,
    pub input_shape: Shape,
    pub output_shape: Shape,
    pub columns_added: Vec<String>,
    pub columns_removed: Vec<String>,
    pub columns_modified: Vec<String>,
    pub preview: TablePreview,
    /// Filter-reported statistics.
    #[serde(default)]
    pub stats: serde_json::Value,
    pub duration_ms: u64,
    pub completed_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_acceptance() {
        let mut report = ValidationReport::new();
        assert!(report.is_accepted());

        report.push(ValidationIssue::warning(IssueCode::MissingValues, "3 missing values"));
        assert!(report.is_accepted());
        assert_eq!(report.warnings().count(), 1);

        report.push(ValidationIssue::error(IssueCode::EmptyPipeline, "no filters").at_stage(0));
        assert!(!report.is_accepted());
        assert_eq!(report.errors().count(), 1);
        assert!(report.has_code(IssueCode::EmptyPipeline));
    }

    #[test]
    fn test_issue_serialization() {
        let issue = ValidationIssue::error(IssueCode::SchemaIncompatibility, "too many")
            .at_stage(3)
            .with_detail("n_components", 50);
        let json = serde_json::to_value(&issue).unwrap();
        assert_eq!(json["code"], "SCHEMA_INCOMPATIBILITY");
        assert_eq!(json["severity"], "error");
        assert_eq!(json["stage_index"], 3);
        assert_eq!(json["details"]["n_components"], 50);
    }

    #[test]
    fn test_issue_code_string_matches_serde() {
        let serialized = serde_json::to_string(&IssueCode::OrderingViolation).unwrap();
        assert_eq!(serialized, format!("\"{}\"", IssueCode::OrderingViolation.as_str()));
        assert!(IssueCode::OrderingViolation.is_structural());
        assert!(!IssueCode::SchemaIncompatibility.is_structural());
    }

    #[test]
    fn test_preview_is_bounded() {
        let df = df!(
            "a" => [1.0, 2.0, 3.0, 4.0],
            "b" => [Some("x"), None, Some("y"), Some("z")]
        )
        .unwrap();

        let preview = TablePreview::capture(&df, 2).unwrap();
        assert_eq!(preview.columns, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(preview.rows.len(), 2);
        assert_eq!(preview.rows[1][1], "null");
    }
}
