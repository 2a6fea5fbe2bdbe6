//! Two-phase pipeline validation.
//!
//! [`StructuralValidator`] checks the configuration alone (empty pipeline,
//! unknown kinds, parameters, singletons, ordering). [`DataAwareValidator`]
//! checks the configuration against the uploaded dataset's schema. Both
//! always run and their issues are merged into one [`ValidationReport`],
//! structural issues first, so every problem is reported in one pass.

mod data_aware;
mod structural;

pub use data_aware::{DataAwareValidator, numeric_input_issue};
pub use structural::StructuralValidator;

use crate::config::{FilterSpec, RunConfig};
use crate::registry::Registry;
use crate::schema::TableSchema;
use crate::types::ValidationReport;
use polars::prelude::*;

/// Validate a pipeline configuration against a dataset.
pub fn validate_pipeline(
    table: &DataFrame,
    specs: &[FilterSpec],
    registry: &Registry,
    config: &RunConfig,
) -> PolarsResult<ValidationReport> {
    let schema = TableSchema::from_frame(table)?;
    Ok(validate_schema(&schema, specs, registry, config))
}

/// Validate a pipeline configuration against an already computed schema.
pub fn validate_schema(
    schema: &TableSchema,
    specs: &[FilterSpec],
    registry: &Registry,
    config: &RunConfig,
) -> ValidationReport {
    let mut report = ValidationReport::new();
    report.extend(StructuralValidator::check(specs, registry));
    report.extend(DataAwareValidator::check(schema, specs, registry, config));
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::IssueCode;

    #[test]
    fn test_structural_and_data_issues_are_merged() {
        let df = df!("a" => [1.0, 2.0, 3.0], "b" => [3.0, 1.0, 2.0]).unwrap();
        let specs = vec![FilterSpec::new("pca", 0).param("n_components", 50)];

        let report =
            validate_pipeline(&df, &specs, &Registry::builtin(), &RunConfig::default()).unwrap();
        assert!(!report.is_accepted());
        assert_eq!(report.issues[0].code, IssueCode::OrderingViolation);
        assert!(report.has_code(IssueCode::SchemaIncompatibility));
    }

    #[test]
    fn test_warnings_do_not_block() {
        let df = df!("a" => [Some(1.0), None, Some(3.0)]).unwrap();
        let specs = FilterSpec::sequence(["scale"]);

        let report =
            validate_pipeline(&df, &specs, &Registry::builtin(), &RunConfig::default()).unwrap();
        assert!(report.is_accepted());
        assert_eq!(report.warnings().count(), 1);
        assert!(report.has_code(IssueCode::MissingValues));
    }
}
