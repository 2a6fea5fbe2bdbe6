//! Configuration-only checks. Never looks at the dataset.

use crate::config::{FilterSpec, enabled_in_order};
use crate::registry::{OrderingConstraint, Registry};
use crate::types::{IssueCode, Severity, ValidationIssue};
use std::collections::HashMap;

pub struct StructuralValidator;

impl StructuralValidator {
    /// Check the enabled specs of a pipeline configuration.
    ///
    /// Every problem is collected; an empty pipeline short-circuits since
    /// there is nothing else to check.
    pub fn check(specs: &[FilterSpec], registry: &Registry) -> Vec<ValidationIssue> {
        let stages = enabled_in_order(specs);
        if stages.is_empty() {
            return vec![ValidationIssue::error(
                IssueCode::EmptyPipeline,
                "The pipeline has no enabled filters.",
            )];
        }

        let mut issues = Vec::new();
        issues.extend(Self::check_kinds_and_parameters(&stages, registry));
        issues.extend(Self::check_singletons(&stages, registry));
        issues.extend(Self::check_ordering(&stages, registry));
        issues
    }

    fn check_kinds_and_parameters(stages: &[&FilterSpec], registry: &Registry) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        for spec in stages {
            match registry.get(&spec.kind) {
                Ok(entry) => {
                    let (_, parameter_issues) = entry.parameters.resolve(&spec.parameters);
                    issues.extend(
                        parameter_issues
                            .into_iter()
                            .map(|issue| issue.at_stage(spec.order).with_detail("kind", spec.kind.as_str())),
                    );
                }
                Err(err) => issues.push(
                    ValidationIssue::error(IssueCode::UnknownFilterKind, err.to_string())
                        .at_stage(spec.order)
                        .with_detail("kind", spec.kind.as_str()),
                ),
            }
        }
        issues
    }

    fn check_singletons(stages: &[&FilterSpec], registry: &Registry) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        let mut first_seen: HashMap<&str, usize> = HashMap::new();

        for spec in stages {
            let Ok(entry) = registry.get(&spec.kind) else {
                continue;
            };
            if !entry.singleton {
                continue;
            }
            match first_seen.get(spec.kind.as_str()) {
                Some(&first) => issues.push(
                    ValidationIssue::error(
                        IssueCode::SingletonViolation,
                        format!(
                            "'{}' may only appear once, but is enabled at stages {} and {}.",
                            spec.kind, first, spec.order
                        ),
                    )
                    .at_stage(spec.order)
                    .with_detail("kind", spec.kind.as_str())
                    .with_detail("first_stage", first),
                ),
                None => {
                    first_seen.insert(spec.kind.as_str(), spec.order);
                }
            }
        }
        issues
    }

    fn check_ordering(stages: &[&FilterSpec], registry: &Registry) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();

        for (position, spec) in stages.iter().enumerate() {
            let Ok(entry) = registry.get(&spec.kind) else {
                continue;
            };
            let earlier = &stages[..position];

            for constraint in &entry.constraints {
                match constraint {
                    OrderingConstraint::After { kind, severity } => {
                        if earlier.iter().any(|s| &s.kind == kind) {
                            continue;
                        }
                        let later = stages[position + 1..].iter().find(|s| &s.kind == kind);
                        let message = match later {
                            Some(other) => format!(
                                "'{}' (stage {}) must run after '{}', but '{}' is at stage {}.",
                                spec.kind, spec.order, kind, kind, other.order
                            ),
                            None => format!(
                                "'{}' (stage {}) must run after '{}', but no enabled '{}' stage precedes it.",
                                spec.kind, spec.order, kind, kind
                            ),
                        };
                        let mut issue = violation(*severity, message, "after", spec, kind);
                        if let Some(other) = later {
                            issue = issue.with_detail("other_stage", other.order);
                        }
                        issues.push(issue);
                    }
                    OrderingConstraint::Before { kind, severity } => {
                        for other in earlier.iter().filter(|s| &s.kind == kind) {
                            let message = format!(
                                "'{}' (stage {}) must run before '{}', but '{}' is at stage {}.",
                                spec.kind, spec.order, kind, kind, other.order
                            );
                            issues.push(
                                violation(*severity, message, "before", spec, kind)
                                    .with_detail("other_stage", other.order),
                            );
                        }
                    }
                    OrderingConstraint::RequiresNumericInput => {}
                }
            }
        }
        issues
    }
}

fn violation(
    severity: Severity,
    message: String,
    rule: &str,
    spec: &FilterSpec,
    other_kind: &str,
) -> ValidationIssue {
    ValidationIssue::new(severity, IssueCode::OrderingViolation, message)
        .at_stage(spec.order)
        .with_detail("constraint", rule)
        .with_detail("kind", spec.kind.as_str())
        .with_detail("other_kind", other_kind)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn check(kinds: &[&str]) -> Vec<ValidationIssue> {
        StructuralValidator::check(&FilterSpec::sequence(kinds.iter().copied()), &Registry::builtin())
    }

    #[test]
    fn test_canonical_order_is_clean() {
        assert!(check(&["impute", "encode", "scale", "pca"]).is_empty());
    }

    #[test]
    fn test_empty_and_all_disabled() {
        let issues = check(&[]);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].code, IssueCode::EmptyPipeline);

        let disabled = vec![FilterSpec::new("scale", 0).enabled(false)];
        let issues = StructuralValidator::check(&disabled, &Registry::builtin());
        assert_eq!(issues[0].code, IssueCode::EmptyPipeline);
    }

    #[test]
    fn test_pca_without_scale() {
        let issues = check(&["impute", "pca"]);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].code, IssueCode::OrderingViolation);
        assert_eq!(issues[0].stage_index, Some(1));
        assert_eq!(issues[0].details["other_kind"], json!("scale"));
    }

    #[test]
    fn test_pca_before_scale_identifies_both_stages() {
        let issues = check(&["pca", "scale"]);
        assert!(issues.iter().all(|i| i.code == IssueCode::OrderingViolation && i.is_error()));

        let from_pca = issues.iter().find(|i| i.stage_index == Some(0)).unwrap();
        assert_eq!(from_pca.details["other_stage"], json!(1));
        let from_scale = issues.iter().find(|i| i.stage_index == Some(1)).unwrap();
        assert_eq!(from_scale.details["other_stage"], json!(0));
    }

    #[test]
    fn test_late_impute_is_only_a_warning() {
        let issues = check(&["encode", "impute"]);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, Severity::Warning);
    }

    #[test]
    fn test_disabled_stage_does_not_satisfy_constraint() {
        let specs = vec![
            FilterSpec::new("scale", 0).enabled(false),
            FilterSpec::new("pca", 1).param("n_components", 2),
        ];
        let issues = StructuralValidator::check(&specs, &Registry::builtin());
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].stage_index, Some(1));
    }

    #[test]
    fn test_singleton_and_unknown_kind() {
        let issues = check(&["encode", "tsne", "encode"]);
        let codes: Vec<IssueCode> = issues.iter().map(|i| i.code).collect();
        assert_eq!(codes, vec![IssueCode::UnknownFilterKind, IssueCode::SingletonViolation]);
        assert_eq!(issues[1].details["first_stage"], json!(0));
    }

    #[test]
    fn test_scale_may_repeat() {
        assert!(check(&["scale", "scale"]).is_empty());
    }

    #[test]
    fn test_invalid_parameters_are_reported() {
        let specs = vec![
            FilterSpec::new("scale", 0).param("method", "robust"),
            FilterSpec::new("pca", 1).param("n_components", 0),
        ];
        let issues = StructuralValidator::check(&specs, &Registry::builtin());
        assert_eq!(issues.len(), 2);
        assert!(issues.iter().all(|i| i.code == IssueCode::InvalidParameter));
        assert_eq!(issues[1].details["kind"], json!("pca"));
    }

    #[test]
    fn test_stages_are_sorted_by_order() {
        let specs = vec![FilterSpec::new("pca", 5), FilterSpec::new("scale", 2)];
        assert!(StructuralValidator::check(&specs, &Registry::builtin()).is_empty());
    }
}
