//! Declared parameters of a filter kind.
//!
//! A [`ParameterSchema`] describes names, types, defaults and valid ranges.
//! It is what the UI renders as a configuration form and what structural
//! validation checks supplied values against.

use crate::error::FilterExecutionError;
use crate::types::{IssueCode, Parameters, ValidationIssue};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Type and valid range of a parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ParameterKind {
    Integer { min: i64, max: Option<i64> },
    Float { min: f64, max: f64 },
    Choice { options: Vec<String> },
}

/// One declared parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub name: String,
    #[serde(flatten)]
    pub kind: ParameterKind,
    pub default: Value,
    pub description: String,
}

impl ParameterSpec {
    pub fn integer(name: &str, min: i64, max: Option<i64>, default: i64, description: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: ParameterKind::Integer { min, max },
            default: Value::from(default),
            description: description.to_string(),
        }
    }

    pub fn float(name: &str, min: f64, max: f64, default: f64, description: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: ParameterKind::Float { min, max },
            default: Value::from(default),
            description: description.to_string(),
        }
    }

    pub fn choice(name: &str, options: &[&str], default: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: ParameterKind::Choice {
                options: options.iter().map(|o| o.to_string()).collect(),
            },
            default: Value::from(default),
            description: description.to_string(),
        }
    }

    /// Check a supplied value against type and range. Returns the reason on failure.
    pub fn check(&self, value: &Value) -> Result<(), String> {
        match &self.kind {
            ParameterKind::Integer { min, max } => {
                let Some(v) = value.as_i64() else {
                    return Err(format!("expected an integer, got {value}"));
                };
                if v < *min || max.is_some_and(|m| v > m) {
                    let upper = max.map_or("inf".to_string(), |m| m.to_string());
                    return Err(format!("{v} is outside the valid range [{min}, {upper}]"));
                }
                Ok(())
            }
            ParameterKind::Float { min, max } => {
                let Some(v) = value.as_f64() else {
                    return Err(format!("expected a number, got {value}"));
                };
                if !(*min..=*max).contains(&v) {
                    return Err(format!("{v} is outside the valid range [{min}, {max}]"));
                }
                Ok(())
            }
            ParameterKind::Choice { options } => {
                let Some(v) = value.as_str() else {
                    return Err(format!("expected one of {options:?}, got {value}"));
                };
                if !options.iter().any(|o| o == v) {
                    return Err(format!("'{v}' is not one of {options:?}"));
                }
                Ok(())
            }
        }
    }
}

/// Declared parameters of one filter kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterSchema {
    pub parameters: Vec<ParameterSpec>,
}

impl ParameterSchema {
    pub fn new(parameters: Vec<ParameterSpec>) -> Self {
        Self { parameters }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&ParameterSpec> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Default value of every declared parameter.
    pub fn defaults(&self) -> Parameters {
        self.parameters
            .iter()
            .map(|p| (p.name.clone(), p.default.clone()))
            .collect()
    }

    /// Merge supplied values over the defaults.
    ///
    /// Every supplied value is checked; unknown names and invalid values are
    /// returned as error-level `InvalidParameter` issues and left out of the
    /// resolved map, so the default is used in their place. `null` means
    /// "use the default".
    pub fn resolve(&self, supplied: &Parameters) -> (Parameters, Vec<ValidationIssue>) {
        let mut resolved = self.defaults();
        let mut issues = Vec::new();

        for (name, value) in supplied {
            if value.is_null() {
                continue;
            }
            let Some(spec) = self.get(name) else {
                issues.push(
                    ValidationIssue::error(
                        IssueCode::InvalidParameter,
                        format!("Unknown parameter '{name}'"),
                    )
                    .with_detail("parameter", name.as_str()),
                );
                continue;
            };
            match spec.check(value) {
                Ok(()) => {
                    resolved.insert(name.clone(), value.clone());
                }
                Err(reason) => issues.push(
                    ValidationIssue::error(
                        IssueCode::InvalidParameter,
                        format!("Invalid value for parameter '{name}': {reason}"),
                    )
                    .with_detail("parameter", name.as_str())
                    .with_detail("value", value.clone()),
                ),
            }
        }

        (resolved, issues)
    }
}

// =============================================================================
// Typed accessors used by filter implementations
// =============================================================================

/// Read a string parameter, falling back to `default` when absent.
pub fn str_param<'a>(
    params: &'a Parameters,
    name: &str,
    default: &'a str,
) -> Result<&'a str, FilterExecutionError> {
    match params.get(name) {
        None | Some(Value::Null) => Ok(default),
        Some(Value::String(s)) => Ok(s.as_str()),
        Some(other) => Err(FilterExecutionError::InvalidParameter {
            name: name.to_string(),
            reason: format!("expected a string, got {other}"),
        }),
    }
}

/// Read a non-negative integer parameter, falling back to `default` when absent.
pub fn usize_param(
    params: &Parameters,
    name: &str,
    default: usize,
) -> Result<usize, FilterExecutionError> {
    match params.get(name) {
        None | Some(Value::Null) => Ok(default),
        Some(value) => value
            .as_u64()
            .and_then(|v| usize::try_from(v).ok())
            .ok_or_else(|| FilterExecutionError::InvalidParameter {
                name: name.to_string(),
                reason: format!("expected a non-negative integer, got {value}"),
            }),
    }
}
