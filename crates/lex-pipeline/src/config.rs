//! Configuration types for the filter pipeline.
//!
//! Two kinds of configuration live here:
//!
//! - [`RunConfig`]: knobs of the executor itself (preview size, diff sample
//!   size, warning thresholds), built with a fluent builder.
//! - [`FilterSpec`] / [`PipelineDefinition`]: the user-declared, ordered
//!   list of filters, usually loaded from JSON produced by a UI.

use crate::error::{PipelineError, Result, ResultExt};
use crate::types::Parameters;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One user-declared pipeline stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterSpec {
    /// Registry key (e.g. `"impute"`).
    pub kind: String,
    /// Disabled entries keep their position but neither validate nor run.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Position in the pipeline.
    pub order: usize,
    #[serde(default)]
    pub parameters: Parameters,
}

fn default_enabled() -> bool {
    true
}

impl FilterSpec {
    /// An enabled stage with default parameters.
    pub fn new(kind: impl Into<String>, order: usize) -> Self {
        Self {
            kind: kind.into(),
            enabled: true,
            order,
            parameters: Parameters::new(),
        }
    }

    /// Set a parameter value.
    pub fn param(mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    /// Enable or disable the stage.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Build a sequence of enabled, default-parameter specs from kinds in order.
    pub fn sequence<'a>(kinds: impl IntoIterator<Item = &'a str>) -> Vec<FilterSpec> {
        kinds
            .into_iter()
            .enumerate()
            .map(|(order, kind)| FilterSpec::new(kind, order))
            .collect()
    }
}

/// Sort specs by `order` (stable, so equal orders keep declaration order).
pub fn ordered(specs: &[FilterSpec]) -> Vec<&FilterSpec> {
    let mut sorted: Vec<&FilterSpec> = specs.iter().collect();
    sorted.sort_by_key(|spec| spec.order);
    sorted
}

/// The enabled specs, sorted by `order`.
pub fn enabled_in_order(specs: &[FilterSpec]) -> Vec<&FilterSpec> {
    ordered(specs).into_iter().filter(|spec| spec.enabled).collect()
}

/// A full pipeline configuration as exchanged with a UI.
///
/// # Example
///
/// ```rust,ignore
/// let definition = PipelineDefinition::from_json_str(r#"{
///     "filters": [
///         {"kind": "impute", "order": 0},
///         {"kind": "pca", "order": 1, "parameters": {"n_components": 3}}
///     ]
/// }"#)?;
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineDefinition {
    pub filters: Vec<FilterSpec>,
}

impl PipelineDefinition {
    pub fn new(filters: Vec<FilterSpec>) -> Self {
        Self { filters }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| PipelineError::InvalidDefinition(e.to_string()))
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw).context(format!("Reading pipeline definition {}", path.display()))
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Configuration for pipeline runs.
///
/// Use [`RunConfig::builder()`] to create a configuration with the fluent API.
///
/// # Example
///
/// ```rust,ignore
/// use lex_pipeline::config::RunConfig;
///
/// let config = RunConfig::builder()
///     .preview_rows(5)
///     .missing_warning_threshold(0.3)
///     .build()?;
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Number of rows captured in each stage preview.
    /// Default: 8
    pub preview_rows: usize,

    /// Upper bound on rows sampled per column when deciding whether a
    /// same-named column was modified by a stage.
    /// Default: 1024
    pub diff_sample_rows: usize,

    /// Missing fraction (0.0 - 1.0) above which a column triggers a warning.
    /// Default: 0.5 (50%)
    pub missing_warning_threshold: f64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            preview_rows: 8,
            diff_sample_rows: 1024,
            missing_warning_threshold: 0.5,
        }
    }
}

impl RunConfig {
    /// Create a new configuration builder.
    pub fn builder() -> RunConfigBuilder {
        RunConfigBuilder::default()
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> std::result::Result<(), ConfigValidationError> {
        if !(0.0..=1.0).contains(&self.missing_warning_threshold) {
            return Err(ConfigValidationError::InvalidThreshold {
                field: "missing_warning_threshold".to_string(),
                value: self.missing_warning_threshold,
            });
        }

        if self.diff_sample_rows == 0 {
            return Err(ConfigValidationError::InvalidDiffSampleRows(
                self.diff_sample_rows,
            ));
        }

        Ok(())
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Invalid threshold for '{field}': {value} (must be between 0.0 and 1.0)")]
    InvalidThreshold { field: String, value: f64 },

    #[error("Invalid diff sample size: {0} (must be at least 1)")]
    InvalidDiffSampleRows(usize),
}

/// Builder for [`RunConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct RunConfigBuilder {
    preview_rows: Option<usize>,
    diff_sample_rows: Option<usize>,
    missing_warning_threshold: Option<f64>,
}

impl RunConfigBuilder {
    /// Set how many rows each stage preview keeps. Zero disables previews.
    pub fn preview_rows(mut self, rows: usize) -> Self {
        self.preview_rows = Some(rows);
        self
    }

    /// Set the per-column sample bound used by the schema diff.
    pub fn diff_sample_rows(mut self, rows: usize) -> Self {
        self.diff_sample_rows = Some(rows);
        self
    }

    /// Set the missing-value fraction that triggers a per-column warning.
    ///
    /// # Arguments
    /// * `threshold` - Value between 0.0 and 1.0 (e.g., 0.5 = 50%)
    pub fn missing_warning_threshold(mut self, threshold: f64) -> Self {
        self.missing_warning_threshold = Some(threshold);
        self
    }

    /// Build the configuration.
    ///
    /// Returns a validated `RunConfig` or an error if validation fails.
    pub fn build(self) -> std::result::Result<RunConfig, ConfigValidationError> {
        let defaults = RunConfig::default();
        let config = RunConfig {
            preview_rows: self.preview_rows.unwrap_or(defaults.preview_rows),
            diff_sample_rows: self.diff_sample_rows.unwrap_or(defaults.diff_sample_rows),
            missing_warning_threshold: self
                .missing_warning_threshold
                .unwrap_or(defaults.missing_warning_threshold),
        };

        config.validate()?;
        Ok(config)
    }
}
