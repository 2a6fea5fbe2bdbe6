//! Custom error types for the filter pipeline.
//!
//! This module provides the error hierarchy using `thiserror`. Validation
//! problems are *not* errors here: they are collected as
//! [`ValidationIssue`](crate::types::ValidationIssue)s so that every problem
//! is reported in one pass. The types below cover registry lookups, filter
//! execution and infrastructure failures.
//!
//! Errors are serializable so they can be handed to a UI layer as-is.

use serde::Serialize;
use serde::ser::SerializeStruct;
use thiserror::Error;

/// Errors raised by the filter registry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// No filter is registered under this kind.
    #[error("Unknown filter kind '{0}'")]
    UnknownFilterKind(String),

    /// A filter kind was registered twice.
    #[error("Filter kind '{0}' is already registered")]
    DuplicateFilterKind(String),
}

/// Errors raised while a filter is being applied.
///
/// A filter only raises these after validation passed, either because an
/// error-level issue was left unresolved or because the computation itself
/// cannot proceed.
#[derive(Error, Debug)]
pub enum FilterExecutionError {
    /// The input still violates one of the filter's data requirements.
    #[error("Unresolved validation issue [{code}]: {message}")]
    UnresolvedIssue { code: String, message: String },

    /// A parameter value could not be interpreted.
    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },

    /// The numeric computation failed (non-convergence, degenerate input).
    #[error("Numerical failure: {0}")]
    Numerical(String),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),
}

impl FilterExecutionError {
    /// Get error code for frontend handling.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::UnresolvedIssue { .. } => "UNRESOLVED_ISSUE",
            Self::InvalidParameter { .. } => "INVALID_PARAMETER",
            Self::Numerical(_) => "NUMERICAL_FAILURE",
            Self::Polars(_) => "POLARS_ERROR",
        }
    }
}

/// The main error type for the pipeline library.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Registry lookup or registration failed.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Pipeline definition could not be parsed.
    #[error("Invalid pipeline definition: {0}")]
    InvalidDefinition(String),

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<PipelineError>,
    },
}

impl PipelineError {
    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        PipelineError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Get error code for frontend handling.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Registry(RegistryError::UnknownFilterKind(_)) => "UNKNOWN_FILTER_KIND",
            Self::Registry(RegistryError::DuplicateFilterKind(_)) => "DUPLICATE_FILTER_KIND",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::InvalidDefinition(_) => "INVALID_DEFINITION",
            Self::Io(_) => "IO_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }
}

impl From<crate::config::ConfigValidationError> for PipelineError {
    fn from(err: crate::config::ConfigValidationError) -> Self {
        PipelineError::InvalidConfig(err.to_string())
    }
}

/// Errors are serialized as a struct with `code` and `message` fields.
impl Serialize for PipelineError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("PipelineError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, polars::error::PolarsError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| PipelineError::Polars(e).with_context(context))
    }
}
