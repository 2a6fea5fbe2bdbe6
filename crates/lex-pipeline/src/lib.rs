//! Filter Pipeline Library
//!
//! An observable pipe-and-filter preprocessing core for tabular machine
//! learning datasets, built with Rust and Polars.
//!
//! # Overview
//!
//! A pipeline is an ordered list of [`FilterSpec`]s. Before anything runs,
//! the list is validated twice:
//!
//! - **Structural validation**: empty pipelines, unknown kinds, parameter
//!   ranges, singleton kinds and ordering constraints between kinds
//! - **Data-aware validation**: the configuration against the uploaded
//!   dataset's schema, projected forward stage by stage
//!
//! Every problem is reported in one [`ValidationReport`]. When no
//! error-level issue remains, the filters are applied in order. Each
//! committed stage leaves a [`StageRecord`] in the packet's history: shapes,
//! added/removed/modified columns, a preview, statistics and timing.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use lex_pipeline::{FilterSpec, Pipeline, RunOutcome};
//! use polars::prelude::*;
//!
//! let df = CsvReadOptions::default()
//!     .with_has_header(true)
//!     .try_into_reader_with_file_path(Some("data.csv".into()))?
//!     .finish()?;
//!
//! let specs = vec![
//!     FilterSpec::new("impute", 0),
//!     FilterSpec::new("encode", 1),
//!     FilterSpec::new("scale", 2).param("method", "minmax"),
//!     FilterSpec::new("pca", 3).param("n_components", 3),
//! ];
//!
//! let outcome = Pipeline::builder()
//!     .on_progress(|update| {
//!         println!("[{:.0}%] {}", update.progress * 100.0, update.message);
//!     })
//!     .build()?
//!     .run(df, &specs)?;
//!
//! if let RunOutcome::Completed { packet, .. } = outcome {
//!     for record in packet.history() {
//!         println!("{} {} -> {}", record.filter_name, record.input_shape, record.output_shape);
//!     }
//! }
//! ```
//!
//! # Custom Filters
//!
//! New kinds implement [`Filter`] and are registered in a [`Registry`]
//! together with their ordering constraints. The executor and validators
//! work with any registered kind:
//!
//! ```rust,ignore
//! use lex_pipeline::{Registry, RegistryEntry, OrderingConstraint, Severity, registry::boxed};
//! use std::sync::Arc;
//!
//! let mut registry = Registry::builtin();
//! registry.register(
//!     RegistryEntry::new(boxed::<MyFilter>)
//!         .constraint(OrderingConstraint::after("scale", Severity::Error))
//!         .constraint(OrderingConstraint::RequiresNumericInput),
//! )?;
//!
//! let pipeline = Pipeline::builder().registry(Arc::new(registry)).build()?;
//! ```
//!
//! # Module Structure
//!
//! - [`config`]: Run configuration and pipeline definitions
//! - [`diff`]: Schema diff between consecutive stages
//! - [`error`]: Error types
//! - [`filters`]: The filter trait and the built-in kinds
//! - [`numeric`]: Dense linear algebra used by the filters
//! - [`packet`]: The data packet flowing through the pipe
//! - [`pipeline`]: Pipeline orchestration, run states and progress reporting
//! - [`registry`]: Filter registry and ordering constraints
//! - [`schema`]: Column-level schema of a table
//! - [`types`]: Validation issues, stage records, previews
//! - [`utils`]: Column helpers
//! - [`validation`]: Structural and data-aware validators

pub mod config;
pub mod diff;
pub mod error;
pub mod filters;
pub mod numeric;
pub mod packet;
pub mod pipeline;
pub mod registry;
pub mod schema;
pub mod types;
pub mod utils;
pub mod validation;

// Re-export main types for convenience
pub use config::{ConfigValidationError, FilterSpec, PipelineDefinition, RunConfig, RunConfigBuilder};
pub use diff::{SchemaDiff, SchemaDiffEngine, ShapeDelta};
pub use error::{FilterExecutionError, PipelineError, RegistryError, Result, ResultExt};
pub use filters::{
    EncodeFilter, Filter, ImputeFilter, ParameterKind, ParameterSchema, ParameterSpec, PcaFilter,
    ScaleFilter,
};
pub use packet::DataPacket;
pub use pipeline::{
    ClosureProgressReporter, Pipeline, PipelineBuilder, ProgressReporter, ProgressUpdate,
    RunFailure, RunOutcome, RunState,
};
pub use registry::{FilterDescriptor, OrderingConstraint, Registry, RegistryEntry};
pub use schema::{ColumnKind, ColumnSchema, TableSchema};
pub use types::{
    IssueCode, Parameters, Severity, Shape, StageRecord, TablePreview, ValidationIssue,
    ValidationReport,
};
pub use validation::{DataAwareValidator, StructuralValidator, validate_pipeline, validate_schema};

// Packets and registries are handed between threads by embedding applications.
static_assertions::assert_impl_all!(DataPacket: Send, Sync);
static_assertions::assert_impl_all!(Registry: Send, Sync);
static_assertions::assert_impl_all!(RunOutcome: Send, Sync);
