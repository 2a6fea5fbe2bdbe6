//! Pipeline module.
//!
//! This module provides the pipeline executor: the run state machine, the
//! stage fold and progress reporting.

mod builder;
mod executor;
pub mod progress;

pub use builder::{Pipeline, PipelineBuilder};
pub use executor::{RunFailure, RunOutcome};
pub use progress::{ClosureProgressReporter, ProgressReporter, ProgressUpdate, RunState};
