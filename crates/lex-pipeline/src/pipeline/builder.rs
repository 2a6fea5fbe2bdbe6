//! Main pipeline module.
//!
//! This module provides the `Pipeline` struct and its builder. A pipeline
//! owns a read-only registry, a run configuration and an optional progress
//! reporter; each [`Pipeline::run`] call is an independent, single-shot run.

use crate::config::{FilterSpec, RunConfig, enabled_in_order};
use crate::error::{Result, ResultExt};
use crate::packet::DataPacket;
use crate::pipeline::executor::{ExecutionResult, RunOutcome, StageExecutor};
use crate::pipeline::progress::{ClosureProgressReporter, ProgressReporter, ProgressUpdate, RunState};
use crate::registry::Registry;
use crate::types::ValidationReport;
use crate::validation::validate_pipeline;
use polars::prelude::*;
use std::sync::Arc;
use tracing::{error, info, warn};

/// The filter pipeline.
///
/// Use [`Pipeline::builder()`] to create a new pipeline with custom configuration.
///
/// # Example
///
/// ```rust,ignore
/// use lex_pipeline::{FilterSpec, Pipeline, RunConfig, RunOutcome};
///
/// let specs = vec![
///     FilterSpec::new("impute", 0),
///     FilterSpec::new("encode", 1),
///     FilterSpec::new("scale", 2),
///     FilterSpec::new("pca", 3).param("n_components", 3),
/// ];
///
/// let outcome = Pipeline::builder()
///     .config(RunConfig::default())
///     .on_progress(|update| {
///         println!("[{:.0}%] {}", update.progress * 100.0, update.message);
///     })
///     .build()?
///     .run(dataframe, &specs)?;
///
/// match outcome {
///     RunOutcome::Completed { packet, .. } => println!("{:?}", packet.shape()),
///     RunOutcome::Rejected { report } => println!("{} errors", report.errors().count()),
///     RunOutcome::Failed { failure, .. } => println!("{failure}"),
/// }
/// ```
pub struct Pipeline {
    registry: Arc<Registry>,
    config: RunConfig,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
}

// Pipelines may be shared across sessions running on different threads.
static_assertions::assert_impl_all!(Pipeline: Send, Sync);

impl Pipeline {
    /// Create a new pipeline builder.
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Dry run: structural and data-aware validation only. Nothing executes.
    pub fn validate(&self, table: &DataFrame, specs: &[FilterSpec]) -> Result<ValidationReport> {
        validate_pipeline(table, specs, &self.registry, &self.config).context("Profiling input dataset")
    }

    /// Validate `specs` against `table` and, if accepted, apply every
    /// enabled filter in order.
    ///
    /// Rejection and filter failures are reported through [`RunOutcome`].
    ///
    /// # Errors
    ///
    /// Returns `Err` only for failures outside any filter, such as a polars
    /// error while profiling the input or diffing a stage.
    pub fn run(&self, table: DataFrame, specs: &[FilterSpec]) -> Result<RunOutcome> {
        let stages = enabled_in_order(specs);
        let mut run = RunTracker::new(self.progress_reporter.as_deref(), stages.len());

        info!("Starting pipeline run with {} enabled filters...", stages.len());
        run.advance(RunState::Validating, "Validating pipeline...");

        let report = self.validate(&table, specs)?;
        for issue in report.warnings() {
            warn!("[{}] {}", issue.code, issue.message);
        }

        if report.has_errors() {
            for issue in report.errors() {
                info!("Rejected: [{}] {}", issue.code, issue.message);
            }
            run.advance(
                RunState::Rejected,
                format!("Pipeline rejected with {} error(s)", report.errors().count()),
            );
            return Ok(RunOutcome::Rejected { report });
        }

        run.advance(
            RunState::Ready,
            format!("Pipeline accepted with {} warning(s)", report.warnings().count()),
        );
        run.advance(RunState::Running, "Applying filters...");

        let executor = StageExecutor::new(&self.registry, &self.config);
        let result = executor.execute(DataPacket::new(table), &stages, |record, done| {
            run.stage_committed(record.position, &record.filter_name, done);
        });

        let result = match result {
            Ok(result) => result,
            Err(e) => {
                error!("Pipeline error: {}", e);
                return Err(e);
            }
        };

        match result {
            ExecutionResult::Completed(packet) => {
                run.advance(RunState::Completed, "Pipeline completed successfully");
                info!("Pipeline completed: final shape {}", packet.shape());
                Ok(RunOutcome::Completed { packet, report })
            }
            ExecutionResult::Failed { failure, packet } => {
                error!("{}", failure);
                run.advance(RunState::Failed, failure.to_string());
                Ok(RunOutcome::Failed {
                    failure,
                    packet,
                    report,
                })
            }
        }
    }
}

/// Tracks the state of one run and reports every transition.
struct RunTracker<'a> {
    reporter: Option<&'a dyn ProgressReporter>,
    state: RunState,
    completed: usize,
    total: usize,
}

impl<'a> RunTracker<'a> {
    fn new(reporter: Option<&'a dyn ProgressReporter>, total: usize) -> Self {
        Self {
            reporter,
            state: RunState::Idle,
            completed: 0,
            total,
        }
    }

    fn advance(&mut self, next: RunState, message: impl Into<String>) {
        debug_assert!(
            self.state.can_transition_to(next),
            "invalid run state transition {:?} -> {:?}",
            self.state,
            next
        );
        info!("Run state: {} -> {}", self.state.display_name(), next.display_name());
        self.state = next;
        self.report(ProgressUpdate::transition(next, self.completed, self.total, message));
    }

    fn stage_committed(&mut self, stage_index: usize, kind: &str, completed: usize) {
        self.completed = completed;
        self.report(ProgressUpdate::stage_committed(
            stage_index,
            kind,
            completed,
            self.total,
            format!("Applied '{kind}' ({completed}/{})", self.total),
        ));
    }

    fn report(&self, update: ProgressUpdate) {
        if let Some(reporter) = self.reporter {
            reporter.report(update);
        }
    }
}

/// Builder for creating a [`Pipeline`] instance.
///
/// Use [`Pipeline::builder()`] to get started. Without an explicit registry
/// the process-wide built-in registry is used.
#[derive(Default)]
pub struct PipelineBuilder {
    registry: Option<Arc<Registry>>,
    config: Option<RunConfig>,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
}

static_assertions::assert_impl_all!(PipelineBuilder: Send);

impl PipelineBuilder {
    /// Use a custom registry instead of the built-in one.
    pub fn registry(mut self, registry: Arc<Registry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Set the run configuration.
    pub fn config(mut self, config: RunConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set a progress reporter for receiving updates during a run.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// struct MyReporter;
    ///
    /// impl ProgressReporter for MyReporter {
    ///     fn report(&self, update: ProgressUpdate) {
    ///         println!("{}: {}", update.state.display_name(), update.message);
    ///     }
    /// }
    ///
    /// let pipeline = Pipeline::builder()
    ///     .progress_reporter(Arc::new(MyReporter))
    ///     .build()?;
    /// ```
    pub fn progress_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.progress_reporter = Some(reporter);
        self
    }

    /// Set a progress callback closure.
    ///
    /// This is a convenience method for simple progress handling.
    /// For more complex scenarios, use [`progress_reporter`](Self::progress_reporter).
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(ProgressUpdate) + Send + Sync + 'static,
    {
        self.progress_reporter = Some(Arc::new(ClosureProgressReporter::new(callback)));
        self
    }

    /// Build the pipeline.
    ///
    /// Returns `PipelineError::InvalidConfig` if the configuration is invalid.
    pub fn build(self) -> Result<Pipeline> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        Ok(Pipeline {
            registry: self.registry.unwrap_or_else(Registry::shared),
            config,
            progress_reporter: self.progress_reporter,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::IssueCode;
    use std::sync::Mutex;

    fn dataset() -> DataFrame {
        df!(
            "a" => [1.0, 2.0, 3.0, 4.0],
            "b" => [2.0, 1.0, 4.0, 3.0],
            "color" => ["red", "blue", "red", "green"]
        )
        .unwrap()
    }

    #[test]
    fn test_pipeline_builder_default() {
        let pipeline = Pipeline::builder().build().unwrap();
        assert_eq!(pipeline.config(), &RunConfig::default());
        assert_eq!(pipeline.registry().len(), 4);
    }

    #[test]
    fn test_pipeline_builder_rejects_invalid_config() {
        let config = RunConfig {
            missing_warning_threshold: 2.0,
            ..RunConfig::default()
        };
        let err = Pipeline::builder().config(config).build().err().unwrap();
        assert_eq!(err.error_code(), "INVALID_CONFIG");
        assert!(err.to_string().contains("missing_warning_threshold"));
    }

    #[test]
    fn test_progress_follows_state_machine() {
        let states = Arc::new(Mutex::new(Vec::new()));
        let states_clone = states.clone();

        let pipeline = Pipeline::builder()
            .on_progress(move |update| {
                states_clone.lock().unwrap().push((update.state, update.filter_kind));
            })
            .build()
            .unwrap();

        let outcome = pipeline
            .run(dataset(), &FilterSpec::sequence(["encode", "scale"]))
            .unwrap();
        assert_eq!(outcome.state(), RunState::Completed);

        let seen = states.lock().unwrap().clone();
        assert_eq!(
            seen,
            vec![
                (RunState::Validating, None),
                (RunState::Ready, None),
                (RunState::Running, None),
                (RunState::Running, Some("encode".to_string())),
                (RunState::Running, Some("scale".to_string())),
                (RunState::Completed, None),
            ]
        );
    }

    #[test]
    fn test_rejected_run_executes_nothing() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let calls_clone = calls.clone();

        let pipeline = Pipeline::builder()
            .on_progress(move |update| calls_clone.lock().unwrap().push(update.state))
            .build()
            .unwrap();

        let outcome = pipeline.run(dataset(), &[]).unwrap();
        assert_eq!(outcome.state(), RunState::Rejected);
        assert!(outcome.packet().is_none());
        assert!(outcome.report().has_code(IssueCode::EmptyPipeline));
        assert_eq!(
            *calls.lock().unwrap(),
            vec![RunState::Validating, RunState::Rejected]
        );
    }

    #[test]
    fn test_validate_is_a_dry_run() {
        let pipeline = Pipeline::builder().build().unwrap();
        let specs = vec![FilterSpec::new("pca", 0).param("n_components", 2)];
        let report = pipeline.validate(&dataset(), &specs).unwrap();

        assert!(report.has_code(IssueCode::OrderingViolation));
        assert!(report.has_code(IssueCode::SchemaIncompatibility));
    }
}
