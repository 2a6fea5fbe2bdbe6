//! Run states and progress reporting for pipeline runs.
//!
//! A run moves through a small state machine:
//!
//! ```text
//! Idle -> Validating -> Ready    -> Running -> Completed
//!                    \-> Rejected           \-> Failed
//! ```
//!
//! An optional [`ProgressReporter`] receives a [`ProgressUpdate`] on every
//! state transition and after every committed stage.
//!
//! # Example
//!
//! ```rust,ignore
//! use lex_pipeline::Pipeline;
//!
//! let outcome = Pipeline::builder()
//!     .on_progress(|update| {
//!         println!("[{:?}] {}", update.state, update.message);
//!     })
//!     .build()?
//!     .run(df, &specs)?;
//! ```

use serde::{Deserialize, Serialize};

/// State of a single pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// Run requested, nothing checked yet
    Idle,
    /// Structural and data-aware validation in progress
    Validating,
    /// Validation found no error-level issue
    Ready,
    /// Validation found at least one error-level issue; nothing executed
    Rejected,
    /// Filters are being applied in order
    Running,
    /// Every enabled filter applied
    Completed,
    /// A filter failed; history holds the stages committed before it
    Failed,
}

impl RunState {
    /// Returns a human-readable name for the state.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Validating => "Validating Pipeline",
            Self::Ready => "Ready",
            Self::Rejected => "Rejected",
            Self::Running => "Running Filters",
            Self::Completed => "Completed",
            Self::Failed => "Failed",
        }
    }

    /// Terminal states end a run. Re-running requires a fresh `run` call.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Rejected | Self::Completed | Self::Failed)
    }

    /// Whether the state machine allows moving from `self` to `next`.
    pub fn can_transition_to(&self, next: RunState) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::Validating)
                | (Self::Validating, Self::Ready)
                | (Self::Validating, Self::Rejected)
                | (Self::Ready, Self::Running)
                | (Self::Running, Self::Completed)
                | (Self::Running, Self::Failed)
        )
    }
}

/// Progress information for one state transition or committed stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressUpdate {
    /// Current run state
    pub state: RunState,

    /// Overall progress (0.0 - 1.0)
    pub progress: f32,

    /// Human-readable message describing current activity
    pub message: String,

    /// Position (`order`) of the stage this update refers to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage_index: Option<usize>,

    /// Kind of the stage this update refers to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter_kind: Option<String>,

    /// Stages committed so far
    pub stages_completed: usize,

    /// Enabled stages in the run
    pub stages_total: usize,
}

impl ProgressUpdate {
    /// Creates an update for a state transition.
    pub fn transition(state: RunState, stages_completed: usize, stages_total: usize, message: impl Into<String>) -> Self {
        let progress = match state {
            RunState::Completed => 1.0,
            RunState::Rejected | RunState::Failed | RunState::Idle | RunState::Validating => 0.0,
            RunState::Ready | RunState::Running => fraction(stages_completed, stages_total),
        };
        Self {
            state,
            progress,
            message: message.into(),
            stage_index: None,
            filter_kind: None,
            stages_completed,
            stages_total,
        }
    }

    /// Creates an update for a stage that was just committed to history.
    pub fn stage_committed(
        stage_index: usize,
        filter_kind: impl Into<String>,
        stages_completed: usize,
        stages_total: usize,
        message: impl Into<String>,
    ) -> Self {
        Self {
            state: RunState::Running,
            progress: fraction(stages_completed, stages_total),
            message: message.into(),
            stage_index: Some(stage_index),
            filter_kind: Some(filter_kind.into()),
            stages_completed,
            stages_total,
        }
    }
}

fn fraction(done: usize, total: usize) -> f32 {
    if total == 0 {
        0.0
    } else {
        (done as f32 / total as f32).clamp(0.0, 1.0)
    }
}

/// Trait for receiving progress updates during a run.
///
/// Implementations must be `Send + Sync` so a pipeline running on a
/// background thread can report to a UI thread.
pub trait ProgressReporter: Send + Sync {
    /// Called on every state transition and after every committed stage.
    /// Implementations should be cheap and non-blocking.
    fn report(&self, update: ProgressUpdate);
}

/// Wrapper that implements [`ProgressReporter`] using a closure.
///
/// # Example
///
/// ```rust,ignore
/// Pipeline::builder()
///     .on_progress(|update| {
///         println!("[{:.0}%] {}", update.progress * 100.0, update.message);
///     })
///     .build()?;
/// ```
pub struct ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    callback: F,
}

impl<F> ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    /// Creates a new closure-based progress reporter.
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> ProgressReporter for ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    fn report(&self, update: ProgressUpdate) {
        (self.callback)(update);
    }
}

static_assertions::assert_impl_all!(ProgressUpdate: Send, Sync);
static_assertions::assert_impl_all!(RunState: Send, Sync, Copy);

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_allowed_transitions() {
        use RunState::*;
        assert!(Idle.can_transition_to(Validating));
        assert!(Validating.can_transition_to(Rejected));
        assert!(Validating.can_transition_to(Ready));
        assert!(Ready.can_transition_to(Running));
        assert!(Running.can_transition_to(Failed));
        assert!(Running.can_transition_to(Completed));

        assert!(!Idle.can_transition_to(Running));
        assert!(!Rejected.can_transition_to(Running));
        assert!(!Completed.can_transition_to(Validating));
        assert!(!Validating.can_transition_to(Completed));
    }

    #[test]
    fn test_terminal_states() {
        assert!(RunState::Rejected.is_terminal());
        assert!(RunState::Failed.is_terminal());
        assert!(RunState::Completed.is_terminal());
        assert!(!RunState::Ready.is_terminal());
    }

    #[test]
    fn test_stage_progress() {
        let update = ProgressUpdate::stage_committed(2, "scale", 3, 4, "Applied scale");
        assert_eq!(update.state, RunState::Running);
        assert_eq!(update.progress, 0.75);
        assert_eq!(update.filter_kind.as_deref(), Some("scale"));

        let done = ProgressUpdate::transition(RunState::Completed, 4, 4, "Done");
        assert_eq!(done.progress, 1.0);
        assert!(done.stage_index.is_none());
    }

    #[test]
    fn test_closure_progress_reporter() {
        let call_count = Arc::new(AtomicUsize::new(0));
        let call_count_clone = call_count.clone();

        let reporter = ClosureProgressReporter::new(move |_update| {
            call_count_clone.fetch_add(1, Ordering::SeqCst);
        });

        reporter.report(ProgressUpdate::transition(RunState::Validating, 0, 2, "Validating"));
        reporter.report(ProgressUpdate::transition(RunState::Rejected, 0, 2, "Rejected"));

        assert_eq!(call_count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_progress_update_json_serialization() {
        let update = ProgressUpdate::stage_committed(1, "encode", 2, 4, "Applied encode");
        let json = serde_json::to_string(&update).expect("Should serialize");

        assert!(json.contains("\"state\":\"running\""), "State should be snake_case");
        assert!(json.contains("\"filter_kind\":\"encode\""));
        assert!(json.contains("\"stages_total\":4"));

        let transition = serde_json::to_string(&ProgressUpdate::transition(RunState::Ready, 0, 4, "Ready"))
            .expect("Should serialize");
        assert!(!transition.contains("stage_index"));
    }

    #[test]
    fn test_progress_reporter_across_threads() {
        let call_count = Arc::new(AtomicUsize::new(0));
        let call_count_clone = call_count.clone();

        let reporter = Arc::new(ClosureProgressReporter::new(move |_update| {
            call_count_clone.fetch_add(1, Ordering::SeqCst);
        }));

        let reporter_clone = reporter.clone();
        let handle = std::thread::spawn(move || {
            reporter_clone.report(ProgressUpdate::transition(RunState::Running, 0, 1, "From background thread"));
        });

        handle.join().expect("Thread should not panic");
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
    }
}
