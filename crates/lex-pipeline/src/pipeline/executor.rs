//! Stage execution.
//!
//! Folds left over the enabled filter specs: apply, diff against the
//! previous packet, commit a [`StageRecord`], hand the new packet to the
//! next stage. Execution stops at the first filter failure.

use super::progress::RunState;
use crate::config::{FilterSpec, RunConfig};
use crate::diff::SchemaDiffEngine;
use crate::error::{Result, ResultExt};
use crate::packet::DataPacket;
use crate::registry::Registry;
use crate::types::{StageRecord, TablePreview, ValidationReport};
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info};

/// Why a run stopped at a stage.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("Stage {stage_index} ('{kind}') failed [{code}]: {cause}")]
pub struct RunFailure {
    /// Position (`order`) of the failing filter.
    pub stage_index: usize,
    pub kind: String,
    /// Machine-readable error code of the underlying filter error.
    pub code: String,
    pub cause: String,
}

/// Terminal result of a pipeline run.
#[derive(Debug, Clone)]
pub enum RunOutcome {
    /// Every enabled filter applied. The packet carries the full history.
    Completed {
        packet: DataPacket,
        report: ValidationReport,
    },
    /// Validation found error-level issues; nothing was executed.
    Rejected { report: ValidationReport },
    /// A filter failed. The packet is the last committed one, so its
    /// history holds every stage that succeeded before the failure.
    Failed {
        failure: RunFailure,
        packet: DataPacket,
        report: ValidationReport,
    },
}

impl RunOutcome {
    pub fn state(&self) -> RunState {
        match self {
            Self::Completed { .. } => RunState::Completed,
            Self::Rejected { .. } => RunState::Rejected,
            Self::Failed { .. } => RunState::Failed,
        }
    }

    /// Issues found by validation. Warnings are kept even on success.
    pub fn report(&self) -> &ValidationReport {
        match self {
            Self::Completed { report, .. } | Self::Rejected { report } | Self::Failed { report, .. } => {
                report
            }
        }
    }

    pub fn packet(&self) -> Option<&DataPacket> {
        match self {
            Self::Completed { packet, .. } | Self::Failed { packet, .. } => Some(packet),
            Self::Rejected { .. } => None,
        }
    }

    pub fn into_packet(self) -> Option<DataPacket> {
        match self {
            Self::Completed { packet, .. } | Self::Failed { packet, .. } => Some(packet),
            Self::Rejected { .. } => None,
        }
    }

    pub fn failure(&self) -> Option<&RunFailure> {
        match self {
            Self::Failed { failure, .. } => Some(failure),
            _ => None,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}

/// Result of folding over the stages.
#[derive(Debug)]
pub(crate) enum ExecutionResult {
    Completed(DataPacket),
    Failed { failure: RunFailure, packet: DataPacket },
}

/// Applies validated filter specs in order.
pub struct StageExecutor<'a> {
    registry: &'a Registry,
    diff: SchemaDiffEngine,
    preview_rows: usize,
}

impl<'a> StageExecutor<'a> {
    pub fn new(registry: &'a Registry, config: &RunConfig) -> Self {
        Self {
            registry,
            diff: SchemaDiffEngine::new(config.diff_sample_rows),
            preview_rows: config.preview_rows,
        }
    }

    /// Run every stage. `on_commit` is called with each committed record
    /// and the number of stages committed so far.
    ///
    /// Filter failures end the fold with [`ExecutionResult::Failed`]; the
    /// returned `Err` is reserved for errors outside any filter (diffing,
    /// previews, registry lookups).
    pub(crate) fn execute(
        &self,
        initial: DataPacket,
        stages: &[&FilterSpec],
        mut on_commit: impl FnMut(&StageRecord, usize),
    ) -> Result<ExecutionResult> {
        let mut packet = initial;

        for (done, spec) in stages.iter().enumerate() {
            match self.run_stage(&packet, spec)? {
                Ok(next) => {
                    packet = next;
                    if let Some(record) = packet.history().last() {
                        on_commit(record, done + 1);
                    }
                }
                Err(failure) => return Ok(ExecutionResult::Failed { failure, packet }),
            }
        }

        Ok(ExecutionResult::Completed(packet))
    }

    fn run_stage(
        &self,
        input: &DataPacket,
        spec: &FilterSpec,
    ) -> Result<std::result::Result<DataPacket, RunFailure>> {
        let entry = self.registry.get(&spec.kind)?;
        let filter = entry.create();
        let (parameters, _) = entry.parameters.resolve(&spec.parameters);

        debug!("Applying '{}' at stage {} with {:?}", spec.kind, spec.order, parameters);
        let started = Instant::now();

        let mut output = match filter.apply(input, &parameters) {
            Ok(output) => output,
            Err(err) => {
                return Ok(Err(RunFailure {
                    stage_index: spec.order,
                    kind: spec.kind.clone(),
                    code: err.error_code().to_string(),
                    cause: err.to_string(),
                }));
            }
        };

        let diff = self
            .diff
            .diff(input.table(), output.table())
            .context(format!("Diffing stage {} ('{}')", spec.order, spec.kind))?;
        let preview = TablePreview::capture(output.table(), self.preview_rows)
            .context(format!("Capturing preview of stage {}", spec.order))?;
        let stats = output
            .stats_for(&spec.kind)
            .cloned()
            .unwrap_or(serde_json::Value::Null);

        let record = StageRecord {
            position: spec.order,
            filter_name: spec.kind.clone(),
            display_name: entry.display_name.clone(),
            parameters,
            input_shape: diff.input_shape,
            output_shape: diff.output_shape,
            columns_added: diff.columns_added,
            columns_removed: diff.columns_removed,
            columns_modified: diff.columns_modified,
            preview,
            stats,
            duration_ms: started.elapsed().as_millis() as u64,
            completed_at: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        };

        info!(
            "Stage {} '{}' committed: {} -> {}",
            record.position, record.filter_name, record.input_shape, record.output_shape
        );
        output.record_stage(record);
        Ok(Ok(output))
    }
}
