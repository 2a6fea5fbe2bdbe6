//! The filter capability and the built-in filter kinds.
//!
//! Every processing stage implements [`Filter`]. A filter declares its
//! parameters, projects a [`TableSchema`] forward by its declared effect,
//! checks a projected schema for stage-specific problems, and applies itself
//! to a [`DataPacket`], producing a new packet.
//!
//! New kinds are added by implementing [`Filter`] and registering a factory
//! in a [`Registry`](crate::registry::Registry); the executor never needs to
//! change.

mod encode;
mod impute;
pub mod params;
mod pca;
mod scale;

pub use encode::EncodeFilter;
pub use impute::ImputeFilter;
pub use params::{ParameterKind, ParameterSchema, ParameterSpec};
pub use pca::PcaFilter;
pub use scale::ScaleFilter;

use crate::error::FilterExecutionError;
use crate::packet::DataPacket;
use crate::schema::TableSchema;
use crate::types::{Parameters, ValidationIssue};

/// Contract implemented by every filter kind.
pub trait Filter: Send + Sync {
    /// Registry key, e.g. `"scale"`.
    fn kind(&self) -> &'static str;

    /// Human-readable name for UI rendering.
    fn display_name(&self) -> &'static str;

    /// Names, types, defaults and valid ranges of the parameters.
    fn declare_parameters(&self) -> ParameterSchema;

    /// Schema this filter would produce from `input`, without touching data.
    fn project_schema(&self, input: &TableSchema, params: &Parameters) -> TableSchema;

    /// Stage-specific semantic checks against the schema seen at this stage.
    ///
    /// Returned issues carry no stage index; the caller attaches it.
    fn validate_against_data(&self, input: &TableSchema, params: &Parameters)
    -> Vec<ValidationIssue>;

    /// Transform `packet` into a new packet.
    ///
    /// Implementations call [`Filter::ensure_applicable`] first so that a
    /// filter applied despite an unresolved error-level issue fails instead
    /// of producing a malformed result.
    fn apply(
        &self,
        packet: &DataPacket,
        params: &Parameters,
    ) -> Result<DataPacket, FilterExecutionError>;

    /// Re-run the data-aware checks against the actual input table.
    fn ensure_applicable(
        &self,
        packet: &DataPacket,
        params: &Parameters,
    ) -> Result<(), FilterExecutionError> {
        let schema = packet.schema()?;
        match self
            .validate_against_data(&schema, params)
            .into_iter()
            .find(ValidationIssue::is_error)
        {
            Some(issue) => Err(FilterExecutionError::UnresolvedIssue {
                code: issue.code.to_string(),
                message: issue.message,
            }),
            None => Ok(()),
        }
    }
}
