//! Dense linear algebra used by the numeric filters.

mod pca;

pub use pca::{PcaError, PcaFit, fit_pca, symmetric_eigen};
