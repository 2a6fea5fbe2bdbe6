//! Principal component analysis on a dense feature matrix.
//!
//! The covariance matrix is decomposed with the cyclic Jacobi method, which
//! is exact enough for the feature counts a preprocessing pipeline sees and
//! needs no LAPACK binding.

use ndarray::{Array1, Array2, Axis};
use thiserror::Error;

const MAX_SWEEPS: usize = 100;
const TOLERANCE: f64 = 1e-12;

/// Reasons a PCA fit cannot be produced.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PcaError {
    #[error("PCA needs at least one sample and one feature, got {samples}x{features}")]
    EmptyInput { samples: usize, features: usize },

    #[error("n_components ({requested}) must be between 1 and min(n_samples, n_features) = {max_allowed}")]
    InvalidComponentCount { requested: usize, max_allowed: usize },

    #[error("Input contains non-finite values")]
    NonFinite,

    #[error("Input has zero total variance")]
    ZeroVariance,

    #[error("Eigen decomposition did not converge after {0} sweeps")]
    NotConverged(usize),
}

/// A fitted projection.
#[derive(Debug, Clone)]
pub struct PcaFit {
    /// Per-feature mean subtracted before projecting.
    pub mean: Array1<f64>,
    /// Principal axes as columns, `n_features x n_components`.
    pub components: Array2<f64>,
    pub explained_variance: Vec<f64>,
    pub explained_variance_ratio: Vec<f64>,
}

impl PcaFit {
    /// Project samples (rows of `x`) onto the principal axes.
    pub fn transform(&self, x: &Array2<f64>) -> Array2<f64> {
        (x - &self.mean).dot(&self.components)
    }

    pub fn n_components(&self) -> usize {
        self.components.ncols()
    }
}

/// Fit `n_components` principal axes to the rows of `x`.
///
/// Components are ordered by decreasing explained variance. Each axis is
/// oriented so that its largest-magnitude loading is positive, which makes
/// the result deterministic.
pub fn fit_pca(x: &Array2<f64>, n_components: usize) -> Result<PcaFit, PcaError> {
    let (samples, features) = x.dim();
    if samples == 0 || features == 0 {
        return Err(PcaError::EmptyInput { samples, features });
    }
    let max_allowed = samples.min(features);
    if n_components == 0 || n_components > max_allowed {
        return Err(PcaError::InvalidComponentCount {
            requested: n_components,
            max_allowed,
        });
    }
    if x.iter().any(|v| !v.is_finite()) {
        return Err(PcaError::NonFinite);
    }

    let mean = x
        .mean_axis(Axis(0))
        .ok_or(PcaError::EmptyInput { samples, features })?;
    let centered = x - &mean;
    let denominator = if samples > 1 { (samples - 1) as f64 } else { 1.0 };
    let covariance = centered.t().dot(&centered) / denominator;

    let total_variance: f64 = covariance.diag().sum();
    if total_variance <= f64::EPSILON {
        return Err(PcaError::ZeroVariance);
    }

    let (eigenvalues, eigenvectors) = symmetric_eigen(&covariance)?;

    let mut order: Vec<usize> = (0..features).collect();
    order.sort_by(|&a, &b| eigenvalues[b].total_cmp(&eigenvalues[a]));

    let mut components = Array2::<f64>::zeros((features, n_components));
    let mut explained_variance = Vec::with_capacity(n_components);
    for (target, &source) in order.iter().take(n_components).enumerate() {
        let mut axis = eigenvectors.column(source).to_owned();
        let pivot = axis
            .iter()
            .enumerate()
            .fold(0, |best, (i, v)| if v.abs() > axis[best].abs() { i } else { best });
        if axis[pivot] < 0.0 {
            axis.mapv_inplace(|v| -v);
        }
        components.column_mut(target).assign(&axis);
        explained_variance.push(eigenvalues[source].max(0.0));
    }

    let explained_variance_ratio: Vec<f64> = explained_variance
        .iter()
        .map(|v| v / total_variance)
        .collect();

    if components.iter().chain(explained_variance_ratio.iter()).any(|v| !v.is_finite()) {
        return Err(PcaError::NonFinite);
    }

    Ok(PcaFit {
        mean,
        components,
        explained_variance,
        explained_variance_ratio,
    })
}

/// Eigenvalues and eigenvectors (as columns) of a symmetric matrix.
///
/// Values are returned in diagonal order, not sorted.
pub fn symmetric_eigen(matrix: &Array2<f64>) -> Result<(Array1<f64>, Array2<f64>), PcaError> {
    let n = matrix.nrows();
    let mut a = matrix.to_owned();
    let mut v = Array2::<f64>::eye(n);
    let scale = a.iter().map(|x| x * x).sum::<f64>().sqrt().max(f64::MIN_POSITIVE);

    for _ in 0..MAX_SWEEPS {
        if off_diagonal_norm(&a) <= TOLERANCE * scale {
            return Ok((a.diag().to_owned(), v));
        }

        for p in 0..n {
            for q in (p + 1)..n {
                let apq = a[[p, q]];
                if apq.abs() <= f64::MIN_POSITIVE {
                    continue;
                }
                let theta = (a[[q, q]] - a[[p, p]]) / (2.0 * apq);
                let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;

                for k in 0..n {
                    let (akp, akq) = (a[[k, p]], a[[k, q]]);
                    a[[k, p]] = c * akp - s * akq;
                    a[[k, q]] = s * akp + c * akq;
                }
                for k in 0..n {
                    let (apk, aqk) = (a[[p, k]], a[[q, k]]);
                    a[[p, k]] = c * apk - s * aqk;
                    a[[q, k]] = s * apk + c * aqk;
                }
                for k in 0..n {
                    let (vkp, vkq) = (v[[k, p]], v[[k, q]]);
                    v[[k, p]] = c * vkp - s * vkq;
                    v[[k, q]] = s * vkp + c * vkq;
                }
            }
        }
    }

    Err(PcaError::NotConverged(MAX_SWEEPS))
}

fn off_diagonal_norm(a: &Array2<f64>) -> f64 {
    a.indexed_iter()
        .filter(|((i, j), _)| i != j)
        .map(|(_, v)| v * v)
        .sum::<f64>()
        .sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_symmetric_eigen_2x2() {
        let (values, vectors) = symmetric_eigen(&array![[2.0, 1.0], [1.0, 2.0]]).unwrap();
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);
        assert!(close(sorted[0], 1.0));
        assert!(close(sorted[1], 3.0));

        // columns are orthonormal
        let gram = vectors.t().dot(&vectors);
        assert!(close(gram[[0, 0]], 1.0));
        assert!(close(gram[[0, 1]], 0.0));
    }

    #[test]
    fn test_perfectly_correlated_features_collapse_to_one_axis() {
        let x = array![[1.0, 2.0], [2.0, 4.0], [3.0, 6.0], [4.0, 8.0]];
        let fit = fit_pca(&x, 2).unwrap();

        assert!(close(fit.explained_variance_ratio[0], 1.0));
        assert!(fit.explained_variance_ratio[1].abs() < 1e-9);
        // largest loading is positive
        assert!(fit.components[[1, 0]] > 0.0);

        let scores = fit.transform(&x);
        assert_eq!(scores.dim(), (4, 2));
        assert!(scores[[0, 0]] < scores[[3, 0]]);
    }

    #[test]
    fn test_components_are_sorted_by_variance() {
        let x = array![
            [2.5, 2.4, 0.5],
            [0.5, 0.7, 0.1],
            [2.2, 2.9, 0.4],
            [1.9, 2.2, 0.3],
            [3.1, 3.0, 0.6],
            [2.3, 2.7, 0.2]
        ];
        let fit = fit_pca(&x, 3).unwrap();
        let ev = &fit.explained_variance;
        assert!(ev[0] >= ev[1] && ev[1] >= ev[2]);
        assert!(close(fit.explained_variance_ratio.iter().sum::<f64>(), 1.0));
    }

    #[test]
    fn test_degenerate_inputs() {
        let constant = array![[1.0, 1.0], [1.0, 1.0], [1.0, 1.0]];
        assert_eq!(fit_pca(&constant, 1).unwrap_err(), PcaError::ZeroVariance);

        let x = array![[1.0, 2.0], [3.0, 5.0]];
        assert!(matches!(
            fit_pca(&x, 3).unwrap_err(),
            PcaError::InvalidComponentCount { requested: 3, max_allowed: 2 }
        ));

        let nan = array![[1.0, f64::NAN], [3.0, 5.0]];
        assert_eq!(fit_pca(&nan, 1).unwrap_err(), PcaError::NonFinite);
    }
}
