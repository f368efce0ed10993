use anyhow::{
    ensure,
    Result,
};
use itertools::Itertools;
use log::{
    debug,
    info,
};
use ndarray::{
    Array1,
    Array2,
    ArrayView2,
    Axis,
};

use super::Reducer;

/// Principal component analysis keeping the smallest number of components
/// whose cumulative explained variance reaches the requested fraction.
///
/// The covariance matrix (or the Gram matrix, for wide inputs) is
/// diagonalised with cyclic Jacobi rotations.
/// Components are sign-normalised so that their largest loading is
/// positive, which makes the projection deterministic.
#[derive(Debug, Clone)]
pub struct Pca {
    max_sweeps: usize,
    tolerance:  f64,
}

impl Default for Pca {
    fn default() -> Self {
        Self {
            max_sweeps: 100,
            tolerance:  1e-12,
        }
    }
}

impl Pca {
    pub fn new(
        max_sweeps: usize,
        tolerance: f64,
    ) -> Self {
        Self {
            max_sweeps,
            tolerance,
        }
    }

    /// Eigen-decomposition of the covariance of `matrix`.
    ///
    /// Returns column means, eigenvalues in descending order and the matching
    /// eigenvectors as columns. For matrices with fewer rows than columns at
    /// most `n_rows` components are returned.
    pub fn decompose(
        &self,
        matrix: ArrayView2<f64>,
    ) -> Result<(Array1<f64>, Array1<f64>, Array2<f64>)> {
        let (n_rows, n_cols) = matrix.dim();
        ensure!(n_rows > 0 && n_cols > 0, "Cannot run PCA on an empty matrix");
        ensure!(
            matrix.iter().all(|v| v.is_finite()),
            "PCA input contains non-finite values"
        );

        let mean = matrix
            .mean_axis(Axis(0))
            .unwrap_or_else(|| Array1::zeros(n_cols));
        let centered = &matrix - &mean.view().insert_axis(Axis(0));
        let denominator = (n_rows.max(2) - 1) as f64;

        let (eigenvalues, eigenvectors) = if n_rows < n_cols {
            // Wide matrix: diagonalise the n × n Gram matrix and map its
            // eigenvectors back to feature space, v = Xᵀu / sqrt(λ(n-1)).
            let gram = centered.dot(&centered.t()) / denominator;
            let (values, vectors) = jacobi_eigen(gram, self.max_sweeps, self.tolerance);
            let mut axes = centered.t().dot(&vectors);
            for (mut axis, value) in axes.columns_mut().into_iter().zip(values.iter()) {
                let norm = (value.max(0.0) * denominator).sqrt();
                if norm > f64::EPSILON {
                    axis.mapv_inplace(|v| v / norm);
                }
                else {
                    axis.fill(0.0);
                }
            }
            (values, axes)
        }
        else {
            let covariance = centered.t().dot(&centered) / denominator;
            jacobi_eigen(covariance, self.max_sweeps, self.tolerance)
        };

        let order = (0..eigenvalues.len())
            .sorted_by(|a, b| eigenvalues[*b].total_cmp(&eigenvalues[*a]))
            .collect_vec();
        let sorted_values = order
            .iter()
            .map(|i| eigenvalues[*i].max(0.0))
            .collect::<Array1<f64>>();
        let mut sorted_vectors = eigenvectors.select(Axis(1), &order);

        for mut column in sorted_vectors.columns_mut() {
            let pivot = column
                .iter()
                .copied()
                .max_by(|a, b| a.abs().total_cmp(&b.abs()))
                .unwrap_or(0.0);
            if pivot < 0.0 {
                column.mapv_inplace(|v| -v);
            }
        }
        Ok((mean, sorted_values, sorted_vectors))
    }
}

impl Reducer for Pca {
    fn reduce(
        &self,
        matrix: ArrayView2<f64>,
        variance_fraction: f64,
    ) -> Result<Array2<f64>> {
        ensure!(
            variance_fraction > 0.0 && variance_fraction <= 1.0,
            "Variance fraction must be in (0, 1], got {}",
            variance_fraction
        );
        let (mean, eigenvalues, eigenvectors) = self.decompose(matrix)?;
        let (n_rows, n_cols) = matrix.dim();

        let total = eigenvalues.sum();
        if total <= 0.0 {
            debug!("Feature matrix has no variance, projecting onto a single axis");
            return Ok(Array2::zeros((n_rows, 1)));
        }

        let max_components = n_cols.min(n_rows).max(1);
        let mut cumulative = 0.0;
        let mut n_components = max_components;
        for (idx, value) in eigenvalues.iter().enumerate() {
            cumulative += value / total;
            if cumulative >= variance_fraction - 1e-12 {
                n_components = idx + 1;
                break;
            }
        }
        let n_components = n_components.min(max_components);
        info!(
            "PCA keeps {} of {} components ({:.1}% variance)",
            n_components,
            n_cols,
            100.0 * eigenvalues.iter().take(n_components).sum::<f64>() / total
        );

        let centered = &matrix - &mean.view().insert_axis(Axis(0));
        let components = eigenvectors.slice(ndarray::s![.., ..n_components]);
        Ok(centered.dot(&components))
    }
}

/// Cyclic Jacobi eigenvalue algorithm for a symmetric matrix.
///
/// Returns eigenvalues (unordered) and eigenvectors as columns.
fn jacobi_eigen(
    mut a: Array2<f64>,
    max_sweeps: usize,
    tolerance: f64,
) -> (Array1<f64>, Array2<f64>) {
    let n = a.nrows();
    let mut v = Array2::<f64>::eye(n);
    let scale = a
        .iter()
        .map(|x| x * x)
        .sum::<f64>()
        .max(f64::MIN_POSITIVE);

    for sweep in 0..max_sweeps {
        let off_diagonal = (0..n)
            .flat_map(|p| ((p + 1)..n).map(move |q| (p, q)))
            .map(|(p, q)| a[[p, q]] * a[[p, q]])
            .sum::<f64>();
        if off_diagonal <= tolerance * scale {
            debug!("Jacobi converged after {} sweeps", sweep);
            break;
        }

        for p in 0..n {
            for q in (p + 1)..n {
                let apq = a[[p, q]];
                if apq == 0.0 {
                    continue;
                }
                let theta = (a[[q, q]] - a[[p, p]]) / (2.0 * apq);
                let t = if theta == 0.0 {
                    1.0
                }
                else {
                    theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt())
                };
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;

                for k in 0..n {
                    let akp = a[[k, p]];
                    let akq = a[[k, q]];
                    a[[k, p]] = c * akp - s * akq;
                    a[[k, q]] = s * akp + c * akq;
                }
                for k in 0..n {
                    let apk = a[[p, k]];
                    let aqk = a[[q, k]];
                    a[[p, k]] = c * apk - s * aqk;
                    a[[q, k]] = s * apk + c * aqk;
                }
                for k in 0..n {
                    let vkp = v[[k, p]];
                    let vkq = v[[k, q]];
                    v[[k, p]] = c * vkp - s * vkq;
                    v[[k, q]] = s * vkp + c * vkq;
                }
            }
        }
    }
    (a.diag().to_owned(), v)
}
