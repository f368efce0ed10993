use std::f64::consts::PI;

use anyhow::{
    ensure,
    Result,
};
use itertools::Itertools;
use log::{
    debug,
    info,
    warn,
};
use ndarray::{
    Array1,
    Array2,
    ArrayView1,
    ArrayView2,
    Axis,
};
use rand::distributions::{
    Distribution,
    WeightedIndex,
};
use rand::rngs::StdRng;
use rand::{
    Rng,
    SeedableRng,
};

use super::config::BinningConfig;
use super::Assigner;

/// Components whose total responsibility drops below this are removed.
const MIN_COMPONENT_WEIGHT: f64 = 1e-8;

/// Gaussian mixture with diagonal covariances fitted by expectation
/// maximisation.
///
/// Means are seeded k-means++ style. Components that end up without
/// responsibility are pruned, so the fit may return fewer groups than
/// requested but never more than the number of rows.
#[derive(Debug, Clone)]
pub struct GaussianMixture {
    max_iter:   usize,
    tolerance:  f64,
    reg_covar:  f64,
    seed:       Option<u64>,
}

impl Default for GaussianMixture {
    fn default() -> Self {
        Self {
            max_iter:  500,
            tolerance: 1e-6,
            reg_covar: 1e-6,
            seed:      None,
        }
    }
}

impl GaussianMixture {
    pub fn new(
        max_iter: usize,
        tolerance: f64,
        reg_covar: f64,
        seed: Option<u64>,
    ) -> Self {
        Self {
            max_iter,
            tolerance,
            reg_covar,
            seed,
        }
    }

    pub fn from_config(config: &BinningConfig) -> Self {
        Self {
            max_iter: config.max_iter,
            tolerance: config.tolerance,
            seed: config.seed,
            ..Default::default()
        }
    }

    fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }

    /// Fits the mixture and returns the fitted model.
    pub fn fit(
        &self,
        data: ArrayView2<f64>,
        n_components: usize,
    ) -> Result<FittedMixture> {
        let (n_rows, n_cols) = data.dim();
        ensure!(n_rows > 0 && n_cols > 0, "Cannot fit a mixture to an empty matrix");
        ensure!(n_components > 0, "Number of components must be positive");
        ensure!(
            data.iter().all(|v| v.is_finite()),
            "Mixture input contains non-finite values"
        );
        let k = n_components.min(n_rows);
        if k < n_components {
            debug!(
                "Requested {} components for {} rows, using {}",
                n_components, n_rows, k
            );
        }

        let mut rng = self.rng();
        let global_var = data.var_axis(Axis(0), 0.0) + self.reg_covar;
        let mut model = FittedMixture {
            weights:   Array1::from_elem(k, 1.0 / k as f64),
            means:     kmeans_plus_plus(data, k, &mut rng),
            variances: Array2::from_shape_fn((k, n_cols), |(_, j)| global_var[j]),
            log_likelihood: f64::NEG_INFINITY,
            n_iter:    0,
        };

        let mut previous = f64::NEG_INFINITY;
        for iteration in 0..self.max_iter {
            let (resp, log_likelihood) = model.e_step(data);
            model.log_likelihood = log_likelihood;
            model.n_iter = iteration + 1;
            model.m_step(data, &resp, self.reg_covar);

            let change = (log_likelihood - previous).abs();
            if change <= self.tolerance * log_likelihood.abs().max(1.0) {
                debug!(
                    "Mixture converged after {} iterations, log-likelihood {:.4}",
                    iteration + 1,
                    log_likelihood
                );
                break;
            }
            previous = log_likelihood;
        }
        if model.n_iter == self.max_iter {
            warn!("Mixture did not converge in {} iterations", self.max_iter);
        }
        Ok(model)
    }
}

impl Assigner for GaussianMixture {
    fn assign(
        &self,
        matrix: ArrayView2<f64>,
        n_clusters: usize,
    ) -> Result<Vec<usize>> {
        let model = self.fit(matrix, n_clusters)?;
        let labels = model.predict(matrix);
        info!(
            "Mixture assigned {} rows to {} groups",
            labels.len(),
            labels.iter().unique().count()
        );
        Ok(labels)
    }
}

/// Parameters of a fitted mixture.
#[derive(Debug, Clone)]
pub struct FittedMixture {
    weights:        Array1<f64>,
    means:          Array2<f64>,
    variances:      Array2<f64>,
    log_likelihood: f64,
    n_iter:         usize,
}

impl FittedMixture {
    pub fn n_components(&self) -> usize {
        self.weights.len()
    }

    pub fn weights(&self) -> &Array1<f64> {
        &self.weights
    }

    pub fn means(&self) -> &Array2<f64> {
        &self.means
    }

    pub fn log_likelihood(&self) -> f64 {
        self.log_likelihood
    }

    pub fn n_iter(&self) -> usize {
        self.n_iter
    }

    /// Most responsible component of every row.
    pub fn predict(
        &self,
        data: ArrayView2<f64>,
    ) -> Vec<usize> {
        let log_prob = self.weighted_log_prob(data);
        log_prob
            .rows()
            .into_iter()
            .map(|row| {
                row.iter()
                    .enumerate()
                    .max_by(|a, b| a.1.total_cmp(b.1))
                    .map(|(idx, _)| idx)
                    .unwrap_or(0)
            })
            .collect_vec()
    }

    /// `ln(w_j) + ln N(x_i | mu_j, diag(var_j))`, `n_rows × n_components`.
    fn weighted_log_prob(
        &self,
        data: ArrayView2<f64>,
    ) -> Array2<f64> {
        let n_rows = data.nrows();
        let k = self.n_components();
        let log_norm = self
            .variances
            .rows()
            .into_iter()
            .map(|var| var.iter().map(|v| (2.0 * PI * v).ln()).sum::<f64>())
            .collect_vec();

        Array2::from_shape_fn((n_rows, k), |(i, j)| {
            let x = data.row(i);
            let mahalanobis = x
                .iter()
                .zip(self.means.row(j))
                .zip(self.variances.row(j))
                .map(|((x, mu), var)| (x - mu).powi(2) / var)
                .sum::<f64>();
            self.weights[j].ln() - 0.5 * (log_norm[j] + mahalanobis)
        })
    }

    /// Responsibilities and the total log-likelihood.
    fn e_step(
        &self,
        data: ArrayView2<f64>,
    ) -> (Array2<f64>, f64) {
        let mut resp = self.weighted_log_prob(data);
        let mut log_likelihood = 0.0;
        for mut row in resp.rows_mut() {
            let norm = log_sum_exp(row.view());
            log_likelihood += norm;
            row.mapv_inplace(|v| (v - norm).exp());
        }
        (resp, log_likelihood)
    }

    fn m_step(
        &mut self,
        data: ArrayView2<f64>,
        resp: &Array2<f64>,
        reg_covar: f64,
    ) {
        let n_rows = data.nrows() as f64;
        let totals = resp.sum_axis(Axis(0));
        let keep = (0..totals.len())
            .filter(|j| totals[*j] > MIN_COMPONENT_WEIGHT)
            .collect_vec();
        if keep.len() < totals.len() {
            debug!(
                "Pruned {} empty mixture components",
                totals.len() - keep.len()
            );
        }
        let resp = resp.select(Axis(1), &keep);
        let totals = totals.select(Axis(0), &keep);

        // resp^T x / N_k
        let means = resp.t().dot(&data) / &totals.view().insert_axis(Axis(1));
        let squares = data.mapv(|v| v * v);
        let second_moment = resp.t().dot(&squares) / &totals.view().insert_axis(Axis(1));
        let variances = (second_moment - means.mapv(|v| v * v)).mapv(|v| v.max(0.0) + reg_covar);

        self.weights = totals / n_rows;
        self.means = means;
        self.variances = variances;
    }
}

fn log_sum_exp(values: ArrayView1<f64>) -> f64 {
    let max = values
        .iter()
        .copied()
        .fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        return max;
    }
    max + values
        .iter()
        .map(|v| (v - max).exp())
        .sum::<f64>()
        .ln()
}

/// Picks `k` initial means: the first uniformly, the rest with probability
/// proportional to the squared distance to the closest chosen mean.
fn kmeans_plus_plus<R: Rng + ?Sized>(
    data: ArrayView2<f64>,
    k: usize,
    rng: &mut R,
) -> Array2<f64> {
    let n_rows = data.nrows();
    let mut chosen = vec![rng.gen_range(0..n_rows)];
    let mut distances = data
        .rows()
        .into_iter()
        .map(|row| squared_distance(row, data.row(chosen[0])))
        .collect_vec();

    while chosen.len() < k {
        let next = match WeightedIndex::new(&distances) {
            Ok(dist) => dist.sample(rng),
            // All remaining rows coincide with a chosen mean
            Err(_) => {
                let free = (0..n_rows)
                    .filter(|i| !chosen.contains(i))
                    .collect_vec();
                free[rng.gen_range(0..free.len())]
            },
        };
        chosen.push(next);
        for (i, row) in data.rows().into_iter().enumerate() {
            distances[i] = distances[i].min(squared_distance(row, data.row(next)));
        }
    }
    data.select(Axis(0), &chosen)
}

fn squared_distance(
    a: ArrayView1<f64>,
    b: ArrayView1<f64>,
) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).powi(2))
        .sum()
}
