use itertools::Itertools;
use log::debug;
use num::ToPrimitive;
use statrs::statistics::Statistics;

/// Summary of a depth vector: mean, population standard deviation and the
/// fraction of positions with non-zero depth.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthSummary {
    pub mean:            f64,
    pub std:             f64,
    pub portion_covered: f64,
}

/// Computes [`DepthSummary`] for a slice of per-base depths.
///
/// Returns `None` for an empty slice.
pub fn depth_summary<N: ToPrimitive + Copy>(depths: &[N]) -> Option<DepthSummary> {
    if depths.is_empty() {
        return None;
    }
    let values = depths
        .iter()
        .map(|d| d.to_f64().unwrap_or(0.0))
        .collect_vec();
    let covered = values.iter().filter(|d| **d > 0.0).count();

    let summary = DepthSummary {
        mean:            values.iter().mean(),
        std:             values.iter().population_std_dev(),
        portion_covered: covered as f64 / values.len() as f64,
    };
    debug!(
        "Depth summary over {} positions: mean={:.3}, std={:.3}, covered={:.3}",
        values.len(),
        summary.mean,
        summary.std,
        summary.portion_covered
    );
    Some(summary)
}

/// Length-weighted mean: `Σ(value_i × weight_i) / Σ(weight_i)`.
///
/// Returns `None` when the total weight is not positive.
pub fn weighted_mean<I>(pairs: I) -> Option<f64>
where
    I: IntoIterator<Item = (f64, f64)>, {
    let (numerator, denominator) = pairs
        .into_iter()
        .fold((0.0, 0.0), |(num, den), (value, weight)| {
            (num + value * weight, den + weight)
        });
    if denominator > 0.0 {
        Some(numerator / denominator)
    }
    else {
        None
    }
}
