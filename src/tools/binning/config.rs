use serde::{
    Deserialize,
    Serialize,
};

use crate::with_field_fn;

/// Parameters of contig binning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BinningConfig {
    /// Maximum number of bins.
    pub n_clusters:          usize,
    /// Length of the k-mers in the composition table.
    pub kmer_length:         usize,
    /// Read length used to scale the coverage pseudocount.
    pub read_length:         f64,
    /// Also normalize coverage per contig and append the magnitude column.
    pub normalise_by_contig: bool,
    /// Fraction of variance the reduced feature space has to retain.
    pub variance_fraction:   f64,
    /// Seed of the mixture initialisation; entropy when `None`.
    pub seed:                Option<u64>,
    /// Maximum EM iterations of the mixture fit.
    pub max_iter:            usize,
    /// Relative log-likelihood change that stops the mixture fit.
    pub tolerance:           f64,
}

impl BinningConfig {
    with_field_fn!(n_clusters, usize);
    with_field_fn!(kmer_length, usize);
    with_field_fn!(read_length, f64);
    with_field_fn!(normalise_by_contig, bool);
    with_field_fn!(variance_fraction, f64);
    with_field_fn!(seed, Option<u64>);
    with_field_fn!(max_iter, usize);
    with_field_fn!(tolerance, f64);

    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(self.n_clusters > 0, "Number of clusters must be positive");
        anyhow::ensure!(self.kmer_length > 0, "K-mer length must be positive");
        anyhow::ensure!(
            self.read_length > 0.0 && self.read_length.is_finite(),
            "Read length must be positive, got {}",
            self.read_length
        );
        anyhow::ensure!(
            self.variance_fraction > 0.0 && self.variance_fraction <= 1.0,
            "Variance fraction must be in (0, 1], got {}",
            self.variance_fraction
        );
        anyhow::ensure!(self.max_iter > 0, "Maximum iterations must be positive");
        Ok(())
    }
}

impl Default for BinningConfig {
    fn default() -> Self {
        Self {
            n_clusters:          80,
            kmer_length:         4,
            read_length:         100.0,
            normalise_by_contig: true,
            variance_fraction:   0.90,
            seed:                None,
            max_iter:            500,
            tolerance:           1e-6,
        }
    }
}
