//! Feature matrices of contig binning.
//!
//! Composition: `ln` of pseudocounted k-mer frequencies per contig.
//! Coverage: pseudocounted mean coverage normalized per sample (and
//! optionally per contig, with the per-contig magnitude appended), then
//! `ln`. Both are laid out by a single [`FeatureSchema`] so that row `i`
//! always refers to the same contig.

use anyhow::{
    bail,
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
    concatenate,
    Array1,
    Array2,
    Axis,
};

use super::config::BinningConfig;
use crate::io::tables::{
    CoverageTable,
    KmerTable,
};

/// Row and column keys shared by every matrix of a binning run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureSchema {
    contigs: Vec<String>,
    samples: Vec<String>,
    kmers:   Vec<String>,
}

impl FeatureSchema {
    /// Derives the schema from the tables and checks that they agree.
    ///
    /// Contig order is the coverage table order. Sample and k-mer names are
    /// taken from the first row; every other row must have the same names.
    pub fn try_from_tables(
        coverages: &CoverageTable,
        kmers: &KmerTable,
    ) -> Result<Self> {
        let Some((_, first_coverage)) = coverages.first()
        else {
            bail!("Coverage table is empty");
        };
        let Some((_, first_kmers)) = kmers.first()
        else {
            bail!("K-mer table is empty");
        };

        let samples = first_coverage.keys().cloned().collect_vec();
        let kmer_names = first_kmers.keys().cloned().collect_vec();
        ensure!(!samples.is_empty(), "Coverage table has no samples");
        ensure!(!kmer_names.is_empty(), "K-mer table has no k-mers");

        ensure!(
            coverages.len() == kmers.len(),
            "Coverage table has {} contigs, k-mer table has {}",
            coverages.len(),
            kmers.len()
        );
        for (contig, row) in coverages.iter() {
            let Some(kmer_row) = kmers.get(contig)
            else {
                bail!("Contig {} has coverage but no k-mer counts", contig);
            };
            ensure!(
                row.len() == samples.len() && samples.iter().all(|s| row.contains_key(s)),
                "Samples of contig {} differ from the expected {:?}",
                contig,
                samples
            );
            ensure!(
                kmer_row.len() == kmer_names.len()
                    && kmer_names
                        .iter()
                        .all(|k| kmer_row.contains_key(k)),
                "K-mers of contig {} differ from the expected set",
                contig
            );
            for (sample, value) in row.iter() {
                ensure!(
                    value.is_finite() && *value >= 0.0,
                    "Coverage of contig {} in sample {} is {}",
                    contig,
                    sample,
                    value
                );
            }
        }

        Ok(Self {
            contigs: coverages.keys().cloned().collect_vec(),
            samples,
            kmers: kmer_names,
        })
    }

    pub fn contigs(&self) -> &[String] {
        &self.contigs
    }

    pub fn samples(&self) -> &[String] {
        &self.samples
    }

    pub fn kmers(&self) -> &[String] {
        &self.kmers
    }

    pub fn n_contigs(&self) -> usize {
        self.contigs.len()
    }

    /// Raw k-mer counts, `n_contigs × n_kmers`.
    fn kmer_array(
        &self,
        kmers: &KmerTable,
    ) -> Array2<f64> {
        Array2::from_shape_fn((self.contigs.len(), self.kmers.len()), |(i, j)| {
            kmers[&self.contigs[i]][&self.kmers[j]] as f64
        })
    }

    /// Raw mean coverages, `n_contigs × n_samples`.
    fn coverage_array(
        &self,
        coverages: &CoverageTable,
    ) -> Array2<f64> {
        Array2::from_shape_fn((self.contigs.len(), self.samples.len()), |(i, j)| {
            coverages[&self.contigs[i]][&self.samples[j]]
        })
    }
}

/// Composition and coverage features of every contig.
#[derive(Debug, Clone)]
pub struct FeatureMatrix {
    schema:      FeatureSchema,
    composition: Array2<f64>,
    coverage:    Array2<f64>,
    lengths:     Array1<f64>,
}

impl FeatureMatrix {
    /// Builds both feature blocks from the raw tables.
    pub fn build(
        coverages: &CoverageTable,
        kmers: &KmerTable,
        config: &BinningConfig,
    ) -> Result<Self> {
        config.validate()?;
        let schema = FeatureSchema::try_from_tables(coverages, kmers)?;

        let expected_k = config.kmer_length;
        if let Some(odd) = schema
            .kmers
            .iter()
            .find(|k| k.len() != expected_k)
        {
            warn!(
                "K-mer {} does not have the configured length {}",
                odd, expected_k
            );
        }

        let (composition, lengths) =
            composition_features(schema.kmer_array(kmers), config.kmer_length)?;
        let coverage = coverage_features(
            schema.coverage_array(coverages),
            &lengths,
            config.read_length,
            config.normalise_by_contig,
        )?;
        info!(
            "Built features of {} contigs: {} composition and {} coverage columns",
            schema.n_contigs(),
            composition.ncols(),
            coverage.ncols()
        );

        Ok(Self {
            schema,
            composition,
            coverage,
            lengths,
        })
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn composition(&self) -> &Array2<f64> {
        &self.composition
    }

    pub fn coverage(&self) -> &Array2<f64> {
        &self.coverage
    }

    /// Contig lengths implied by the k-mer counts.
    pub fn lengths(&self) -> &Array1<f64> {
        &self.lengths
    }

    /// Composition and coverage columns side by side.
    pub fn joint(&self) -> Result<Array2<f64>> {
        Ok(concatenate(
            Axis(1),
            &[self.composition.view(), self.coverage.view()],
        )?)
    }
}

/// Log-frequency composition matrix and the implied contig lengths.
///
/// Lengths are computed from the raw counts, `Σ counts + k - 1`.
pub fn composition_features(
    kmer_counts: Array2<f64>,
    kmer_length: usize,
) -> Result<(Array2<f64>, Array1<f64>)> {
    let lengths = kmer_counts.sum_axis(Axis(1)) + (kmer_length as f64 - 1.0);

    let pseudocounted = kmer_counts + 1.0;
    let row_sums = pseudocounted.sum_axis(Axis(1));
    let frequencies = pseudocounted / &row_sums.insert_axis(Axis(1));

    Ok((checked_ln(frequencies, "k-mer frequencies")?, lengths))
}

/// Log-normalized coverage matrix.
///
/// Every entry gets `read_length / length` of its contig added, then each
/// column is divided by its sum. With `normalise_by_contig` each row is then
/// divided by its sum and that sum is appended as an extra column.
pub fn coverage_features(
    coverage: Array2<f64>,
    lengths: &Array1<f64>,
    read_length: f64,
    normalise_by_contig: bool,
) -> Result<Array2<f64>> {
    ensure!(
        coverage.nrows() == lengths.len(),
        "Coverage has {} rows but {} lengths were given",
        coverage.nrows(),
        lengths.len()
    );
    if let Some(length) = lengths.iter().find(|l| **l <= 0.0) {
        bail!("Contig length must be positive, got {}", length);
    }

    let pseudocounts = lengths.mapv(|length| read_length / length);
    let coverage = coverage + &pseudocounts.insert_axis(Axis(1));

    let col_sums = coverage.sum_axis(Axis(0));
    let mut coverage = coverage / &col_sums.insert_axis(Axis(0));

    if normalise_by_contig {
        let row_sums = coverage.sum_axis(Axis(1));
        let normalized = coverage / &row_sums.view().insert_axis(Axis(1));
        coverage = concatenate(
            Axis(1),
            &[normalized.view(), row_sums.view().insert_axis(Axis(1))],
        )?;
        debug!("Appended per-contig coverage magnitude column");
    }

    checked_ln(coverage, "normalized coverage")
}

/// Natural log of a matrix that must be strictly positive.
fn checked_ln(
    matrix: Array2<f64>,
    what: &str,
) -> Result<Array2<f64>> {
    if let Some(value) = matrix
        .iter()
        .find(|v| !(v.is_finite() && **v > 0.0))
    {
        bail!("Cannot take the log of {}: found {}", what, value);
    }
    Ok(matrix.mapv_into(f64::ln))
}
