//! Unsupervised binning of contigs (or splits) into putative genomes.
//!
//! Contigs are described by their tetranucleotide composition and by their
//! coverage across samples ([`features`]). The joint feature matrix is
//! projected onto its principal components ([`Pca`]) and the projection is
//! clustered with a Gaussian mixture ([`GaussianMixture`]). The resulting
//! labels are reported as a [`ClusterAssignment`].
//!
//! Both numerical stages sit behind small traits ([`Reducer`] and
//! [`Assigner`]), so [`Binner`] can be used with other implementations.
mod assign;
mod config;
pub mod features;
mod gmm;
mod pca;

pub use assign::{
    group_label,
    random_color,
    BinCollection,
    ClusterAssignment,
};
pub use config::BinningConfig;
pub use features::{
    FeatureMatrix,
    FeatureSchema,
};
pub use gmm::{
    FittedMixture,
    GaussianMixture,
};
pub use pca::Pca;

use anyhow::{
    bail,
    ensure,
    Result,
};
use itertools::Itertools;
use log::info;
use ndarray::{
    Array2,
    ArrayView2,
};

use crate::io::tables::ProfileTables;

/// Projects a feature matrix onto fewer dimensions, keeping rows.
pub trait Reducer {
    fn reduce(
        &self,
        matrix: ArrayView2<f64>,
        variance_fraction: f64,
    ) -> Result<Array2<f64>>;
}

/// Assigns every row of a matrix to one of at most `n_clusters` groups.
pub trait Assigner {
    fn assign(
        &self,
        matrix: ArrayView2<f64>,
        n_clusters: usize,
    ) -> Result<Vec<usize>>;
}

/// Feature extraction, reduction and clustering of a profile.
#[derive(Debug, Clone)]
pub struct Binner<R = Pca, A = GaussianMixture>
where
    R: Reducer,
    A: Assigner, {
    config:   BinningConfig,
    reducer:  R,
    assigner: A,
}

impl Binner {
    /// Default pipeline: PCA followed by a Gaussian mixture.
    pub fn new(config: BinningConfig) -> Self {
        let assigner = GaussianMixture::from_config(&config);
        Self {
            config,
            reducer: Pca::default(),
            assigner,
        }
    }
}

impl<R, A> Binner<R, A>
where
    R: Reducer,
    A: Assigner,
{
    pub fn with_primitives(
        config: BinningConfig,
        reducer: R,
        assigner: A,
    ) -> Self {
        Self {
            config,
            reducer,
            assigner,
        }
    }

    pub fn config(&self) -> &BinningConfig {
        &self.config
    }

    /// Builds the feature matrix of a profile.
    ///
    /// Fails when the profile is not merged or the tables disagree.
    pub fn prepare(
        &self,
        tables: &ProfileTables,
    ) -> Result<FeatureMatrix> {
        if !tables.merged() {
            bail!("Clustering requires a merged profile");
        }
        FeatureMatrix::build(tables.coverages(), tables.kmers(), &self.config)
    }

    /// Runs the whole pipeline and maps the labels back to contig names.
    pub fn cluster(
        &self,
        tables: &ProfileTables,
    ) -> Result<ClusterAssignment> {
        let features = self.prepare(tables)?;
        let joint = features.joint()?;
        let n_rows = joint.nrows();

        let reduced = self
            .reducer
            .reduce(joint.view(), self.config.variance_fraction)?;
        ensure!(
            reduced.nrows() == n_rows,
            "Reduction changed the number of rows from {} to {}",
            n_rows,
            reduced.nrows()
        );

        let labels = self
            .assigner
            .assign(reduced.view(), self.config.n_clusters)?;
        ensure!(
            labels.len() == n_rows,
            "Got {} labels for {} contigs",
            labels.len(),
            n_rows
        );
        let n_groups = labels.iter().unique().count();
        ensure!(
            n_groups <= self.config.n_clusters,
            "Got {} groups, at most {} allowed",
            n_groups,
            self.config.n_clusters
        );

        let assignment = ClusterAssignment::from_labels(features.schema().contigs(), &labels)?;
        info!(
            "Binned {} contigs into {} groups",
            assignment.len(),
            n_groups
        );
        Ok(assignment)
    }
}
