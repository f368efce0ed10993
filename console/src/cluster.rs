use std::fs::File;
use std::io::{
    BufReader,
    BufWriter,
};
use std::path::PathBuf;

use anyhow::Context;
use binsplorer::exports::rand::rngs::StdRng;
use binsplorer::exports::rand::SeedableRng;
use binsplorer::io::tables::{
    write_clusters_tsv,
    write_collection_json,
    ProfileTables,
};
use binsplorer::tools::binning::{
    Binner,
    BinningConfig,
};
use clap::Args;
use log::{
    info,
    warn,
};

use crate::utils::UtilsArgs;

#[derive(Args, Debug, Clone)]
pub(crate) struct ClusterArgs {
    #[arg(
        short = 'c',
        long,
        required = true,
        help = "TAB-delimited table of mean coverage: a contig column followed by \
                one column per sample."
    )]
    coverages: PathBuf,
    #[arg(
        short = 'k',
        long,
        required = true,
        help = "TAB-delimited table of k-mer counts: a contig column followed by \
                one column per k-mer."
    )]
    kmers:     PathBuf,
    #[arg(
        short = 'o',
        long,
        required = true,
        help = "Path of the contig/cluster_bin report."
    )]
    output:    PathBuf,
    #[arg(
        long,
        required = false,
        help = "Also write the bin collection with group colors as JSON."
    )]
    collection: Option<PathBuf>,
    #[arg(
        long,
        default_value_t = false,
        help = "Treat the profile as merged even when the coverage table has a \
                single sample."
    )]
    merged:    bool,

    #[arg(
        short = 'n',
        long,
        default_value_t = 80,
        help_heading = "BINNING ARGS",
        help = "Maximum number of bins."
    )]
    n_clusters: usize,
    #[arg(
        long,
        default_value_t = 4,
        help_heading = "BINNING ARGS",
        help = "Length of the k-mers in the composition table."
    )]
    kmer_length: usize,
    #[arg(
        long,
        default_value_t = 100.0,
        help_heading = "BINNING ARGS",
        help = "Read length used to scale the coverage pseudocount."
    )]
    read_length: f64,
    #[arg(
        long,
        default_value_t = false,
        help_heading = "BINNING ARGS",
        help = "Skip per-contig coverage normalization."
    )]
    no_contig_norm: bool,
    #[arg(
        long,
        default_value_t = 0.90,
        help_heading = "BINNING ARGS",
        help = "Fraction of variance the principal components have to explain."
    )]
    variance_fraction: f64,
    #[arg(
        long,
        default_value_t = 500,
        help_heading = "BINNING ARGS",
        help = "Maximum EM iterations of the mixture fit."
    )]
    max_iter: usize,
    #[arg(
        long,
        help_heading = "BINNING ARGS",
        help = "Seed of the mixture initialisation. Random when omitted."
    )]
    seed: Option<u64>,
}

impl ClusterArgs {
    fn config(&self) -> BinningConfig {
        BinningConfig::default()
            .with_n_clusters(self.n_clusters)
            .with_kmer_length(self.kmer_length)
            .with_read_length(self.read_length)
            .with_normalise_by_contig(!self.no_contig_norm)
            .with_variance_fraction(self.variance_fraction)
            .with_max_iter(self.max_iter)
            .with_seed(self.seed)
    }

    pub fn run(
        &self,
        _utils: &UtilsArgs,
    ) -> anyhow::Result<()> {
        let open = |path: &PathBuf| {
            File::open(path)
                .map(BufReader::new)
                .with_context(|| format!("Failed to open {}", path.display()))
        };
        let mut tables = ProfileTables::from_readers(
            true,
            open(&self.coverages)?,
            open(&self.kmers)?,
        )?;

        let n_samples = tables
            .coverages()
            .first()
            .map(|(_, row)| row.len())
            .unwrap_or(0);
        if n_samples < 2 && !self.merged {
            warn!(
                "Coverage table has {} sample(s), the profile is not merged",
                n_samples
            );
            tables = ProfileTables::new(
                false,
                tables.coverages().clone(),
                tables.kmers().clone(),
            );
        }

        let binner = Binner::new(self.config());
        let assignment = binner.cluster(&tables)?;

        let output = File::create(&self.output)
            .with_context(|| format!("Failed to create {}", self.output.display()))?;
        write_clusters_tsv(&assignment, BufWriter::new(output))?;
        info!("Wrote clusters to {}", self.output.display());

        if let Some(path) = &self.collection {
            let mut rng = match self.seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            };
            let collection = assignment.to_collection(env!("CARGO_PKG_NAME"), &mut rng);
            let file = File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            write_collection_json(&collection, BufWriter::new(file))?;
            info!(
                "Wrote collection of {} bins to {}",
                collection.data().len(),
                path.display()
            );
        }
        Ok(())
    }
}
