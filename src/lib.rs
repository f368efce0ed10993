//! # binsplorer
//!
//! `binsplorer` is a Rust library and command-line tool for the unsupervised
//! binning of metagenomic contigs and for profiling the sequence variability
//! of contig splits from read pileups.
//!
//! If you do not want to use binsplorer as a crate, check out the
//! `binsplorer` command-line tool in the `console` workspace member.
//!
//! ## Key Features
//!
//! * **Contig model**: contigs divided into fixed-size splits ([`Split`]),
//!   owned by a [`ContigSet`] and addressed by [`ContigId`], each carrying
//!   [`Coverage`] statistics and exporting flat [`Metadata`] records.
//! * **Variability profiling**: pileup columns are profiled
//!   ([`ColumnProfile`]), filtered with a depth-dependent [`VariabilityTest`]
//!   and summarised per split into an [`Auxiliary`] record with a
//!   representative sequence and a variability score.
//! * **Binning**: tetranucleotide composition and multi-sample coverage are
//!   turned into features, reduced with PCA and clustered with a Gaussian
//!   mixture ([`Binner`]).
//! * **Parallel Processing**: contigs are profiled in parallel on a rayon
//!   pool.
//!
//! Number of threads to be used can be configured with setting
//! `BINSPLORER_NUM_THREADS` environment variable.
//!
//! ## Structure
//!
//! * [`data_structs`]: contigs, splits, coverage and column profiles.
//! * [`io`]: pileup sources, TAB-delimited tables and cluster reports.
//! * [`tools`]: binning and variability scoring.
//! * [`utils`]: the shared thread pool, helper macros and statistics.
//!
//! ## Usage
//!
//! ### Clustering contigs of a merged profile
//!
//! ```no_run
//! use std::fs::File;
//! use binsplorer::prelude::*;
//!
//! fn main() -> anyhow::Result<()> {
//!     let tables = ProfileTables::from_readers(
//!         true,
//!         File::open("coverages.tsv")?,
//!         File::open("kmers.tsv")?,
//!     )?;
//!     let binner = Binner::new(BinningConfig::default().with_seed(Some(42)));
//!     let assignment = binner.cluster(&tables)?;
//!     write_clusters_tsv(&assignment, File::create("clusters.tsv")?)?;
//!     Ok(())
//! }
//! ```
//!
//! ### Profiling the splits of a contig
//!
//! ```
//! use binsplorer::prelude::*;
//!
//! let mut pileup = MemoryPileup::new();
//! for pos in 0..30 {
//!     pileup.insert("contig_1", PileupColumn::new(pos, b"AAAAAAAAAAAAAAAACCCC".to_vec()));
//! }
//!
//! let mut set = ContigSet::new();
//! let id = set.add_contig("contig_1", 30);
//! set.get_mut(id).unwrap().split_evenly(10).unwrap();
//!
//! let config = ProfileConfig::default();
//! set.analyze_coverage(&pileup, &config).unwrap();
//! set.analyze_auxiliary(&pileup, &config, &VariabilityTest::default()).unwrap();
//! assert_eq!(set.get(id).unwrap().splits().len(), 3);
//! ```

pub mod data_structs;
pub mod exports;
pub mod io;
pub mod prelude;
pub mod tools;
pub mod utils;

pub use data_structs::{
    ColumnProfile,
    Contig,
    ContigId,
    ContigSet,
    Coverage,
    Metadata,
    Split,
    VariabilityTest,
};
pub use tools::binning::Binner;
pub use tools::variability::Auxiliary;
