//! Input and output.
//!
//! - [`pileup`]: per-position base pileups and the [`PileupSource`] trait the
//!   profiling code reads them through.
//! - [`tables`]: TAB-delimited coverage and k-mer tables, and the cluster
//!   reports written after binning.
pub mod pileup;
pub mod tables;

pub use pileup::{
    MemoryPileup,
    PileupColumn,
    PileupSource,
};
pub use tables::{
    write_clusters_tsv,
    write_collection_json,
    ProfileTables,
};
