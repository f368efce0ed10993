//! Core data structures of a metagenomic profile.
//!
//! - [`contig`]: contigs, the splits they are divided into and the
//!   [`ContigSet`] owning them, together with their exported [`Metadata`].
//! - [`Coverage`]: depth statistics of a contig or a split.
//! - [`column_profile`]: base composition of a single pileup column and the
//!   [`VariabilityTest`] deciding whether it is truly polymorphic.
//! - [`typedef`]: type aliases for positions, depths, ratios and counts.
pub mod column_profile;
pub mod contig;
mod coverage;
pub mod typedef;

pub use column_profile::{
    ColumnProfile,
    VariabilityTest,
};
pub use contig::{
    gen_split_name,
    set_contigs_abundance,
    Contig,
    ContigId,
    ContigSet,
    Metadata,
    ProfileConfig,
    Split,
};
pub use coverage::Coverage;
