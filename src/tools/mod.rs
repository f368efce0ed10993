//! Analyses built on top of the core data structures.
//!
//! - [`binning`]: groups contigs into bins from their composition and
//!   coverage, using PCA followed by a Gaussian mixture.
//! - [`variability`]: scores the sequence variability of splits from their
//!   pileup columns and rebuilds a representative sequence.
pub mod binning;
pub mod variability;
