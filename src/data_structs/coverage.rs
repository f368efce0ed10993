use anyhow::{
    ensure,
    Result,
};
use serde::{
    Deserialize,
    Serialize,
};

use super::typedef::DepthType;
use crate::utils::depth_summary;

/// Per-base depth of a sequence together with its summary statistics.
///
/// The statistics are only meaningful after [`Coverage::process`] was called.
/// `normalized` is the mean depth divided by a reference mean supplied by the
/// caller, usually the run-wide mean depth.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Coverage {
    #[serde(skip)]
    c:               Vec<DepthType>,
    mean:            f64,
    std:             f64,
    normalized:      f64,
    portion_covered: f64,
}

impl Coverage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `depths` and computes mean, standard deviation, normalized
    /// coverage and the fraction of positions with depth > 0.
    ///
    /// Fails on an empty depth sequence or a non-positive reference mean.
    pub fn process(
        &mut self,
        depths: Vec<DepthType>,
        reference_mean: f64,
    ) -> Result<()> {
        check_reference(reference_mean)?;
        let summary = match depth_summary(&depths) {
            Some(summary) => summary,
            None => anyhow::bail!("Cannot summarize an empty depth sequence"),
        };

        self.mean = summary.mean;
        self.std = summary.std;
        self.portion_covered = summary.portion_covered;
        self.normalized = summary.mean / reference_mean;
        self.c = depths;
        Ok(())
    }

    /// Recomputes `normalized` against another reference mean, e.g. the
    /// run-wide mean coverage known only after every contig is processed.
    pub fn renormalize(
        &mut self,
        reference_mean: f64,
    ) -> Result<()> {
        check_reference(reference_mean)?;
        self.normalized = self.mean / reference_mean;
        Ok(())
    }

    pub fn depths(&self) -> &[DepthType] {
        &self.c
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    pub fn std(&self) -> f64 {
        self.std
    }

    pub fn normalized(&self) -> f64 {
        self.normalized
    }

    pub fn portion_covered(&self) -> f64 {
        self.portion_covered
    }

    pub fn len(&self) -> usize {
        self.c.len()
    }

    pub fn is_empty(&self) -> bool {
        self.c.is_empty()
    }
}

fn check_reference(reference_mean: f64) -> Result<()> {
    ensure!(
        reference_mean > 0.0 && reference_mean.is_finite(),
        "Reference mean coverage must be positive, got {}",
        reference_mean
    );
    Ok(())
}
