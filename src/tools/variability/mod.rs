//! Sequence variability of a split, scored from the pileup columns
//! overlapping it.
//!
//! Each column deep enough to be trusted is profiled with
//! [`ColumnProfile::profile`]. Polymorphic columns become candidate sites; the
//! score of the split is the depth-weighted `n2n1ratio` of the best supported
//! candidates, and a representative sequence is rebuilt from the consensus
//! bases of the profiled columns.

use std::collections::BTreeMap;

use itertools::Itertools;
use log::trace;
use serde::{
    Deserialize,
    Serialize,
};

use crate::data_structs::column_profile::{
    ColumnProfile,
    VariabilityTest,
};
use crate::data_structs::typedef::{
    DepthType,
    PosType,
    RatioType,
};
use crate::io::pileup::PileupColumn;

/// Candidates kept after ranking by `n2n1ratio`.
const TOP_BY_RATIO: usize = 50;
/// Candidates kept after re-ranking the survivors by depth.
const TOP_BY_DEPTH: usize = 25;

/// Variability summary of a single split.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Auxiliary {
    /// Consensus bases, `N` where no variable column was profiled.
    rep_seq:               String,
    /// Per-position `n2n1ratio`, zero where no variable column was profiled.
    v:                     Vec<RatioType>,
    /// Split-relative position -> distinct bases observed there.
    competing_nucleotides: BTreeMap<PosType, String>,
    variability_score:     f64,
}

impl Auxiliary {
    pub fn rep_seq(&self) -> &str {
        &self.rep_seq
    }

    pub fn v(&self) -> &[RatioType] {
        &self.v
    }

    pub fn competing_nucleotides(&self) -> &BTreeMap<PosType, String> {
        &self.competing_nucleotides
    }

    pub fn variability_score(&self) -> f64 {
        self.variability_score
    }
}

/// Scores the pileup over a half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy)]
pub struct AuxiliaryScorer<'a> {
    min_coverage: DepthType,
    test:         Option<&'a VariabilityTest>,
}

impl<'a> AuxiliaryScorer<'a> {
    /// `test` is `None` for full reporting: every polymorphic column passing
    /// the depth filter counts as variable.
    pub fn new(
        min_coverage: DepthType,
        test: Option<&'a VariabilityTest>,
    ) -> Self {
        Self { min_coverage, test }
    }

    /// Profiles `columns` inside `[start, end)` and aggregates them.
    ///
    /// Returns the summary together with the variable column profiles keyed
    /// by absolute position. The representative sequence always has
    /// `end - start` characters.
    pub fn run(
        &self,
        columns: &[PileupColumn],
        start: PosType,
        end: PosType,
    ) -> (Auxiliary, BTreeMap<PosType, ColumnProfile>) {
        let mut profiles = BTreeMap::new();
        let mut candidates: Vec<(RatioType, DepthType)> = Vec::new();

        for column in columns {
            if column.pos() < start || column.pos() >= end {
                continue;
            }
            if column.depth() < self.min_coverage || column.bases().is_empty() {
                continue;
            }
            let profile = ColumnProfile::profile(
                column.bases(),
                column.depth(),
                column.pos() - start,
                self.test,
            );
            if profile.is_variable() {
                candidates.push((profile.n2n1ratio(), profile.coverage()));
                profiles.insert(column.pos(), profile);
            }
        }

        let variability_score = Self::score(candidates);

        let length = end.saturating_sub(start) as usize;
        let mut auxiliary = Auxiliary {
            rep_seq: String::with_capacity(length),
            v: Vec::with_capacity(length),
            competing_nucleotides: BTreeMap::new(),
            variability_score,
        };
        for pos in start..end {
            match profiles.get(&pos) {
                Some(profile) => {
                    auxiliary.rep_seq.push(profile.consensus());
                    auxiliary.v.push(profile.n2n1ratio());
                    auxiliary.competing_nucleotides.insert(
                        profile.pos(),
                        profile.competing_nts().to_string(),
                    );
                },
                None => {
                    auxiliary.rep_seq.push('N');
                    auxiliary.v.push(0.0);
                },
            }
        }
        trace!(
            "Scored [{}, {}): {} variable columns, score {:.3}",
            start,
            end,
            profiles.len(),
            auxiliary.variability_score
        );
        (auxiliary, profiles)
    }

    /// Top candidates by ratio, then the best supported of those by depth,
    /// summed as `depth × n2n1ratio`.
    fn score(candidates: Vec<(RatioType, DepthType)>) -> f64 {
        candidates
            .into_iter()
            .sorted_by(|a, b| {
                b.0.total_cmp(&a.0)
                    .then_with(|| b.1.cmp(&a.1))
            })
            .take(TOP_BY_RATIO)
            .sorted_by(|a, b| {
                b.1.cmp(&a.1)
                    .then_with(|| b.0.total_cmp(&a.0))
            })
            .take(TOP_BY_DEPTH)
            .map(|(ratio, depth)| depth as f64 * ratio)
            .sum()
    }
}
