use anyhow::{
    ensure,
    Result,
};
use indexmap::IndexMap;
use itertools::Itertools;
use serde::{
    Deserialize,
    Serialize,
};

use super::typedef::{
    DepthType,
    PosType,
    RatioType,
};

/// Decides whether the observed `n2n1ratio` of a column is large enough,
/// given the column depth, to call the column variable.
///
/// The minimum acceptable ratio decays with depth:
/// `min_ratio(d) = (1/b)^(d^(1/b) - m) + c`. Thin columns need a strong
/// second base, deep columns only have to exceed `c`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct VariabilityTest {
    pub b: f64,
    pub m: f64,
    pub c: f64,
}

impl Default for VariabilityTest {
    fn default() -> Self {
        Self {
            b: 2.0,
            m: 1.45,
            c: 0.05,
        }
    }
}

impl VariabilityTest {
    /// Fails unless `b` is a positive finite number and `m`, `c` are finite.
    pub fn new(
        b: f64,
        m: f64,
        c: f64,
    ) -> Result<Self> {
        ensure!(
            b > 0.0 && b.is_finite(),
            "Base of the decay must be positive, got {}",
            b
        );
        ensure!(
            m.is_finite() && c.is_finite(),
            "Decay offsets must be finite, got m = {}, c = {}",
            m,
            c
        );
        Ok(Self { b, m, c })
    }

    /// Minimum `n2n1ratio` a column of this depth needs to be variable.
    pub fn min_acceptable_ratio(
        &self,
        depth: DepthType,
    ) -> RatioType {
        let exponent = (depth as f64).powf(1.0 / self.b) - self.m;
        (1.0 / self.b).powf(exponent) + self.c
    }

    pub fn passes(
        &self,
        n2n1ratio: RatioType,
        depth: DepthType,
    ) -> bool {
        n2n1ratio >= self.min_acceptable_ratio(depth)
    }
}

/// Nucleotide profile of a single pileup column.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ColumnProfile {
    /// Position relative to the start of the split.
    pos:           PosType,
    coverage:      DepthType,
    consensus:     char,
    n2n1ratio:     RatioType,
    /// Distinct bases observed in the column, sorted.
    competing_nts: String,
}

impl ColumnProfile {
    /// Profiles the bases observed at one column.
    ///
    /// The consensus is the most frequent base, ties going to the base seen
    /// first. `n2n1ratio` is zero when the column holds a single distinct
    /// base, or when `test` is given and rejects the observed ratio.
    ///
    /// # Panics
    ///
    /// If `bases` is empty. Callers only profile columns that passed the
    /// minimum depth filter.
    pub fn profile(
        bases: &[u8],
        coverage: DepthType,
        pos: PosType,
        test: Option<&VariabilityTest>,
    ) -> Self {
        assert!(!bases.is_empty(), "Cannot profile an empty column");

        let mut counts: IndexMap<u8, usize> = IndexMap::new();
        for base in bases {
            *counts
                .entry(base.to_ascii_uppercase())
                .or_insert(0) += 1;
        }
        // Stable sort keeps first-seen order among equal counts
        let ranked = counts
            .iter()
            .map(|(base, count)| (*base, *count))
            .sorted_by(|a, b| b.1.cmp(&a.1))
            .collect_vec();

        let (consensus, n1) = ranked[0];
        let mut n2n1ratio = match ranked.get(1) {
            Some((_, n2)) => *n2 as RatioType / n1 as RatioType,
            None => 0.0,
        };
        if let Some(test) = test {
            if n2n1ratio > 0.0 && !test.passes(n2n1ratio, coverage) {
                n2n1ratio = 0.0;
            }
        }

        let competing_nts = counts
            .keys()
            .sorted()
            .map(|base| *base as char)
            .collect::<String>();

        Self {
            pos,
            coverage,
            consensus: consensus as char,
            n2n1ratio,
            competing_nts,
        }
    }

    pub fn pos(&self) -> PosType {
        self.pos
    }

    pub fn coverage(&self) -> DepthType {
        self.coverage
    }

    pub fn consensus(&self) -> char {
        self.consensus
    }

    pub fn n2n1ratio(&self) -> RatioType {
        self.n2n1ratio
    }

    pub fn competing_nts(&self) -> &str {
        &self.competing_nts
    }

    /// Whether the column is polymorphic and reported as such.
    pub fn is_variable(&self) -> bool {
        self.n2n1ratio > 0.0
    }
}
