use std::collections::BTreeMap;

use anyhow::{
    ensure,
    Result,
};
use itertools::Itertools;
use log::{
    debug,
    info,
};
use rayon::prelude::*;
use serde::{
    Deserialize,
    Serialize,
};

use super::column_profile::{
    ColumnProfile,
    VariabilityTest,
};
use super::coverage::Coverage;
use super::typedef::{
    DepthType,
    PosType,
};
use crate::io::pileup::{
    interval_depths,
    PileupColumn,
    PileupSource,
};
use crate::tools::variability::{
    Auxiliary,
    AuxiliaryScorer,
};
use crate::utils::{
    weighted_mean,
    THREAD_POOL,
};
use crate::with_field_fn;

/// Settings of coverage and variability profiling.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProfileConfig {
    /// Columns shallower than this are never profiled.
    pub min_coverage_for_variability: DepthType,
    /// Report every polymorphic column, skipping the significance test.
    pub report_variability_full:      bool,
    /// Mean depth the `normalized` coverage values are relative to.
    pub reference_mean:               f64,
}

impl ProfileConfig {
    with_field_fn!(min_coverage_for_variability, DepthType);
    with_field_fn!(report_variability_full, bool);
    with_field_fn!(reference_mean, f64);
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            min_coverage_for_variability: 10,
            report_variability_full:      false,
            reference_mean:               1.0,
        }
    }
}

/// `parent_split_00001` style name of the split with 0-based `order`.
pub fn gen_split_name(
    parent_name: &str,
    order: usize,
) -> String {
    format!("{}_split_{:05}", parent_name, order + 1)
}

/// Index of a [`Contig`] inside its [`ContigSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContigId(pub usize);

/// Flat statistics of a contig or split, as handed to reporting.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Metadata {
    pub std_coverage:         f64,
    pub mean_coverage:        f64,
    pub normalized_coverage:  f64,
    pub max_normalized_ratio: f64,
    pub relative_abundance:   f64,
    pub portion_covered:      f64,
    pub abundance:            f64,
    pub variability:          f64,
    #[serde(rename = "__parent__")]
    pub parent:               Option<String>,
}

impl Metadata {
    fn new(
        coverage: &Coverage,
        abundance: f64,
        variability: f64,
        parent: Option<String>,
    ) -> Self {
        Self {
            std_coverage: coverage.std(),
            mean_coverage: coverage.mean(),
            normalized_coverage: coverage.normalized(),
            max_normalized_ratio: 1.0,
            relative_abundance: 1.0,
            portion_covered: coverage.portion_covered(),
            abundance,
            variability,
            parent,
        }
    }
}

/// Half-open sub-interval of a contig; the unit of binning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Split {
    name:            String,
    /// Lookup key of the owning contig. Never used to keep it alive.
    parent:          ContigId,
    order:           usize,
    start:           PosType,
    end:             PosType,
    explicit_length: Option<PosType>,
    abundance:       f64,
    coverage:        Coverage,
    column_profiles: BTreeMap<PosType, ColumnProfile>,
    auxiliary:       Option<Auxiliary>,
}

impl Split {
    crate::getter_fn!(name, String);
    crate::getter_fn!(coverage, Coverage);
    crate::getter_fn!(column_profiles, BTreeMap<PosType, ColumnProfile>);

    pub fn parent(&self) -> ContigId {
        self.parent
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn start(&self) -> PosType {
        self.start
    }

    pub fn end(&self) -> PosType {
        self.end
    }

    /// Explicit length if one was set, interval length otherwise.
    pub fn length(&self) -> PosType {
        self.explicit_length
            .unwrap_or(self.end - self.start)
    }

    pub fn set_explicit_length(
        &mut self,
        length: PosType,
    ) {
        self.explicit_length = Some(length);
    }

    pub fn abundance(&self) -> f64 {
        self.abundance
    }

    pub fn auxiliary(&self) -> Option<&Auxiliary> {
        self.auxiliary.as_ref()
    }

    pub fn variability_score(&self) -> f64 {
        self.auxiliary
            .as_ref()
            .map(Auxiliary::variability_score)
            .unwrap_or(0.0)
    }

    /// Scores the pileup over this split and stores the result.
    pub fn analyze_auxiliary(
        &mut self,
        columns: &[PileupColumn],
        scorer: &AuxiliaryScorer,
    ) {
        let (auxiliary, profiles) = scorer.run(columns, self.start, self.end);
        self.column_profiles.extend(profiles);
        self.auxiliary = Some(auxiliary);
    }
}

/// Assembled sequence owning its splits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contig {
    id:        ContigId,
    name:      String,
    splits:    Vec<Split>,
    length:    PosType,
    abundance: f64,
    coverage:  Coverage,
}

impl Contig {
    crate::getter_fn!(name, String);
    crate::getter_fn!(coverage, Coverage);

    pub fn id(&self) -> ContigId {
        self.id
    }

    pub fn splits(&self) -> &[Split] {
        &self.splits
    }

    pub fn length(&self) -> PosType {
        self.length
    }

    pub fn abundance(&self) -> f64 {
        self.abundance
    }

    /// Appends a split covering `[start, end)` and returns its order.
    pub fn add_split(
        &mut self,
        start: PosType,
        end: PosType,
    ) -> Result<usize> {
        ensure!(
            start < end && end <= self.length,
            "Split [{}, {}) does not fit contig {} of length {}",
            start,
            end,
            self.name,
            self.length
        );
        let order = self.splits.len();
        self.splits.push(Split {
            name: gen_split_name(&self.name, order),
            parent: self.id,
            order,
            start,
            end,
            explicit_length: None,
            abundance: 0.0,
            coverage: Coverage::new(),
            column_profiles: BTreeMap::new(),
            auxiliary: None,
        });
        Ok(order)
    }

    /// Covers the whole contig with consecutive splits of `split_length`;
    /// the last one takes the remainder.
    pub fn split_evenly(
        &mut self,
        split_length: PosType,
    ) -> Result<()> {
        ensure!(split_length > 0, "Split length must be positive");
        let mut start = 0;
        while start < self.length {
            let end = (start + split_length).min(self.length);
            self.add_split(start, end)?;
            start = end;
        }
        Ok(())
    }

    /// Computes every split's coverage from the pileup, then the contig's
    /// coverage from the concatenation of all split depths in split order.
    pub fn analyze_coverage<P: PileupSource + ?Sized>(
        &mut self,
        source: &P,
        config: &ProfileConfig,
    ) -> Result<()> {
        let n_splits = self.splits.len();
        let mut contig_depths: Vec<DepthType> = Vec::new();
        for split in self.splits.iter_mut() {
            debug!("Coverage (split: {} of {})", split.order + 1, n_splits);
            let columns = source.pileup(&self.name, split.start, split.end)?;
            let depths = interval_depths(&columns, split.start, split.end);
            contig_depths.extend_from_slice(&depths);
            split
                .coverage
                .process(depths, config.reference_mean)?;
        }
        self.coverage
            .process(contig_depths, config.reference_mean)
    }

    /// Runs the variability scorer once per split.
    pub fn analyze_auxiliary<P: PileupSource + ?Sized>(
        &mut self,
        source: &P,
        config: &ProfileConfig,
        test: &VariabilityTest,
    ) -> Result<()> {
        let scorer = AuxiliaryScorer::new(
            config.min_coverage_for_variability,
            if config.report_variability_full {
                None
            }
            else {
                Some(test)
            },
        );
        let n_splits = self.splits.len();
        for split in self.splits.iter_mut() {
            debug!(
                "Auxiliary stats (split: {} of {}) CMC: {:.1} :: SMC: {:.1}",
                split.order + 1,
                n_splits,
                self.coverage.mean(),
                split.coverage.mean()
            );
            let columns = source.pileup(&self.name, split.start, split.end)?;
            split.analyze_auxiliary(&columns, &scorer);
        }
        Ok(())
    }

    /// Sum of the variability scores of all splits.
    pub fn variability(&self) -> f64 {
        self.splits
            .iter()
            .map(Split::variability_score)
            .sum()
    }

    pub fn metadata(&self) -> Metadata {
        Metadata::new(&self.coverage, self.abundance, self.variability(), None)
    }

    pub fn split_metadata(&self) -> Vec<(String, Metadata)> {
        self.splits
            .iter()
            .map(|split| {
                (
                    split.name.clone(),
                    Metadata::new(
                        &split.coverage,
                        split.abundance,
                        split.variability_score(),
                        Some(self.name.clone()),
                    ),
                )
            })
            .collect_vec()
    }
}

/// Arena of contigs. Splits refer back to their contig by [`ContigId`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContigSet {
    contigs: Vec<Contig>,
}

impl ContigSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_contig(
        &mut self,
        name: &str,
        length: PosType,
    ) -> ContigId {
        let id = ContigId(self.contigs.len());
        self.contigs.push(Contig {
            id,
            name: name.to_string(),
            splits: Vec::new(),
            length,
            abundance: 0.0,
            coverage: Coverage::new(),
        });
        id
    }

    pub fn get(
        &self,
        id: ContigId,
    ) -> Option<&Contig> {
        self.contigs.get(id.0)
    }

    pub fn get_mut(
        &mut self,
        id: ContigId,
    ) -> Option<&mut Contig> {
        self.contigs.get_mut(id.0)
    }

    /// Contig owning `split`.
    pub fn parent_of(
        &self,
        split: &Split,
    ) -> Option<&Contig> {
        self.get(split.parent)
    }

    pub fn contigs(&self) -> &[Contig] {
        &self.contigs
    }

    pub fn len(&self) -> usize {
        self.contigs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contigs.is_empty()
    }

    pub fn splits(&self) -> impl Iterator<Item = &Split> {
        self.contigs
            .iter()
            .flat_map(|c| c.splits.iter())
    }

    pub fn analyze_coverage<P: PileupSource + Sync + ?Sized>(
        &mut self,
        source: &P,
        config: &ProfileConfig,
    ) -> Result<()> {
        THREAD_POOL.install(|| {
            self.contigs
                .par_iter_mut()
                .try_for_each(|contig| contig.analyze_coverage(source, config))
        })
    }

    /// Scores every split of every contig. Contigs are independent and are
    /// processed in parallel.
    pub fn analyze_auxiliary<P: PileupSource + Sync + ?Sized>(
        &mut self,
        source: &P,
        config: &ProfileConfig,
        test: &VariabilityTest,
    ) -> Result<()> {
        THREAD_POOL.install(|| {
            self.contigs
                .par_iter_mut()
                .try_for_each(|contig| {
                    contig.analyze_auxiliary(source, config, test)
                })
        })?;
        info!(
            "Scored variability of {} splits in {} contigs",
            self.splits().count(),
            self.contigs.len()
        );
        Ok(())
    }

    /// See [`set_contigs_abundance`].
    pub fn set_abundance(&mut self) -> Result<f64> {
        set_contigs_abundance(&mut self.contigs)
    }

    /// Rescales the `normalized` coverage of every contig and split so it
    /// is relative to `reference_mean`.
    pub fn normalize_coverage(
        &mut self,
        reference_mean: f64,
    ) -> Result<()> {
        for contig in self.contigs.iter_mut() {
            contig.coverage.renormalize(reference_mean)?;
            for split in contig.splits.iter_mut() {
                split.coverage.renormalize(reference_mean)?;
            }
        }
        Ok(())
    }
}

/// Normalizes abundances by the length-weighted mean coverage
/// `M = Σ(mean_i × length_i) / Σ(length_i)` over `contigs`.
///
/// Every contig gets `mean_i / M`; every split gets its own mean coverage
/// divided by the same `M`. Returns `M`.
pub fn set_contigs_abundance(contigs: &mut [Contig]) -> Result<f64> {
    let overall_mean_coverage = weighted_mean(
        contigs
            .iter()
            .map(|c| (c.coverage.mean(), c.length as f64)),
    );
    let Some(overall_mean_coverage) = overall_mean_coverage
    else {
        anyhow::bail!("Total contig length must be positive");
    };
    ensure!(
        overall_mean_coverage > 0.0,
        "Overall mean coverage is zero, abundances are undefined"
    );

    for contig in contigs.iter_mut() {
        contig.abundance = contig.coverage.mean() / overall_mean_coverage;
        for split in contig.splits.iter_mut() {
            split.abundance = split.coverage.mean() / overall_mean_coverage;
        }
    }
    debug!(
        "Set abundances of {} contigs, overall mean coverage {:.3}",
        contigs.len(),
        overall_mean_coverage
    );
    Ok(overall_mean_coverage)
}

#[cfg(test)]
mod tests {
    use assert_approx_eq::assert_approx_eq;

    use super::*;
    use crate::io::pileup::MemoryPileup;

    fn uniform_pileup(
        contig: &str,
        length: PosType,
        bases: &str,
    ) -> MemoryPileup {
        let mut pileup = MemoryPileup::new();
        for pos in 0..length {
            pileup.insert(contig, PileupColumn::new(pos, bases.as_bytes().to_vec()));
        }
        pileup
    }

    #[test]
    fn test_gen_split_name() {
        assert_eq!(gen_split_name("contig_1", 0), "contig_1_split_00001");
        assert_eq!(gen_split_name("c", 41), "c_split_00042");
    }

    #[test]
    fn test_add_split() {
        let mut set = ContigSet::new();
        let id = set.add_contig("c1", 100);
        let contig = set.get_mut(id).unwrap();
        contig.add_split(0, 60).unwrap();
        contig.add_split(60, 100).unwrap();
        assert!(contig.add_split(90, 120).is_err());
        assert!(contig.add_split(50, 50).is_err());

        let split = &set.get(id).unwrap().splits()[1];
        assert_eq!(split.name(), "c1_split_00002");
        assert_eq!(split.length(), 40);
        assert_eq!(set.parent_of(split).unwrap().name(), "c1");
    }

    #[test]
    fn test_split_evenly() {
        let mut set = ContigSet::new();
        let id = set.add_contig("c1", 25);
        let contig = set.get_mut(id).unwrap();
        contig.split_evenly(10).unwrap();
        let bounds = contig
            .splits()
            .iter()
            .map(|s| (s.start(), s.end()))
            .collect_vec();
        assert_eq!(bounds, vec![(0, 10), (10, 20), (20, 25)]);
    }

    #[test]
    fn test_explicit_length() {
        let mut set = ContigSet::new();
        let id = set.add_contig("c1", 10);
        let contig = set.get_mut(id).unwrap();
        contig.add_split(0, 10).unwrap();
        contig.splits[0].set_explicit_length(7);
        assert_eq!(contig.splits()[0].length(), 7);
    }

    #[test]
    fn test_analyze_coverage_pools_split_depths() {
        let mut pileup = MemoryPileup::new();
        // split 1 [0, 4): depths 2, 2, 0, 0 ; split 2 [4, 6): depths 8, 8
        for pos in [0, 1] {
            pileup.insert("c1", PileupColumn::new(pos, b"AA".to_vec()));
        }
        for pos in [4, 5] {
            pileup.insert("c1", PileupColumn::new(pos, b"AAAAAAAA".to_vec()));
        }
        let mut set = ContigSet::new();
        let id = set.add_contig("c1", 6);
        let contig = set.get_mut(id).unwrap();
        contig.add_split(0, 4).unwrap();
        contig.add_split(4, 6).unwrap();
        contig
            .analyze_coverage(&pileup, &ProfileConfig::default())
            .unwrap();

        assert_approx_eq!(contig.splits()[0].coverage().mean(), 1.0);
        assert_approx_eq!(contig.splits()[1].coverage().mean(), 8.0);
        // pooled, not the mean of split means
        assert_approx_eq!(contig.coverage().mean(), 20.0 / 6.0);
        assert_approx_eq!(contig.coverage().portion_covered(), 4.0 / 6.0);
        assert_eq!(contig.coverage().depths(), &[2, 2, 0, 0, 8, 8]);
    }

    #[test]
    fn test_analyze_auxiliary_and_variability() {
        let pileup = uniform_pileup("c1", 20, "AAAAACCCCC");
        let mut set = ContigSet::new();
        let id = set.add_contig("c1", 20);
        set.get_mut(id)
            .unwrap()
            .split_evenly(10)
            .unwrap();

        let config = ProfileConfig::default();
        set.analyze_coverage(&pileup, &config).unwrap();
        set.analyze_auxiliary(&pileup, &config, &VariabilityTest::default())
            .unwrap();

        let contig = set.get(id).unwrap();
        for split in contig.splits() {
            let aux = split.auxiliary().unwrap();
            assert_eq!(aux.rep_seq().len(), 10);
            assert_eq!(aux.rep_seq(), "AAAAAAAAAA");
            assert_approx_eq!(aux.variability_score(), 100.0);
            assert_eq!(split.column_profiles().len(), 10);
        }
        assert_approx_eq!(contig.variability(), 200.0);
        assert_approx_eq!(contig.metadata().variability, 200.0);
    }

    #[test]
    fn test_set_contigs_abundance() {
        let mut pileup = MemoryPileup::new();
        for pos in 0..10 {
            pileup.insert("a", PileupColumn::new(pos, vec![b'A'; 4]));
        }
        for pos in 0..30 {
            pileup.insert("b", PileupColumn::new(pos, vec![b'A'; 12]));
        }
        let mut set = ContigSet::new();
        for (name, length) in [("a", 10), ("b", 30)] {
            let id = set.add_contig(name, length);
            set.get_mut(id)
                .unwrap()
                .split_evenly(10)
                .unwrap();
        }
        set.analyze_coverage(&pileup, &ProfileConfig::default())
            .unwrap();
        let overall = set.set_abundance().unwrap();

        assert_approx_eq!(overall, (4.0 * 10.0 + 12.0 * 30.0) / 40.0);
        assert_approx_eq!(set.contigs()[0].abundance(), 4.0 / 10.0);
        assert_approx_eq!(set.contigs()[1].abundance(), 12.0 / 10.0);
        for split in set.contigs()[1].splits() {
            assert_approx_eq!(split.abundance(), 1.2);
        }

        let weighted = weighted_mean(
            set.contigs()
                .iter()
                .map(|c| (c.abundance(), c.length() as f64)),
        )
        .unwrap();
        assert_approx_eq!(weighted, 1.0);
    }

    #[test]
    fn test_split_abundance_and_normalized_coverage() {
        let mut pileup = MemoryPileup::new();
        // "a": first split at depth 4, second at depth 40; "b": uniform depth 2
        for pos in 0..20 {
            let depth = if pos < 10 { 4 } else { 40 };
            pileup.insert("a", PileupColumn::new(pos, vec![b'A'; depth]));
            pileup.insert("b", PileupColumn::new(pos, vec![b'C'; 2]));
        }
        let mut set = ContigSet::new();
        for name in ["a", "b"] {
            let id = set.add_contig(name, 20);
            set.get_mut(id)
                .unwrap()
                .split_evenly(10)
                .unwrap();
        }
        set.analyze_coverage(&pileup, &ProfileConfig::default())
            .unwrap();
        let overall = set.set_abundance().unwrap();
        assert_approx_eq!(overall, (22.0 * 20.0 + 2.0 * 20.0) / 40.0);

        let a = &set.contigs()[0];
        assert_approx_eq!(a.abundance(), 22.0 / overall);
        assert_approx_eq!(a.splits()[0].abundance(), 4.0 / overall);
        assert_approx_eq!(a.splits()[1].abundance(), 40.0 / overall);

        set.normalize_coverage(overall).unwrap();
        for contig in set.contigs() {
            let metadata = contig.metadata();
            assert_approx_eq!(metadata.normalized_coverage, metadata.mean_coverage / overall);
            for (_, metadata) in contig.split_metadata() {
                assert_approx_eq!(
                    metadata.normalized_coverage,
                    metadata.mean_coverage / overall
                );
                assert_approx_eq!(metadata.normalized_coverage, metadata.abundance);
            }
        }
        let a_splits = set.contigs()[0].split_metadata();
        assert_approx_eq!(a_splits[0].1.normalized_coverage, 4.0 / 12.0);
        assert_approx_eq!(a_splits[1].1.normalized_coverage, 40.0 / 12.0);
        assert!(set.normalize_coverage(0.0).is_err());
    }

    #[test]
    fn test_set_contigs_abundance_zero_length() {
        let mut set = ContigSet::new();
        set.add_contig("empty", 0);
        assert!(set.set_abundance().is_err());
    }

    #[test]
    fn test_split_metadata_parent() {
        let pileup = uniform_pileup("c1", 10, "GGGG");
        let mut set = ContigSet::new();
        let id = set.add_contig("c1", 10);
        set.get_mut(id)
            .unwrap()
            .split_evenly(5)
            .unwrap();
        set.analyze_coverage(&pileup, &ProfileConfig::default())
            .unwrap();
        let metadata = set.get(id).unwrap().split_metadata();
        assert_eq!(metadata.len(), 2);
        assert_eq!(metadata[0].0, "c1_split_00001");
        assert_eq!(metadata[0].1.parent.as_deref(), Some("c1"));
        assert_approx_eq!(metadata[0].1.mean_coverage, 4.0);
        assert_eq!(metadata[0].1.variability, 0.0);
    }
}
