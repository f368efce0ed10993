use std::collections::{
    BTreeMap,
    BTreeSet,
};

use anyhow::{
    ensure,
    Result,
};
use indexmap::IndexMap;
use itertools::Itertools;
use rand::Rng;
use serde::{
    Deserialize,
    Serialize,
};

/// Display name of a mixture component.
pub fn group_label(group: usize) -> String {
    format!("Group_{}", group)
}

/// Random `#RRGGBB` color with every channel in `50..=230`.
pub fn random_color<R: Rng + ?Sized>(rng: &mut R) -> String {
    let [r, g, b]: [u8; 3] = [
        rng.gen_range(50..=230),
        rng.gen_range(50..=230),
        rng.gen_range(50..=230),
    ];
    format!("#{:02X}{:02X}{:02X}", r, g, b)
}

/// Contig name -> group label, in input contig order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterAssignment {
    clusters: IndexMap<String, String>,
}

impl ClusterAssignment {
    /// Maps positional labels back to contig names.
    pub fn from_labels(
        contigs: &[String],
        labels: &[usize],
    ) -> Result<Self> {
        ensure!(
            contigs.len() == labels.len(),
            "Got {} labels for {} contigs",
            labels.len(),
            contigs.len()
        );
        let clusters = contigs
            .iter()
            .cloned()
            .zip(labels.iter().map(|label| group_label(*label)))
            .collect::<IndexMap<_, _>>();
        ensure!(
            clusters.len() == contigs.len(),
            "Contig names must be unique"
        );
        Ok(Self { clusters })
    }

    pub fn get(
        &self,
        contig: &str,
    ) -> Option<&String> {
        self.clusters.get(contig)
    }

    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.clusters.iter()
    }

    pub fn contigs(&self) -> impl Iterator<Item = &String> {
        self.clusters.keys()
    }

    /// Number of distinct groups.
    pub fn n_groups(&self) -> usize {
        self.clusters.values().unique().count()
    }

    /// Groups contigs by label and gives every group a random color.
    pub fn to_collection<R: Rng + ?Sized>(
        &self,
        source: &str,
        rng: &mut R,
    ) -> BinCollection {
        let mut data: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for (contig, group) in self.clusters.iter() {
            data.entry(group.clone())
                .or_default()
                .insert(contig.clone());
        }
        let colors = data
            .keys()
            .map(|group| (group.clone(), random_color(rng)))
            .collect();
        BinCollection {
            source: source.to_string(),
            data,
            colors,
        }
    }
}

/// Named groups of contigs with display colors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinCollection {
    source: String,
    data:   BTreeMap<String, BTreeSet<String>>,
    colors: BTreeMap<String, String>,
}

impl BinCollection {
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn data(&self) -> &BTreeMap<String, BTreeSet<String>> {
        &self.data
    }

    pub fn colors(&self) -> &BTreeMap<String, String> {
        &self.colors
    }
}
