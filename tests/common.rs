#![allow(dead_code)]
use binsplorer::io::pileup::{
    MemoryPileup,
    PileupColumn,
};
use binsplorer::io::tables::{
    CoverageTable,
    KmerTable,
    ProfileTables,
};
use indexmap::IndexMap;
use itertools::Itertools;
use rand::distributions::{
    Distribution,
    WeightedIndex,
};
use rand::{
    Rng,
    SeedableRng,
};
use rand_chacha::ChaCha8Rng;
use rand_distr::{
    Normal,
    Poisson,
};

const BASES: [u8; 4] = *b"ACGT";

pub fn all_kmers(k: usize) -> Vec<String> {
    (0..k)
        .map(|_| BASES.iter().copied())
        .multi_cartesian_product()
        .map(|kmer| String::from_utf8_lossy(&kmer).to_string())
        .collect()
}

fn generate_sequence<R: Rng>(
    rng: &mut R,
    weights: &WeightedIndex<f64>,
    length: usize,
) -> Vec<u8> {
    (0..length)
        .map(|_| BASES[weights.sample(rng)])
        .collect()
}

fn count_kmers(
    sequence: &[u8],
    kmers: &[String],
    k: usize,
) -> IndexMap<String, u64> {
    let mut counts: IndexMap<String, u64> = kmers
        .iter()
        .map(|kmer| (kmer.clone(), 0))
        .collect();
    for window in sequence.windows(k) {
        let kmer = String::from_utf8_lossy(window).to_string();
        if let Some(count) = counts.get_mut(&kmer) {
            *count += 1;
        }
    }
    counts
}

/// Synthetic metagenome: several genomes with distinct base composition and
/// per-sample abundance, cut into contigs.
pub struct DemoProfileBuilder {
    n_genomes:          usize,
    contigs_per_genome: usize,
    contig_length:      usize,
    n_samples:          usize,
    kmer_length:        usize,
    seed:               u64,
}

impl DemoProfileBuilder {
    pub fn new(
        n_genomes: usize,
        contigs_per_genome: usize,
        contig_length: usize,
        n_samples: usize,
        seed: u64,
    ) -> Self {
        Self {
            n_genomes,
            contigs_per_genome,
            contig_length,
            n_samples,
            kmer_length: 4,
            seed,
        }
    }

    pub fn build(&self) -> DemoProfile {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let kmers = all_kmers(self.kmer_length);
        let samples = (0..self.n_samples)
            .map(|i| format!("sample_{}", i))
            .collect_vec();
        let noise = Normal::new(1.0, 0.05).unwrap();

        let mut profile = DemoProfile::default();
        for genome in 0..self.n_genomes {
            let weights = WeightedIndex::new(
                (0..4).map(|_| rng.gen_range(0.5..2.0)).collect_vec(),
            )
            .unwrap();
            let abundances = (0..self.n_samples)
                .map(|_| rng.gen_range(5.0..200.0))
                .collect_vec();

            for idx in 0..self.contigs_per_genome {
                let name = format!("genome{}_contig{}", genome, idx);
                let sequence = generate_sequence(&mut rng, &weights, self.contig_length);
                let coverage = samples
                    .iter()
                    .zip(abundances.iter())
                    .map(|(sample, abundance)| {
                        let value: f64 = abundance * noise.sample(&mut rng);
                        (sample.clone(), value.max(0.0))
                    })
                    .collect();

                profile
                    .kmers
                    .insert(name.clone(), count_kmers(&sequence, &kmers, self.kmer_length));
                profile.coverages.insert(name.clone(), coverage);
                profile.genome_of.push(genome);
                profile.names.push(name);
                profile.sequences.push(sequence);
            }
        }
        profile
    }
}

#[derive(Debug, Clone, Default)]
pub struct DemoProfile {
    pub names:     Vec<String>,
    pub genome_of: Vec<usize>,
    pub sequences: Vec<Vec<u8>>,
    pub coverages: CoverageTable,
    pub kmers:     KmerTable,
}

impl DemoProfile {
    pub fn tables(
        &self,
        merged: bool,
    ) -> ProfileTables {
        ProfileTables::new(merged, self.coverages.clone(), self.kmers.clone())
    }

    pub fn coverage_tsv(&self) -> String {
        wide_tsv(&self.coverages)
    }

    pub fn kmer_tsv(&self) -> String {
        wide_tsv(&self.kmers)
    }

    /// Same profile with rows in the given order.
    pub fn permuted(
        &self,
        order: &[usize],
    ) -> Self {
        let mut permuted = DemoProfile::default();
        for idx in order {
            let name = &self.names[*idx];
            permuted.names.push(name.clone());
            permuted.genome_of.push(self.genome_of[*idx]);
            permuted.sequences.push(self.sequences[*idx].clone());
            permuted
                .coverages
                .insert(name.clone(), self.coverages[name].clone());
            permuted
                .kmers
                .insert(name.clone(), self.kmers[name].clone());
        }
        permuted
    }
}

fn wide_tsv<T: ToString>(table: &IndexMap<String, IndexMap<String, T>>) -> String {
    let mut out = String::new();
    if let Some((_, first)) = table.first() {
        out.push_str("contig\t");
        out.push_str(&first.keys().join("\t"));
        out.push('\n');
    }
    for (contig, row) in table {
        out.push_str(contig);
        for value in row.values() {
            out.push('\t');
            out.push_str(&value.to_string());
        }
        out.push('\n');
    }
    out
}

/// Pileup over `reference` with Poisson depths. Every `variable_every`-th
/// position carries a minor allele at `minor_fraction`.
pub fn demo_pileup(
    contig: &str,
    reference: &[u8],
    mean_depth: f64,
    variable_every: usize,
    minor_fraction: f64,
    seed: u64,
) -> MemoryPileup {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let depth_dist = Poisson::new(mean_depth).unwrap();
    let mut pileup = MemoryPileup::new();
    for (pos, base) in reference.iter().enumerate() {
        let depth: f64 = depth_dist.sample(&mut rng);
        let depth = depth as usize;
        if depth == 0 {
            continue;
        }
        let mut bases = vec![*base; depth];
        if variable_every > 0 && pos % variable_every == 0 {
            let minor = BASES
                .iter()
                .copied()
                .find(|b| b != base)
                .unwrap();
            let n_minor = ((depth as f64) * minor_fraction).round() as usize;
            bases
                .iter_mut()
                .take(n_minor)
                .for_each(|b| *b = minor);
        }
        pileup.insert(contig, PileupColumn::new(pos as u32, bases));
    }
    pileup
}
