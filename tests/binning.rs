mod common;
use std::fs::File;
use std::io::Write;

use assert_approx_eq::assert_approx_eq;
use binsplorer::io::tables::{
    write_clusters_tsv,
    write_collection_json,
    ProfileTables,
};
use binsplorer::tools::binning::{
    Binner,
    BinningConfig,
    FeatureMatrix,
};
use common::{
    DemoProfile,
    DemoProfileBuilder,
};
use itertools::Itertools;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rstest::{
    fixture,
    rstest,
};

#[fixture]
#[once]
fn profile() -> DemoProfile {
    DemoProfileBuilder::new(3, 6, 4_000, 4, 42).build()
}

#[fixture]
fn config() -> BinningConfig {
    BinningConfig::default().with_seed(Some(7))
}

#[rstest]
fn test_feature_rows_follow_input_order(
    profile: &DemoProfile,
    config: BinningConfig,
) {
    let features = FeatureMatrix::build(&profile.coverages, &profile.kmers, &config).unwrap();
    assert_eq!(features.schema().contigs(), profile.names.as_slice());
    assert_eq!(features.composition().nrows(), profile.names.len());
    assert_eq!(features.coverage().nrows(), profile.names.len());
    // 256 tetranucleotides
    assert_eq!(features.composition().ncols(), 256);
    // 4 samples plus the per-contig magnitude column
    assert_eq!(features.coverage().ncols(), 5);
    for (length, sequence) in features.lengths().iter().zip(profile.sequences.iter()) {
        assert_approx_eq!(*length, sequence.len() as f64);
    }
}

#[rstest]
fn test_feature_rows_permute_with_input(
    profile: &DemoProfile,
    config: BinningConfig,
) {
    let order = (0..profile.names.len()).rev().collect_vec();
    let permuted = profile.permuted(&order);

    let original = FeatureMatrix::build(&profile.coverages, &profile.kmers, &config)
        .unwrap()
        .joint()
        .unwrap();
    let shuffled = FeatureMatrix::build(&permuted.coverages, &permuted.kmers, &config)
        .unwrap()
        .joint()
        .unwrap();

    assert_eq!(original.dim(), shuffled.dim());
    for (new_row, old_row) in order.iter().enumerate() {
        for (a, b) in shuffled
            .row(new_row)
            .iter()
            .zip(original.row(*old_row).iter())
        {
            assert_approx_eq!(a, b, 1e-9);
        }
    }
}

#[rstest]
fn test_cluster_every_contig_once(
    profile: &DemoProfile,
    config: BinningConfig,
) {
    let assignment = Binner::new(config.with_n_clusters(5))
        .cluster(&profile.tables(true))
        .unwrap();
    assert_eq!(assignment.len(), profile.names.len());
    assert!(assignment.n_groups() <= 5);
    for name in profile.names.iter() {
        let group = assignment.get(name).unwrap();
        assert!(group.starts_with("Group_"));
    }
}

#[rstest]
fn test_more_clusters_than_contigs(config: BinningConfig) {
    let profile = DemoProfileBuilder::new(2, 5, 3_000, 3, 11).build();
    assert_eq!(profile.names.len(), 10);
    let binner = Binner::new(config.with_n_clusters(80));
    let assignment = binner.cluster(&profile.tables(true)).unwrap();

    assert_eq!(assignment.len(), 10);
    assert!(assignment.n_groups() <= 10);
    assert_eq!(
        assignment.contigs().cloned().collect_vec(),
        profile.names
    );
}

#[rstest]
fn test_seeded_clustering_is_reproducible(
    profile: &DemoProfile,
    config: BinningConfig,
) {
    let binner = Binner::new(config.with_n_clusters(3));
    let first = binner.cluster(&profile.tables(true)).unwrap();
    let second = binner.cluster(&profile.tables(true)).unwrap();
    assert_eq!(first, second);
}

#[rstest]
fn test_unmerged_profile_is_rejected(
    profile: &DemoProfile,
    config: BinningConfig,
) {
    let result = Binner::new(config).cluster(&profile.tables(false));
    assert!(result.is_err());
}

#[rstest]
fn test_mismatched_tables_are_rejected(
    profile: &DemoProfile,
    config: BinningConfig,
) {
    let mut coverages = profile.coverages.clone();
    let kmers = profile.kmers.clone();
    let (_, first_row) = coverages.first_mut().unwrap();
    first_row.insert("extra_sample".to_string(), 1.0);

    let tables = ProfileTables::new(true, coverages, kmers);
    assert!(Binner::new(config).cluster(&tables).is_err());
}

#[rstest]
fn test_cluster_from_files(
    profile: &DemoProfile,
    config: BinningConfig,
) {
    let dir = tempfile::tempdir().unwrap();
    let coverage_path = dir.path().join("coverages.tsv");
    let kmer_path = dir.path().join("kmers.tsv");
    File::create(&coverage_path)
        .unwrap()
        .write_all(profile.coverage_tsv().as_bytes())
        .unwrap();
    File::create(&kmer_path)
        .unwrap()
        .write_all(profile.kmer_tsv().as_bytes())
        .unwrap();

    let tables = ProfileTables::from_readers(
        true,
        File::open(&coverage_path).unwrap(),
        File::open(&kmer_path).unwrap(),
    )
    .unwrap();
    assert_eq!(tables.coverages(), &profile.coverages);
    assert_eq!(tables.kmers(), &profile.kmers);

    let assignment = Binner::new(config.with_n_clusters(3))
        .cluster(&tables)
        .unwrap();

    let report_path = dir.path().join("clusters.tsv");
    write_clusters_tsv(&assignment, File::create(&report_path).unwrap()).unwrap();
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .from_path(&report_path)
        .unwrap();
    assert_eq!(
        reader.headers().unwrap().iter().collect_vec(),
        vec!["contig", "cluster_bin"]
    );
    let records = reader
        .records()
        .map(|r| r.unwrap())
        .collect_vec();
    assert_eq!(records.len(), profile.names.len());
    for (record, name) in records.iter().zip(profile.names.iter()) {
        assert_eq!(&record[0], name.as_str());
        assert_eq!(&record[1], assignment.get(name).unwrap().as_str());
    }

    let mut rng = ChaCha8Rng::seed_from_u64(0);
    let collection = assignment.to_collection("binsplorer", &mut rng);
    let json_path = dir.path().join("collection.json");
    write_collection_json(&collection, File::create(&json_path).unwrap()).unwrap();
    let parsed: serde_json::Value =
        serde_json::from_reader(File::open(&json_path).unwrap()).unwrap();
    let members = parsed["data"]
        .as_object()
        .unwrap()
        .values()
        .map(|members| members.as_array().unwrap().len())
        .sum::<usize>();
    assert_eq!(members, profile.names.len());
    assert_eq!(
        parsed["colors"].as_object().unwrap().len(),
        assignment.n_groups()
    );
}
