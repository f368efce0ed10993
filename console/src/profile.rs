use std::fs::File;
use std::io::{
    BufReader,
    BufWriter,
    Write,
};
use std::path::PathBuf;

use anyhow::{
    ensure,
    Context,
};
use binsplorer::data_structs::typedef::PosType;
use binsplorer::data_structs::{
    ContigSet,
    Metadata,
    ProfileConfig,
    VariabilityTest,
};
use binsplorer::io::pileup::MemoryPileup;
use clap::Args;
use itertools::Itertools;
use log::info;
use serde::{
    Deserialize,
    Serialize,
};

use crate::utils::UtilsArgs;

#[derive(Args, Debug, Clone)]
pub(crate) struct ProfileArgs {
    #[arg(
        short = 'c',
        long,
        required = true,
        help = "TAB-delimited table with the columns `contig` and `length`."
    )]
    contigs:      PathBuf,
    #[arg(
        short = 'p',
        long,
        required = true,
        help = "TAB-delimited pileup with the columns `contig`, `pos` (0-based) and \
                `bases`."
    )]
    pileup:       PathBuf,
    #[arg(
        short = 'o',
        long,
        required = true,
        help = "Path of the split metadata table."
    )]
    output:       PathBuf,
    #[arg(
        long,
        required = false,
        help = "Also write the contig metadata table."
    )]
    contig_output: Option<PathBuf>,

    #[arg(
        short = 's',
        long,
        default_value_t = 20_000,
        help_heading = "PROFILE ARGS",
        help = "Length of the splits contigs are cut into."
    )]
    split_length: PosType,
    #[arg(
        short = 'm',
        long,
        default_value_t = 10,
        help_heading = "PROFILE ARGS",
        help = "Columns with depth below this value are not profiled."
    )]
    min_coverage: u32,
    #[arg(
        long,
        default_value_t = false,
        help_heading = "PROFILE ARGS",
        help = "Report every polymorphic column instead of applying the \
                depth-dependent significance test."
    )]
    report_full: bool,
    #[arg(
        long,
        help_heading = "PROFILE ARGS",
        help = "Mean depth the normalized coverage is relative to. Defaults to \
                the length-weighted mean coverage of all contigs."
    )]
    reference_mean: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ContigRow {
    contig: String,
    length: PosType,
}

#[derive(Debug, Serialize)]
struct MetadataRow<'a> {
    name:                 &'a str,
    std_coverage:         f64,
    mean_coverage:        f64,
    normalized_coverage:  f64,
    max_normalized_ratio: f64,
    relative_abundance:   f64,
    portion_covered:      f64,
    abundance:            f64,
    variability:          f64,
    #[serde(rename = "__parent__")]
    parent:               Option<&'a str>,
}

impl<'a> MetadataRow<'a> {
    fn new(
        name: &'a str,
        metadata: &'a Metadata,
    ) -> Self {
        Self {
            name,
            std_coverage: metadata.std_coverage,
            mean_coverage: metadata.mean_coverage,
            normalized_coverage: metadata.normalized_coverage,
            max_normalized_ratio: metadata.max_normalized_ratio,
            relative_abundance: metadata.relative_abundance,
            portion_covered: metadata.portion_covered,
            abundance: metadata.abundance,
            variability: metadata.variability,
            parent: metadata.parent.as_deref(),
        }
    }
}

fn write_metadata<W: Write>(
    rows: &[(String, Metadata)],
    writer: W,
) -> anyhow::Result<()> {
    let mut csv_writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_writer(writer);
    for (name, metadata) in rows {
        csv_writer.serialize(MetadataRow::new(name, metadata))?;
    }
    csv_writer.flush()?;
    Ok(())
}

impl ProfileArgs {
    fn read_contigs(&self) -> anyhow::Result<ContigSet> {
        let file = File::open(&self.contigs)
            .with_context(|| format!("Failed to open {}", self.contigs.display()))?;
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .from_reader(BufReader::new(file));

        let mut set = ContigSet::new();
        for row in reader.deserialize::<ContigRow>() {
            let row = row?;
            let id = set.add_contig(&row.contig, row.length);
            if let Some(contig) = set.get_mut(id) {
                contig.split_evenly(self.split_length)?;
            }
        }
        ensure!(!set.is_empty(), "No contigs in {}", self.contigs.display());
        Ok(set)
    }

    pub fn run(
        &self,
        _utils: &UtilsArgs,
    ) -> anyhow::Result<()> {
        let mut set = self.read_contigs()?;
        let pileup_file = File::open(&self.pileup)
            .with_context(|| format!("Failed to open {}", self.pileup.display()))?;
        let pileup = MemoryPileup::from_tsv(BufReader::new(pileup_file))?;
        info!(
            "Profiling {} contigs ({} splits) over {} pileup columns",
            set.len(),
            set.splits().count(),
            pileup.n_columns()
        );

        let mut config = ProfileConfig::default()
            .with_min_coverage_for_variability(self.min_coverage)
            .with_report_variability_full(self.report_full);
        if let Some(reference_mean) = self.reference_mean {
            config = config.with_reference_mean(reference_mean);
        }
        let test = VariabilityTest::default();
        set.analyze_coverage(&pileup, &config)?;
        set.analyze_auxiliary(&pileup, &config, &test)?;
        let overall = set.set_abundance()?;
        info!("Overall mean coverage {:.2}", overall);
        if self.reference_mean.is_none() {
            set.normalize_coverage(overall)?;
        }

        let split_rows = set
            .contigs()
            .iter()
            .flat_map(|contig| contig.split_metadata())
            .collect_vec();
        let output = File::create(&self.output)
            .with_context(|| format!("Failed to create {}", self.output.display()))?;
        write_metadata(&split_rows, BufWriter::new(output))?;
        info!("Wrote {} splits to {}", split_rows.len(), self.output.display());

        if let Some(path) = &self.contig_output {
            let contig_rows = set
                .contigs()
                .iter()
                .map(|contig| (contig.name().clone(), contig.metadata()))
                .collect_vec();
            let file = File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            write_metadata(&contig_rows, BufWriter::new(file))?;
            info!("Wrote {} contigs to {}", contig_rows.len(), path.display());
        }
        Ok(())
    }
}
