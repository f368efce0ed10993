use std::io::{
    Read,
    Write,
};
use std::str::FromStr;

use anyhow::{
    anyhow,
    ensure,
    Context,
    Result,
};
use indexmap::IndexMap;
use log::{
    debug,
    info,
};

use crate::data_structs::typedef::CountType;
use crate::tools::binning::{
    BinCollection,
    ClusterAssignment,
};

/// Contig -> sample -> mean coverage.
pub type CoverageTable = IndexMap<String, IndexMap<String, f64>>;
/// Contig -> k-mer -> count.
pub type KmerTable = IndexMap<String, IndexMap<String, CountType>>;

/// Coverage and composition tables of a profile, as fetched from storage.
#[derive(Debug, Clone, Default)]
pub struct ProfileTables {
    merged:    bool,
    coverages: CoverageTable,
    kmers:     KmerTable,
}

impl ProfileTables {
    /// Bundles the tables. K-mer rows of contigs absent from the coverage
    /// table are dropped; the remaining key sets are validated later, when
    /// the feature schema is built.
    pub fn new(
        merged: bool,
        coverages: CoverageTable,
        mut kmers: KmerTable,
    ) -> Self {
        let before = kmers.len();
        kmers.retain(|contig, _| coverages.contains_key(contig));
        if kmers.len() != before {
            debug!(
                "Dropped {} k-mer rows without coverage",
                before - kmers.len()
            );
        }
        Self {
            merged,
            coverages,
            kmers,
        }
    }

    /// Reads both tables from TAB-delimited wide tables.
    pub fn from_readers<C: Read, K: Read>(
        merged: bool,
        coverages: C,
        kmers: K,
    ) -> Result<Self> {
        let coverages =
            read_wide_table::<_, f64>(coverages).context("Failed to read coverage table")?;
        let kmers = read_wide_table::<_, CountType>(kmers)
            .context("Failed to read k-mer table")?;
        info!(
            "Read coverage of {} contigs and k-mer counts of {} contigs",
            coverages.len(),
            kmers.len()
        );
        Ok(Self::new(merged, coverages, kmers))
    }

    pub fn merged(&self) -> bool {
        self.merged
    }

    pub fn coverages(&self) -> &CoverageTable {
        &self.coverages
    }

    pub fn kmers(&self) -> &KmerTable {
        &self.kmers
    }
}

/// Reads a TAB-delimited table whose first column holds row keys and whose
/// header names the remaining columns.
pub fn read_wide_table<R, T>(reader: R) -> Result<IndexMap<String, IndexMap<String, T>>>
where
    R: Read,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static, {
    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .from_reader(reader);

    let columns = csv_reader
        .headers()?
        .iter()
        .skip(1)
        .map(String::from)
        .collect::<Vec<_>>();
    ensure!(!columns.is_empty(), "Table has no value columns");

    let mut table = IndexMap::new();
    for (line, record) in csv_reader.records().enumerate() {
        let record = record.with_context(|| format!("Malformed record at line {}", line + 2))?;
        let key = record
            .get(0)
            .ok_or_else(|| anyhow!("Missing row key at line {}", line + 2))?
            .to_string();
        ensure!(
            record.len() == columns.len() + 1,
            "Row {} has {} values, expected {}",
            key,
            record.len() - 1,
            columns.len()
        );
        let row = columns
            .iter()
            .zip(record.iter().skip(1))
            .map(|(column, value)| {
                value
                    .trim()
                    .parse::<T>()
                    .map(|parsed| (column.clone(), parsed))
                    .with_context(|| {
                        format!("Bad value '{}' for {} / {}", value, key, column)
                    })
            })
            .collect::<Result<IndexMap<_, _>>>()?;
        ensure!(
            table.insert(key.clone(), row).is_none(),
            "Duplicate row key {}",
            key
        );
    }
    Ok(table)
}

/// Writes the `contig`/`cluster_bin` report.
pub fn write_clusters_tsv<W: Write>(
    assignment: &ClusterAssignment,
    writer: W,
) -> Result<()> {
    let mut csv_writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_writer(writer);
    csv_writer.write_record(["contig", "cluster_bin"])?;
    for (contig, group) in assignment.iter() {
        csv_writer.write_record([contig, group])?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Writes a bin collection as pretty-printed JSON.
pub fn write_collection_json<W: Write>(
    collection: &BinCollection,
    writer: W,
) -> Result<()> {
    serde_json::to_writer_pretty(writer, collection)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_wide_table() {
        let data = "contig\ts1\ts2\nc1\t1.5\t2\nc2\t0\t10.25\n";
        let table = read_wide_table::<_, f64>(data.as_bytes()).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table["c1"]["s1"], 1.5);
        assert_eq!(table["c2"]["s2"], 10.25);
        assert_eq!(
            table.keys().cloned().collect::<Vec<_>>(),
            vec!["c1", "c2"]
        );
    }

    #[test]
    fn test_read_wide_table_errors() {
        let bad_value = "contig\ts1\nc1\tabc\n";
        assert!(read_wide_table::<_, f64>(bad_value.as_bytes()).is_err());

        let duplicate = "contig\ts1\nc1\t1\nc1\t2\n";
        assert!(read_wide_table::<_, f64>(duplicate.as_bytes()).is_err());

        let no_columns = "contig\nc1\n";
        assert!(read_wide_table::<_, f64>(no_columns.as_bytes()).is_err());
    }

    #[test]
    fn test_profile_tables_restrict_kmers() {
        let coverages = "contig\ts1\ts2\nc1\t1\t2\n";
        let kmers = "contig\tAAAA\tTTTT\nc1\t3\t4\nc9\t1\t1\n";
        let tables =
            ProfileTables::from_readers(true, coverages.as_bytes(), kmers.as_bytes()).unwrap();
        assert!(tables.merged());
        assert_eq!(tables.kmers().len(), 1);
        assert_eq!(tables.kmers()["c1"]["TTTT"], 4);
    }

    #[test]
    fn test_write_clusters_tsv() {
        let names = vec!["c1".to_string(), "c2".to_string()];
        let assignment = ClusterAssignment::from_labels(&names, &[3, 0]).unwrap();
        let mut buffer = Vec::new();
        write_clusters_tsv(&assignment, &mut buffer).unwrap();
        assert_eq!(
            String::from_utf8(buffer).unwrap(),
            "contig\tcluster_bin\nc1\tGroup_3\nc2\tGroup_0\n"
        );
    }
}
