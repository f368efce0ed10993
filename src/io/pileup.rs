use std::io::Read;

use anyhow::{
    Context,
    Result,
};
use hashbrown::HashMap;
use itertools::Itertools;
use log::debug;
use serde::{
    Deserialize,
    Serialize,
};

use crate::data_structs::typedef::{
    DepthType,
    PosType,
};

/// Bases of all aligned reads overlapping a single reference position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PileupColumn {
    pos:   PosType,
    depth: DepthType,
    bases: Vec<u8>,
}

impl PileupColumn {
    /// Creates a column whose depth equals the number of observed bases.
    pub fn new(
        pos: PosType,
        bases: Vec<u8>,
    ) -> Self {
        Self {
            pos,
            depth: bases.len() as DepthType,
            bases,
        }
    }

    /// Overrides the depth, e.g. when reads with a deletion at this position
    /// count towards the depth but contribute no base.
    pub fn with_depth(
        mut self,
        depth: DepthType,
    ) -> Self {
        self.depth = depth;
        self
    }

    pub fn pos(&self) -> PosType {
        self.pos
    }

    pub fn depth(&self) -> DepthType {
        self.depth
    }

    pub fn bases(&self) -> &[u8] {
        &self.bases
    }
}

/// Read-only provider of pileup columns.
///
/// Implementations may return columns outside of the requested interval;
/// consumers filter by position themselves. Columns are expected in
/// ascending position order.
pub trait PileupSource {
    fn pileup(
        &self,
        contig: &str,
        start: PosType,
        end: PosType,
    ) -> Result<Vec<PileupColumn>>;
}

/// Pileup kept in memory, keyed by contig name.
#[derive(Debug, Clone, Default)]
pub struct MemoryPileup {
    columns: HashMap<String, Vec<PileupColumn>>,
}

impl MemoryPileup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        contig: &str,
        column: PileupColumn,
    ) {
        let columns = self
            .columns
            .entry(contig.to_string())
            .or_default();
        match columns.binary_search_by_key(&column.pos, |c| c.pos) {
            Ok(idx) => columns[idx] = column,
            Err(idx) => columns.insert(idx, column),
        }
    }

    pub fn n_columns(&self) -> usize {
        self.columns.values().map(Vec::len).sum()
    }

    /// Reads a TAB-delimited pileup with a header and the columns
    /// `contig`, `pos` (0-based) and `bases`.
    pub fn from_tsv<R: Read>(reader: R) -> Result<Self> {
        #[derive(Deserialize)]
        struct Row {
            contig: String,
            pos:    PosType,
            bases:  String,
        }

        let mut csv_reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(true)
            .from_reader(reader);

        let mut pileup = Self::new();
        for (line, row) in csv_reader.deserialize::<Row>().enumerate() {
            let row = row.with_context(|| {
                format!("Malformed pileup record at line {}", line + 2)
            })?;
            pileup.insert(
                &row.contig,
                PileupColumn::new(row.pos, row.bases.into_bytes()),
            );
        }
        debug!(
            "Read pileup with {} columns over {} contigs",
            pileup.n_columns(),
            pileup.columns.len()
        );
        Ok(pileup)
    }
}

impl PileupSource for MemoryPileup {
    fn pileup(
        &self,
        contig: &str,
        start: PosType,
        end: PosType,
    ) -> Result<Vec<PileupColumn>> {
        let Some(columns) = self.columns.get(contig)
        else {
            return Ok(Vec::new());
        };
        let from = columns.partition_point(|c| c.pos < start);
        let to = columns.partition_point(|c| c.pos < end);
        Ok(columns[from..to].iter().cloned().collect_vec())
    }
}

/// Per-base depth over `[start, end)`, zero where no column exists.
pub fn interval_depths(
    columns: &[PileupColumn],
    start: PosType,
    end: PosType,
) -> Vec<DepthType> {
    let mut depths = vec![0; end.saturating_sub(start) as usize];
    for column in columns
        .iter()
        .filter(|c| c.pos >= start && c.pos < end)
    {
        depths[(column.pos - start) as usize] = column.depth;
    }
    depths
}
