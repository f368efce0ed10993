/// 0-based position on a contig.
pub type PosType = u32;
/// Number of reads covering a position.
pub type DepthType = u32;
/// Ratio of the second most frequent base count to the most frequent one.
pub type RatioType = f64;
/// Raw k-mer count.
pub type CountType = u64;
