pub use crate::data_structs::typedef::{
    CountType,
    DepthType,
    PosType,
    RatioType,
};
pub use crate::data_structs::{
    gen_split_name,
    ColumnProfile,
    Contig,
    ContigId,
    ContigSet,
    Coverage,
    Metadata,
    ProfileConfig,
    Split,
    VariabilityTest,
};
pub use crate::io::pileup::{
    MemoryPileup,
    PileupColumn,
    PileupSource,
};
pub use crate::io::tables::{
    read_wide_table,
    write_clusters_tsv,
    write_collection_json,
    CoverageTable,
    KmerTable,
    ProfileTables,
};
pub use crate::tools::binning::{
    Assigner,
    BinCollection,
    Binner,
    BinningConfig,
    ClusterAssignment,
    GaussianMixture,
    Pca,
    Reducer,
};
pub use crate::tools::variability::{
    Auxiliary,
    AuxiliaryScorer,
};
