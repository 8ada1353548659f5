mod entry;
mod locus;
mod metadata;
pub(crate) mod utils;

pub use entry::IndexEntry;
pub use locus::{ChromosomeCodeMap, decode_locus, encode_locus, normalize_chrom};
pub use metadata::IndexMetadata;
pub use utils::LineLayout;

pub(crate) use entry::first_unordered;
