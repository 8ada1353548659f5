//! # gtidx
//!
//! Sparse on-disk locus indexes for sorted, line-oriented genomic text files.
//!
//! A source file is any newline-delimited table whose records carry a
//! chromosome and a position column and are sorted by chromosome (contiguous
//! blocks, in order of first appearance) and then by position. Building an
//! index records the byte offset of the first line of a sample of distinct
//! loci into a *sidecar* file next to the source. Resolving a locus then
//! costs a binary search over the entries plus a short linear scan of the
//! source between two neighbouring entries.
//!
//! ```rust,no_run
//! use std::{fs::File, io::{BufRead, BufReader}};
//!
//! # fn main() -> gtidx::Result<()> {
//! gtidx::build_index("variants.tsv", 0, 1, "\t", 1, 0.1, Some("#"))?;
//! let index = gtidx::load_index("variants.tsv")?;
//!
//! let mut reader = BufReader::new(File::open("variants.tsv")?);
//! if gtidx::goto(&mut reader, &index, "chr2", 11)? {
//!     let mut line = String::new();
//!     reader.read_line(&mut line)?;
//!     print!("{line}");
//! }
//! # Ok(())
//! # }
//! ```

mod build;
mod core;
mod error;
mod resolve;
mod sample;
pub mod store;

use std::io::{BufRead, Seek};
use std::path::{Path, PathBuf};

pub use build::{BuildOutput, BuildStats, IndexBuilder};
pub use crate::core::{
    ChromosomeCodeMap, IndexEntry, IndexMetadata, LineLayout, decode_locus, encode_locus,
    normalize_chrom,
};
pub use error::{BuildError, Error, IndexError, IntoGtidxError, QueryError, Result};
pub use resolve::LocusIndex;
pub use sample::{LineEstimate, estimate_lines};
pub use store::sidecar_path;

/// Multiplier separating the chromosome code from the position in a locus code
pub const LOCUS_MAGIC: u64 = 1_000_000_000;

/// Suffix appended to a source file name to form its sidecar path
pub const INDEX_SUFFIX: &str = ".gtidx";

pub const FILE_MAGIC: &[u8; 7] = b"GTINDEX";
pub const FOOTER_MAGIC: &[u8; 8] = b"GTIDXEND";
pub const META_TAG: &[u8; 4] = b"META";
pub const ENTRY_TAG: &[u8; 4] = b"ENTR";

pub const FILE_VERSION: u8 = 1;

/// Number of probes taken by the line length estimator
pub const SAMPLE_COUNT: usize = 100;

pub const DEFAULT_INDEX_RATE: f64 = 0.2;

/// Default number of repeated-locus lines a sparse probe may skip
pub const DEFAULT_MAX_LOOKAHEAD: usize = 10_000;

/// Builds the index of a source file and writes it to its sidecar
///
/// Shorthand for configuring an [`IndexBuilder`]. Returns the sidecar path.
pub fn build_index<P: AsRef<Path>>(
    path: P,
    chrom_column: usize,
    pos_column: usize,
    delimiter: &str,
    skip_lines: usize,
    index_rate: f64,
    ignore_startswith: Option<&str>,
) -> Result<PathBuf> {
    let mut builder = IndexBuilder::new(chrom_column, pos_column)
        .delimiter(delimiter)
        .skip_lines(skip_lines)
        .index_rate(index_rate);
    if let Some(prefix) = ignore_startswith {
        builder = builder.ignore_startswith(prefix);
    }
    builder.build(path)
}

/// Loads the index of a source file from its sidecar
pub fn load_index<P: AsRef<Path>>(path: P) -> Result<LocusIndex> {
    LocusIndex::open(path)
}

/// Moves `reader` to the first line carrying `chrom:pos`
///
/// See [`LocusIndex::goto`].
pub fn goto<R: BufRead + Seek>(
    reader: &mut R,
    index: &LocusIndex,
    chrom: &str,
    pos: u64,
) -> Result<bool> {
    index.goto(reader, chrom, pos)
}
