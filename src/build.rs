//! Index construction over sorted, line-oriented source files
//!
//! An index is built once, offline, by an [`IndexBuilder`]. The builder
//! locates the data region (after the literal header lines and any leading
//! comment lines), always records the first data line, and then either
//!
//! 1. walks every line sequentially (`index_rate == 1`, a *dense* index), or
//! 2. jumps through the file in strides sized from a [line estimate](crate::sample),
//!    recording one new locus per stride (`index_rate < 1`, a *sparse* index).
//!
//! In both modes repeated loci keep only their earliest offset, and a locus
//! code that goes backwards aborts the build with an unsorted-input error
//! before anything is written.
//!
//! # Example
//!
//! ```rust,no_run
//! use gtidx::IndexBuilder;
//!
//! # fn main() -> gtidx::Result<()> {
//! let sidecar = IndexBuilder::new(0, 1)
//!     .delimiter("\t")
//!     .skip_lines(1)
//!     .index_rate(0.1)
//!     .build("variants.tsv")?;
//! println!("Index written to {}", sidecar.display());
//! # Ok(())
//! # }
//! ```

use std::fs::{self, File};
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use log::{debug, info, trace, warn};

use crate::{
    DEFAULT_INDEX_RATE, DEFAULT_MAX_LOOKAHEAD, LocusIndex,
    core::{
        ChromosomeCodeMap, IndexEntry, IndexMetadata, LineLayout,
        utils::{read_line, trim_line},
    },
    error::{BuildError, Result},
    sample::estimate_lines,
    store::{sidecar_path, write_index},
};

/// Summary of a completed build
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BuildStats {
    /// Number of entries recorded
    pub entries: usize,

    /// Byte offset of the first data line
    pub data_start: u64,

    /// Number of bytes in the data region
    pub data_bytes: u64,

    /// Estimated mean line length (sparse builds only)
    pub mean_line_length: f64,

    /// Estimated number of data lines (sparse builds only)
    pub approx_line_count: f64,

    /// Distance between probes in bytes (sparse builds only)
    pub seek_jump: Option<u64>,

    /// Probes abandoned after exceeding the lookahead limit
    pub capped_probes: usize,
}

/// Result of [`IndexBuilder::build_with_stats`]
#[derive(Debug, Clone)]
pub struct BuildOutput {
    /// Path of the written sidecar
    pub sidecar: PathBuf,

    /// The index as written to the sidecar
    pub index: LocusIndex,

    pub stats: BuildStats,
}

/// Builder for locus indexes
///
/// Holds the description of the source file (columns, delimiter, header
/// lines) and the sampling parameters. The same builder can index any number
/// of files; no state is shared between builds.
#[derive(Debug, Clone)]
pub struct IndexBuilder {
    layout: LineLayout,
    skip_lines: usize,
    ignore_startswith: Option<String>,
    index_rate: f64,
    max_lookahead: usize,
}

impl IndexBuilder {
    /// Create a new builder for files with the locus in the given zero-based columns
    #[must_use]
    pub fn new(chrom_column: usize, pos_column: usize) -> Self {
        Self {
            layout: LineLayout::new("\t", chrom_column, pos_column),
            skip_lines: 0,
            ignore_startswith: None,
            index_rate: DEFAULT_INDEX_RATE,
            max_lookahead: DEFAULT_MAX_LOOKAHEAD,
        }
    }

    /// Set the field delimiter (default: tab)
    #[must_use]
    pub fn delimiter(mut self, delimiter: &str) -> Self {
        self.layout.delimiter = delimiter.to_string();
        self
    }

    /// Set the number of literal header lines to skip
    #[must_use]
    pub fn skip_lines(mut self, skip_lines: usize) -> Self {
        self.skip_lines = skip_lines;
        self
    }

    /// Skip lines starting with `prefix` that directly follow the header lines
    #[must_use]
    pub fn ignore_startswith(mut self, prefix: &str) -> Self {
        self.ignore_startswith = Some(prefix.to_string());
        self
    }

    /// Set the approximate fraction of lines to index, in (0, 1]
    ///
    /// A rate of 1 produces a dense index covering every distinct locus.
    #[must_use]
    pub fn index_rate(mut self, index_rate: f64) -> Self {
        self.index_rate = index_rate;
        self
    }

    /// Set how many repeated-locus lines a sparse probe may skip before giving up
    #[must_use]
    pub fn max_lookahead(mut self, max_lookahead: usize) -> Self {
        self.max_lookahead = max_lookahead.max(1);
        self
    }

    #[must_use]
    pub fn layout(&self) -> &LineLayout {
        &self.layout
    }

    #[must_use]
    pub fn is_dense(&self) -> bool {
        self.index_rate >= 1.0
    }

    /// Checks the configuration without touching any file
    pub fn validate(&self) -> Result<()> {
        if !(self.index_rate > 0.0 && self.index_rate <= 1.0) {
            return Err(BuildError::InvalidIndexRate(self.index_rate).into());
        }
        if self.layout.chrom_column == self.layout.pos_column {
            return Err(BuildError::DuplicateColumns(self.layout.chrom_column).into());
        }
        if self.layout.delimiter.is_empty() {
            return Err(BuildError::EmptyDelimiter.into());
        }
        Ok(())
    }

    /// Builds the index of `path` and writes it to its sidecar
    ///
    /// Returns the sidecar path.
    pub fn build<P: AsRef<Path>>(&self, path: P) -> Result<PathBuf> {
        self.build_with_stats(path).map(|output| output.sidecar)
    }

    /// Builds the index of `path`, writes it, and returns it along with build statistics
    pub fn build_with_stats<P: AsRef<Path>>(&self, path: P) -> Result<BuildOutput> {
        self.validate()?;
        let path = path.as_ref();
        let sidecar = sidecar_path(path)?;

        // A failed rebuild must not leave the previous sidecar looking valid
        if sidecar.exists() {
            debug!("Removing previous index {}", sidecar.display());
            fs::remove_file(&sidecar)?;
        }

        let file = File::open(path)?;
        let source_bytes = file.metadata()?.len();
        let mut reader = BufReader::new(file);

        info!(
            "Building {} index of {} (index rate {})",
            if self.is_dense() { "dense" } else { "sparse" },
            path.display(),
            self.index_rate
        );
        let (index, stats) = self.index_reader(&mut reader, source_bytes)?;
        write_index(&sidecar, &index)?;
        info!(
            "Wrote {} entries over {} chromosomes to {}",
            stats.entries,
            index.metadata().chromosomes.len(),
            sidecar.display()
        );

        Ok(BuildOutput {
            sidecar,
            index,
            stats,
        })
    }

    /// Indexes an already opened source of `source_bytes` bytes without writing anything
    pub fn index_reader<R: BufRead + Seek>(
        &self,
        reader: &mut R,
        source_bytes: u64,
    ) -> Result<(LocusIndex, BuildStats)> {
        self.validate()?;

        let mut buf = Vec::new();
        let mut chromosomes = ChromosomeCodeMap::new();
        let mut entries = Vec::new();

        let data_start = self.find_data_start(reader, &mut buf)?;
        let mut stats = BuildStats {
            data_start,
            data_bytes: source_bytes.saturating_sub(data_start),
            ..Default::default()
        };
        debug!(
            "Data region starts at byte {} ({} bytes)",
            data_start, stats.data_bytes
        );

        if self.is_dense() {
            self.index_dense(reader, data_start, &mut chromosomes, &mut entries, &mut buf)?;
        } else {
            // The first data line is always indexed
            reader.seek(SeekFrom::Start(data_start))?;
            if let Some((code, offset, _)) =
                self.next_locus(reader, data_start, &mut chromosomes, &mut buf)?
            {
                entries.push(IndexEntry::new(code, offset));
            }
            self.index_sparse(
                reader,
                source_bytes,
                &mut chromosomes,
                &mut entries,
                &mut stats,
                &mut buf,
            )?;
        }
        stats.entries = entries.len();

        let metadata = IndexMetadata {
            layout: self.layout.clone(),
            index_rate: self.index_rate,
            source_bytes,
            chromosomes,
        };
        Ok((LocusIndex::from_parts(metadata, entries), stats))
    }

    /// Skips header and leading comment lines, returning the offset of the first data line
    fn find_data_start<R: BufRead + Seek>(&self, reader: &mut R, buf: &mut Vec<u8>) -> Result<u64> {
        reader.seek(SeekFrom::Start(0))?;
        let mut offset = 0;
        for _ in 0..self.skip_lines {
            let len = read_line(reader, buf)?;
            if len == 0 {
                return Ok(offset);
            }
            offset += len as u64;
        }
        if let Some(prefix) = &self.ignore_startswith {
            loop {
                let len = read_line(reader, buf)?;
                if len == 0 || !buf.starts_with(prefix.as_bytes()) {
                    break;
                }
                offset += len as u64;
            }
        }
        Ok(offset)
    }

    /// Records the first offset of every distinct locus
    fn index_dense<R: BufRead + Seek>(
        &self,
        reader: &mut R,
        data_start: u64,
        chromosomes: &mut ChromosomeCodeMap,
        entries: &mut Vec<IndexEntry>,
        buf: &mut Vec<u8>,
    ) -> Result<()> {
        reader.seek(SeekFrom::Start(data_start))?;
        let mut offset = data_start;
        while let Some((code, line_offset, len)) = self.next_locus(reader, offset, chromosomes, buf)? {
            match entries.last() {
                Some(last) if code == last.code => {}
                Some(last) if code < last.code => {
                    return Err(BuildError::UnsortedInput {
                        offset: line_offset,
                        previous: last.code,
                        found: code,
                    }
                    .into());
                }
                _ => entries.push(IndexEntry::new(code, line_offset)),
            }
            offset = line_offset + len;
        }
        Ok(())
    }

    /// Records one new locus per stride of the data region
    fn index_sparse<R: BufRead + Seek>(
        &self,
        reader: &mut R,
        source_bytes: u64,
        chromosomes: &mut ChromosomeCodeMap,
        entries: &mut Vec<IndexEntry>,
        stats: &mut BuildStats,
        buf: &mut Vec<u8>,
    ) -> Result<()> {
        let Some(first) = entries.first().copied() else {
            return Ok(());
        };

        let estimate = estimate_lines(reader, stats.data_start, stats.data_bytes)?;
        stats.mean_line_length = estimate.mean_line_length;
        stats.approx_line_count = estimate.approx_line_count;

        let target_entries = self.index_rate * estimate.approx_line_count;
        if target_entries <= 0.0 {
            return Ok(());
        }
        let seek_jump = ((stats.data_bytes as f64 / target_entries).ceil() as u64).max(1);
        stats.seek_jump = Some(seek_jump);
        debug!("Sparse stride of {seek_jump} bytes for ~{target_entries:.0} entries");

        let mut current = first.offset;
        while current + seek_jump < source_bytes {
            let probe = current + seek_jump;
            reader.seek(SeekFrom::Start(probe))?;

            // Throw away the partial line the probe landed in
            let partial = read_line(reader, buf)? as u64;
            let run_start = probe + partial;

            let Some((run_code, mut offset, mut len)) =
                self.next_locus(reader, run_start, chromosomes, buf)?
            else {
                break;
            };
            trace!("Probe at byte {probe} landed on code {run_code} at byte {offset}");

            // The landed line may sit inside a run of one locus: skip to the
            // first line of the next locus so the recorded offset is that
            // locus's first occurrence.
            let mut skipped = 0;
            let next = loop {
                let Some((code, line_offset, line_len)) =
                    self.next_locus(reader, offset + len, chromosomes, buf)?
                else {
                    break None;
                };
                if code != run_code {
                    if code < run_code {
                        return Err(BuildError::UnsortedInput {
                            offset: line_offset,
                            previous: run_code,
                            found: code,
                        }
                        .into());
                    }
                    break Some((code, line_offset));
                }
                offset = line_offset;
                len = line_len;
                skipped += 1;
                if skipped >= self.max_lookahead {
                    break None;
                }
            };

            match next {
                Some((code, line_offset)) => {
                    if let Some(last) = entries.last() {
                        if code <= last.code {
                            return Err(BuildError::UnsortedInput {
                                offset: line_offset,
                                previous: last.code,
                                found: code,
                            }
                            .into());
                        }
                    }
                    entries.push(IndexEntry::new(code, line_offset));
                    current = line_offset;
                }
                None if skipped >= self.max_lookahead => {
                    warn!(
                        "Probe at byte {probe} skipped {skipped} lines of one locus without finding a new one; resuming at byte {offset}"
                    );
                    stats.capped_probes += 1;
                    current = offset;
                }
                None => break,
            }
        }
        Ok(())
    }

    /// Reads forward from `offset` to the next non-blank line and decodes its locus
    ///
    /// The reader must be positioned at `offset`. Returns the locus code, the
    /// line offset and the raw line length, or `None` at end of file.
    fn next_locus<R: BufRead>(
        &self,
        reader: &mut R,
        mut offset: u64,
        chromosomes: &mut ChromosomeCodeMap,
        buf: &mut Vec<u8>,
    ) -> Result<Option<(u64, u64, u64)>> {
        loop {
            let len = read_line(reader, buf)? as u64;
            if len == 0 {
                return Ok(None);
            }
            let line = trim_line(buf);
            if line.is_empty() {
                offset += len;
                continue;
            }
            let (chrom, pos) = self
                .layout
                .locus(line)
                .map_err(|reason| BuildError::MalformedLine { offset, reason })?;
            return Ok(Some((chromosomes.encode_or_insert(chrom, pos), offset, len)));
        }
    }
}
