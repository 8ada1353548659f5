//! Locus lookup against a loaded index
//!
//! [`LocusIndex::goto`] binary-searches the entries for the lower bound of the
//! target locus code and then distinguishes three brackets:
//!
//! * before the first entry: the first data line is always indexed, so the
//!   locus cannot be in the file and no scan happens;
//! * after the last entry: the scan runs from the last entry to end of file;
//! * between two entries: the scan runs from the lower entry up to the upper one.
//!
//! An exact entry hit needs no scan at all. On success the caller's reader is
//! left at the start of the matching line; on failure its position is unspecified.

use std::fs;
use std::io::{BufRead, Seek, SeekFrom};
use std::path::Path;

use log::{debug, info, warn};

use crate::{
    IndexBuilder, LOCUS_MAGIC,
    core::{
        IndexEntry, IndexMetadata, normalize_chrom,
        utils::{read_line, trim_line},
    },
    error::{IndexError, QueryError, Result},
    store::{read_index, sidecar_path, write_index},
};

/// A loaded, immutable locus index
///
/// The index holds no file handle: any number of readers over the same
/// source may be resolved against one shared index.
#[derive(Debug, Clone)]
pub struct LocusIndex {
    pub(crate) metadata: IndexMetadata,

    /// Entries in strictly ascending code order
    pub(crate) entries: Vec<IndexEntry>,
}

impl LocusIndex {
    pub(crate) fn from_parts(metadata: IndexMetadata, entries: Vec<IndexEntry>) -> Self {
        Self { metadata, entries }
    }

    /// Loads the index of a source file from its sidecar
    ///
    /// Fails with [`IndexError::ByteSizeMismatch`] if the source changed size
    /// since the index was built.
    pub fn open<P: AsRef<Path>>(source: P) -> Result<Self> {
        let source = source.as_ref();
        let sidecar = sidecar_path(source)?;
        let index = read_index(&sidecar)?;

        let current = fs::metadata(source)?.len();
        if current != index.metadata.source_bytes {
            return Err(IndexError::ByteSizeMismatch(current, index.metadata.source_bytes).into());
        }
        info!(
            "Loaded index of {} ({} entries, {} chromosomes)",
            source.display(),
            index.len(),
            index.metadata.chromosomes.len()
        );
        Ok(index)
    }

    /// Loads an index directly from a sidecar path, skipping the staleness check
    pub fn from_path<P: AsRef<Path>>(sidecar: P) -> Result<Self> {
        read_index(sidecar)
    }

    /// Loads the index of a source file, building it first if it is missing or unusable
    pub fn open_or_build<P: AsRef<Path>>(source: P, builder: &IndexBuilder) -> Result<Self> {
        let source = source.as_ref();
        if sidecar_path(source)?.exists() {
            match Self::open(source) {
                Ok(index) => return Ok(index),
                Err(e) if e.is_index_mismatch() => {
                    warn!("Rebuilding index of {}: {e}", source.display());
                }
                Err(e) => return Err(e),
            }
        }
        builder.build_with_stats(source).map(|output| output.index)
    }

    /// Writes the index to a sidecar path
    pub fn write<P: AsRef<Path>>(&self, sidecar: P) -> Result<()> {
        write_index(sidecar, self)
    }

    #[must_use]
    pub fn metadata(&self) -> &IndexMetadata {
        &self.metadata
    }

    #[must_use]
    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over the indexed chromosome labels in code order
    pub fn chromosomes(&self) -> impl Iterator<Item = &str> {
        self.metadata.chromosomes.iter().map(|(label, _)| label)
    }

    /// Positions `reader` at the start of the first line carrying `chrom:pos`
    ///
    /// Returns `Ok(false)` if the chromosome is indexed but the locus is not in
    /// the file, and a [`QueryError::ChromosomeNotIndexed`] error if the
    /// chromosome was never seen while building the index.
    pub fn goto<R: BufRead + Seek>(&self, reader: &mut R, chrom: &str, pos: u64) -> Result<bool> {
        let target = self.metadata.chromosomes.encode(chrom, pos)?;
        if pos >= LOCUS_MAGIC {
            // No indexed line can carry such a position
            return Ok(false);
        }
        let idx = self.entries.partition_point(|entry| entry.code < target);

        if let Some(entry) = self.entries.get(idx) {
            if entry.code == target {
                reader.seek(SeekFrom::Start(entry.offset))?;
                return Ok(true);
            }
        }

        if idx == 0 {
            // Before the first data line
            Ok(false)
        } else if idx == self.entries.len() {
            let left = self.entries[idx - 1].offset;
            self.goto_fine(reader, chrom, pos, left, None)
        } else {
            let left = self.entries[idx - 1].offset;
            let right = self.entries[idx].offset;
            self.goto_fine(reader, chrom, pos, left, Some(right))
        }
    }

    /// Scans lines from byte `left` for `chrom:pos`, giving up at byte `right` or end of file
    ///
    /// `left` must be a line start. On a match the reader is moved back to the
    /// start of the matching line.
    pub fn goto_fine<R: BufRead + Seek>(
        &self,
        reader: &mut R,
        chrom: &str,
        pos: u64,
        left: u64,
        right: Option<u64>,
    ) -> Result<bool> {
        debug!("Scanning bytes {left}..{right:?} for {chrom}:{pos}");
        let chrom = normalize_chrom(chrom);
        reader.seek(SeekFrom::Start(left))?;

        let mut buf = Vec::new();
        let mut offset = left;
        loop {
            if right.is_some_and(|right| offset >= right) {
                return Ok(false);
            }
            let len = read_line(reader, &mut buf)?;
            if len == 0 {
                return Ok(false);
            }

            let line = trim_line(&buf);
            if !line.is_empty() {
                let (line_chrom, line_pos) = self
                    .metadata
                    .layout
                    .locus(line)
                    .map_err(|reason| QueryError::MalformedLine { offset, reason })?;
                if line_pos == pos && normalize_chrom(line_chrom) == chrom {
                    reader.seek(SeekFrom::Start(offset))?;
                    return Ok(true);
                }
            }
            offset += len as u64;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Read};

    use super::*;
    use crate::core::{ChromosomeCodeMap, LineLayout, encode_locus};

    /// Three lines per chromosome, one anchor per chromosome
    const DATA: &[u8] = b"1\t10\ta\n1\t20\tb\n1\t30\tc\n2\t5\td\n2\t6\te\n2\t6\tf\n";

    fn sparse_index() -> LocusIndex {
        let mut chromosomes = ChromosomeCodeMap::new();
        chromosomes.get_or_insert("1");
        chromosomes.get_or_insert("2");
        chromosomes.get_or_insert("3");
        let metadata = IndexMetadata {
            layout: LineLayout::new("\t", 0, 1),
            index_rate: 0.3,
            source_bytes: DATA.len() as u64,
            chromosomes,
        };
        let entries = vec![IndexEntry::new(encode_locus(1, 10), 0), IndexEntry::new(encode_locus(2, 5), 21)];
        LocusIndex::from_parts(metadata, entries)
    }

    fn current_line<R: BufRead>(reader: &mut R) -> String {
        let mut line = String::new();
        reader.read_line(&mut line).unwrap();
        line
    }

    #[test]
    fn test_exact_entry() -> Result<()> {
        let mut reader = Cursor::new(DATA);
        assert!(sparse_index().goto(&mut reader, "chr2", 5)?);
        assert_eq!(current_line(&mut reader), "2\t5\td\n");
        Ok(())
    }

    #[test]
    fn test_interior_bracket() -> Result<()> {
        let mut reader = Cursor::new(DATA);
        assert!(sparse_index().goto(&mut reader, "1", 30)?);
        assert_eq!(current_line(&mut reader), "1\t30\tc\n");

        assert!(!sparse_index().goto(&mut reader, "1", 25)?);
        Ok(())
    }

    #[test]
    fn test_after_last_entry() -> Result<()> {
        let mut reader = Cursor::new(DATA);
        assert!(sparse_index().goto(&mut reader, "2", 6)?);
        assert_eq!(current_line(&mut reader), "2\t6\te\n");

        assert!(!sparse_index().goto(&mut reader, "2", 7)?);
        // indexed chromosome with no lines at all
        assert!(!sparse_index().goto(&mut reader, "3", 1)?);
        Ok(())
    }

    #[test]
    fn test_before_first_entry() -> Result<()> {
        let mut reader = Cursor::new(DATA);
        reader.seek(SeekFrom::Start(7))?;
        assert!(!sparse_index().goto(&mut reader, "1", 9)?);
        // no scan happened
        assert_eq!(reader.position(), 7);
        Ok(())
    }

    #[test]
    fn test_position_out_of_range() -> Result<()> {
        let mut reader = Cursor::new(DATA);
        assert!(!sparse_index().goto(&mut reader, "2", u64::MAX)?);
        assert!(!sparse_index().goto(&mut reader, "1", LOCUS_MAGIC)?);
        let err = sparse_index().goto(&mut reader, "X", u64::MAX).unwrap_err();
        assert!(err.is_chromosome_not_indexed());
        Ok(())
    }

    #[test]
    fn test_chromosome_not_indexed() {
        let mut reader = Cursor::new(DATA);
        let err = sparse_index().goto(&mut reader, "X", 1).unwrap_err();
        assert!(err.is_chromosome_not_indexed());
    }

    #[test]
    fn test_malformed_line_is_scoped_to_query() -> Result<()> {
        let data = b"1\t10\n1\tbad\n1\t30\n";
        let mut chromosomes = ChromosomeCodeMap::new();
        chromosomes.get_or_insert("1");
        let metadata = IndexMetadata {
            layout: LineLayout::new("\t", 0, 1),
            index_rate: 0.5,
            source_bytes: data.len() as u64,
            chromosomes,
        };
        let index = LocusIndex::from_parts(metadata, vec![IndexEntry::new(encode_locus(1, 10), 0)]);

        let mut reader = Cursor::new(&data[..]);
        let err = index.goto(&mut reader, "1", 30).unwrap_err();
        assert!(matches!(
            err,
            crate::Error::QueryError(QueryError::MalformedLine { offset: 5, .. })
        ));

        // the index remains usable
        assert!(index.goto(&mut reader, "1", 10)?);
        Ok(())
    }

    #[test]
    fn test_goto_fine_right_bound() -> Result<()> {
        let mut reader = Cursor::new(DATA);
        let index = sparse_index();
        // "1\t30" starts at byte 14, a bound at 14 excludes it
        assert!(!index.goto_fine(&mut reader, "1", 30, 0, Some(14))?);
        assert!(index.goto_fine(&mut reader, "1", 30, 0, Some(21))?);

        let mut rest = String::new();
        reader.read_to_string(&mut rest)?;
        assert!(rest.starts_with("1\t30\tc\n"));
        Ok(())
    }

    #[test]
    fn test_empty_index() -> Result<()> {
        let mut index = sparse_index();
        index.entries.clear();
        let mut reader = Cursor::new(DATA);
        assert!(!index.goto(&mut reader, "1", 10)?);
        Ok(())
    }

    #[test]
    fn test_open_detects_stale_index() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let source = dir.path().join("data.tsv");
        fs::write(&source, DATA)?;

        let builder = IndexBuilder::new(0, 1).index_rate(1.0);
        builder.build(&source)?;
        assert_eq!(LocusIndex::open(&source)?.len(), 5);

        let mut extended = DATA.to_vec();
        extended.extend_from_slice(b"3\t1\tg\n");
        fs::write(&source, &extended)?;
        let err = LocusIndex::open(&source).unwrap_err();
        assert!(err.is_index_mismatch());

        let index = LocusIndex::open_or_build(&source, &builder)?;
        assert_eq!(index.len(), 6);
        assert_eq!(index.chromosomes().collect::<Vec<_>>(), vec!["1", "2", "3"]);
        Ok(())
    }

    #[test]
    fn test_write_to_custom_path() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("elsewhere.idx");
        let index = sparse_index();
        index.write(&path)?;

        let loaded = LocusIndex::from_path(&path)?;
        assert_eq!(loaded.entries(), index.entries());
        assert_eq!(loaded.metadata(), index.metadata());

        let mut reader = Cursor::new(DATA);
        assert!(loaded.goto(&mut reader, "1", 20)?);
        assert_eq!(current_line(&mut reader), "1\t20\tb\n");
        Ok(())
    }

    #[test]
    fn test_open_or_build_missing_sidecar() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let source = dir.path().join("data.tsv");
        fs::write(&source, DATA)?;

        let builder = IndexBuilder::new(0, 1).index_rate(1.0);
        let index = LocusIndex::open_or_build(&source, &builder)?;
        assert!(sidecar_path(&source)?.exists());
        assert_eq!(index.entries(), LocusIndex::open(&source)?.entries());
        Ok(())
    }
}
