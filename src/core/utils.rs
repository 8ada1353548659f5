use std::io::BufRead;

use crate::{LOCUS_MAGIC, Result};

/// Reads one raw line (including its terminator) into `buf`, returning the number of bytes consumed
///
/// A return value of zero means the reader is exhausted.
pub(crate) fn read_line<R: BufRead>(reader: &mut R, buf: &mut Vec<u8>) -> Result<usize> {
    buf.clear();
    Ok(reader.read_until(b'\n', buf)?)
}

/// Strips the trailing `\n` / `\r\n` from a raw line
pub(crate) fn trim_line(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// Describes where the locus fields sit in each record of a source file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineLayout {
    /// Field separator (may be longer than one character)
    pub delimiter: String,

    /// Zero-based column holding the chromosome label
    pub chrom_column: usize,

    /// Zero-based column holding the position
    pub pos_column: usize,
}
impl LineLayout {
    #[must_use]
    pub fn new(delimiter: &str, chrom_column: usize, pos_column: usize) -> Self {
        Self {
            delimiter: delimiter.to_string(),
            chrom_column,
            pos_column,
        }
    }

    /// Decodes the raw chromosome label and position of a trimmed line
    ///
    /// On failure the reason is returned so callers can attach the byte offset
    /// and the error kind relevant to them.
    pub fn locus<'a>(&self, line: &'a [u8]) -> std::result::Result<(&'a str, u64), String> {
        let text = std::str::from_utf8(line).map_err(|e| format!("invalid UTF-8 ({e})"))?;
        let last = self.chrom_column.max(self.pos_column);

        let mut chrom = None;
        let mut pos = None;
        for (idx, field) in text.split(self.delimiter.as_str()).enumerate().take(last + 1) {
            if idx == self.chrom_column {
                chrom = Some(field);
            } else if idx == self.pos_column {
                pos = Some(field);
            }
        }

        let (Some(chrom), Some(pos)) = (chrom, pos) else {
            return Err(format!("expected at least {} fields", last + 1));
        };
        let position = pos
            .trim()
            .parse::<u64>()
            .map_err(|_| format!("invalid position '{pos}'"))?;
        if position >= LOCUS_MAGIC {
            return Err(format!("position {position} is out of range"));
        }
        Ok((chrom, position))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trim_line() {
        assert_eq!(trim_line(b"1\t2\n"), b"1\t2");
        assert_eq!(trim_line(b"1\t2\r\n"), b"1\t2");
        assert_eq!(trim_line(b"1\t2"), b"1\t2");
        assert_eq!(trim_line(b"\n"), b"");
    }

    #[test]
    fn test_read_line() -> Result<()> {
        let mut reader: &[u8] = b"a\nbb\n";
        let mut buf = Vec::new();
        assert_eq!(read_line(&mut reader, &mut buf)?, 2);
        assert_eq!(read_line(&mut reader, &mut buf)?, 3);
        assert_eq!(buf, b"bb\n");
        assert_eq!(read_line(&mut reader, &mut buf)?, 0);
        Ok(())
    }

    #[test]
    fn test_locus_tab() {
        let layout = LineLayout::new("\t", 0, 1);
        assert_eq!(layout.locus(b"chr2\t11\tgibberish"), Ok(("chr2", 11)));
    }

    #[test]
    fn test_locus_reordered_columns() {
        let layout = LineLayout::new(",", 3, 1);
        assert_eq!(layout.locus(b"rs1,12345,A,chrX"), Ok(("chrX", 12345)));
    }

    #[test]
    fn test_locus_multichar_delimiter() {
        let layout = LineLayout::new("::", 0, 1);
        assert_eq!(layout.locus(b"3::9::x"), Ok(("3", 9)));
    }

    #[test]
    fn test_locus_too_few_fields() {
        let layout = LineLayout::new("\t", 0, 2);
        assert!(layout.locus(b"1\t2").is_err());
    }

    #[test]
    fn test_locus_non_numeric_position() {
        let layout = LineLayout::new("\t", 0, 1);
        let reason = layout.locus(b"1\tabc").unwrap_err();
        assert!(reason.contains("abc"));
        assert!(layout.locus(b"1\t-5").is_err());
    }

    #[test]
    fn test_locus_position_out_of_range() {
        let layout = LineLayout::new("\t", 0, 1);
        assert_eq!(layout.locus(b"1\t999999999"), Ok(("1", 999_999_999)));
        assert!(layout.locus(b"1\t1000000000").is_err());
        assert!(layout.locus(b"1\t18446744073709551615").is_err());
    }
}
