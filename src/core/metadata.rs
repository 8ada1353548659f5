use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use super::{ChromosomeCodeMap, LineLayout};
use crate::error::{IndexError, Result};

/// Everything needed to interpret an index besides its entries
///
/// Written once when the index is built, read-only thereafter.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexMetadata {
    /// Where the locus fields sit in each line
    pub layout: LineLayout,

    /// Index rate the entries were sampled with
    pub index_rate: f64,

    /// Size of the source file when the index was built
    pub source_bytes: u64,

    /// Chromosome codes assigned during the build
    pub chromosomes: ChromosomeCodeMap,
}
impl IndexMetadata {
    /// Serializes the metadata as the payload of the `META` section
    pub fn write_bytes<W: Write>(&self, writer: &mut W) -> Result<()> {
        write_str(writer, &self.layout.delimiter)?;
        writer.write_u32::<LittleEndian>(self.layout.chrom_column as u32)?;
        writer.write_u32::<LittleEndian>(self.layout.pos_column as u32)?;
        writer.write_f64::<LittleEndian>(self.index_rate)?;
        writer.write_u64::<LittleEndian>(self.source_bytes)?;
        writer.write_u32::<LittleEndian>(self.chromosomes.len() as u32)?;
        for (label, code) in self.chromosomes.iter() {
            write_str(writer, label)?;
            writer.write_u32::<LittleEndian>(code)?;
        }
        Ok(())
    }

    /// Decodes a `META` section payload
    ///
    /// The payload must be consumed exactly; trailing bytes are reported as corruption.
    pub fn from_bytes(mut bytes: &[u8]) -> Result<Self> {
        let reader = &mut bytes;
        let delimiter = read_str(reader)?;
        let chrom_column = read_u32(reader)? as usize;
        let pos_column = read_u32(reader)? as usize;
        let index_rate = reader.read_f64::<LittleEndian>().map_err(truncated_metadata)?;
        let source_bytes = reader.read_u64::<LittleEndian>().map_err(truncated_metadata)?;

        let num_chroms = read_u32(reader)?;
        // Each pair takes at least 8 bytes, which bounds a corrupt count
        let mut pairs = Vec::with_capacity((num_chroms as usize).min(reader.len() / 8));
        for _ in 0..num_chroms {
            let label = read_str(reader)?;
            let code = read_u32(reader)?;
            pairs.push((label, code));
        }
        let chromosomes = ChromosomeCodeMap::from_pairs(pairs)?;

        if !reader.is_empty() {
            return Err(IndexError::InvalidMetadata(format!(
                "{} trailing bytes after metadata",
                reader.len()
            ))
            .into());
        }
        if delimiter.is_empty() || chrom_column == pos_column {
            return Err(IndexError::InvalidMetadata("invalid line layout".to_string()).into());
        }

        Ok(Self {
            layout: LineLayout {
                delimiter,
                chrom_column,
                pos_column,
            },
            index_rate,
            source_bytes,
            chromosomes,
        })
    }
}

fn truncated_metadata(_: std::io::Error) -> IndexError {
    IndexError::InvalidMetadata("metadata section is truncated".to_string())
}

fn read_u32<R: Read>(reader: &mut R) -> Result<u32> {
    Ok(reader.read_u32::<LittleEndian>().map_err(truncated_metadata)?)
}

fn write_str<W: Write>(writer: &mut W, value: &str) -> Result<()> {
    writer.write_u32::<LittleEndian>(value.len() as u32)?;
    writer.write_all(value.as_bytes())?;
    Ok(())
}

fn read_str(reader: &mut &[u8]) -> Result<String> {
    let len = read_u32(reader)? as usize;
    if reader.len() < len {
        return Err(IndexError::InvalidMetadata("metadata section is truncated".to_string()).into());
    }
    let (head, tail) = reader.split_at(len);
    let value = std::str::from_utf8(head)
        .map_err(|e| IndexError::InvalidMetadata(format!("invalid UTF-8 ({e})")))?
        .to_string();
    *reader = tail;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use byteorder::ByteOrder;

    use super::*;

    fn sample_metadata() -> IndexMetadata {
        let mut chromosomes = ChromosomeCodeMap::new();
        for chrom in ["1", "2", "X"] {
            chromosomes.get_or_insert(chrom);
        }
        IndexMetadata {
            layout: LineLayout::new("\t", 0, 1),
            index_rate: 0.25,
            source_bytes: 4096,
            chromosomes,
        }
    }

    #[test]
    fn test_metadata_roundtrip() -> Result<()> {
        let metadata = sample_metadata();
        let mut buf = Vec::new();
        metadata.write_bytes(&mut buf)?;
        assert_eq!(IndexMetadata::from_bytes(&buf)?, metadata);
        Ok(())
    }

    #[test]
    fn test_metadata_truncated() -> Result<()> {
        let mut buf = Vec::new();
        sample_metadata().write_bytes(&mut buf)?;
        buf.truncate(buf.len() - 3);
        let err = IndexMetadata::from_bytes(&buf).unwrap_err();
        assert!(err.is_index_mismatch());
        Ok(())
    }

    #[test]
    fn test_metadata_corrupt_chromosome_count() -> Result<()> {
        let mut buf = Vec::new();
        sample_metadata().write_bytes(&mut buf)?;
        // delimiter (4 + 1), columns (4 + 4), rate (8), source size (8)
        let count_at = 29;
        assert_eq!(LittleEndian::read_u32(&buf[count_at..]), 3);
        LittleEndian::write_u32(&mut buf[count_at..], u32::MAX);
        let err = IndexMetadata::from_bytes(&buf).unwrap_err();
        assert!(err.is_index_mismatch());
        Ok(())
    }

    #[test]
    fn test_metadata_trailing_bytes() -> Result<()> {
        let mut buf = Vec::new();
        sample_metadata().write_bytes(&mut buf)?;
        buf.push(0);
        assert!(IndexMetadata::from_bytes(&buf).is_err());
        Ok(())
    }
}
