//! # Sidecar Format
//!
//! A locus index lives next to the file it indexes, at the source path with
//! [`INDEX_SUFFIX`](crate::INDEX_SUFFIX) appended. The sidecar is a small
//! container of two tagged, length-prefixed sections between a fixed header
//! and footer. All integers are little-endian.
//!
//! ```text
//! ┌───────────────────┐
//! │    File Header    │ 16 bytes
//! ├───────────────────┤
//! │ Section Header    │ 16 bytes (tag "META")
//! │ Metadata          │ Variable size, zero padded to 8 bytes
//! ├───────────────────┤
//! │ Section Header    │ 16 bytes (tag "ENTR")
//! │ Entries           │ 16 bytes per (code, offset) pair
//! ├───────────────────┤
//! │   Index Footer    │ 16 bytes
//! └───────────────────┘
//! ```
//!
//! The footer records the number of bytes between header and footer, so a
//! truncated or padded sidecar is detected without parsing the sections.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt, WriteBytesExt};
use bytemuck::{Pod, Zeroable};
use log::debug;
use memmap2::Mmap;

use crate::{
    ENTRY_TAG, FILE_MAGIC, FILE_VERSION, FOOTER_MAGIC, INDEX_SUFFIX, LocusIndex, META_TAG,
    core::{IndexEntry, IndexMetadata, first_unordered},
    error::{IndexError, Result},
};

/// Size of the file header in bytes
pub const SIZE_HEADER: usize = size_of::<FileHeader>();

/// Size of a section header in bytes
pub const SIZE_SECTION_HEADER: usize = 16;

/// Size of the index footer in bytes
pub const SIZE_FOOTER: usize = 16;

/// Returns the sidecar path of a source file
///
/// The path is absolute and derived only from the source path, so every
/// load of the same source resolves to the same sidecar.
pub fn sidecar_path<P: AsRef<Path>>(source: P) -> Result<PathBuf> {
    let source = source.as_ref();
    if !source.is_file() {
        return Err(IndexError::MissingUpstreamFile(source.display().to_string()).into());
    }
    let mut path = std::path::absolute(source)?.into_os_string();
    path.push(INDEX_SUFFIX);
    Ok(PathBuf::from(path))
}

/// The header of a sidecar
///
/// This is stored identically in memory and on disk.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Zeroable, Pod)]
#[repr(C)]
pub struct FileHeader {
    /// Magic number identifying the sidecar format
    magic: [u8; 7],

    /// Format version
    pub version: u8,

    /// Reserved for future use
    reserved: [u8; 8],
}
impl Default for FileHeader {
    fn default() -> Self {
        Self {
            magic: *FILE_MAGIC,
            version: FILE_VERSION,
            reserved: [0; 8],
        }
    }
}
impl FileHeader {
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < SIZE_HEADER {
            return Err(IndexError::Truncated {
                expected: SIZE_HEADER as u64,
                found: bytes.len() as u64,
            }
            .into());
        }
        let header: Self = bytemuck::pod_read_unaligned(&bytes[..SIZE_HEADER]);
        if header.magic != *FILE_MAGIC {
            return Err(IndexError::InvalidMagicNumber(header.magic.to_vec()).into());
        }
        if header.version != FILE_VERSION {
            return Err(IndexError::UnsupportedVersion(header.version).into());
        }
        Ok(header)
    }
}

/// The header in front of each section payload
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SectionHeader {
    /// Section identifier
    pub tag: [u8; 4],

    /// Payload length in bytes (without padding)
    pub len: u64,
}
impl SectionHeader {
    #[must_use]
    pub fn new(tag: [u8; 4], len: u64) -> Self {
        Self { tag, len }
    }

    /// Payload length rounded up to the next multiple of 8
    ///
    /// Returns `None` if a corrupt length cannot be rounded without overflow.
    #[must_use]
    pub fn padded_len(&self) -> Option<u64> {
        self.len.checked_next_multiple_of(8)
    }

    pub fn write_bytes<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.tag)?;
        writer.write_all(&[0; 4])?;
        writer.write_u64::<LittleEndian>(self.len)?;
        Ok(())
    }

    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut tag = [0; 4];
        tag.copy_from_slice(&bytes[..4]);
        Self {
            tag,
            len: LittleEndian::read_u64(&bytes[8..16]),
        }
    }
}

/// The footer of a sidecar
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IndexFooter {
    /// Number of bytes between the file header and the footer
    pub bytes: u64,
}
impl IndexFooter {
    pub fn write_bytes<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u64::<LittleEndian>(self.bytes)?;
        writer.write_all(FOOTER_MAGIC)?;
        Ok(())
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes[8..16] != *FOOTER_MAGIC {
            return Err(IndexError::InvalidMagicNumber(bytes[8..16].to_vec()).into());
        }
        Ok(Self {
            bytes: LittleEndian::read_u64(&bytes[..8]),
        })
    }
}

/// Serializes an index into the sidecar container format
pub fn encode_index<W: Write>(
    writer: &mut W,
    metadata: &IndexMetadata,
    entries: &[IndexEntry],
) -> Result<()> {
    let mut meta = Vec::new();
    metadata.write_bytes(&mut meta)?;
    let meta_header = SectionHeader::new(*META_TAG, meta.len() as u64);
    let entry_header = SectionHeader::new(*ENTRY_TAG, size_of_val(entries) as u64);
    let padding = meta.len().next_multiple_of(8) - meta.len();

    writer.write_all(FileHeader::default().as_bytes())?;

    meta_header.write_bytes(writer)?;
    writer.write_all(&meta)?;
    writer.write_all(&[0; 8][..padding])?;

    entry_header.write_bytes(writer)?;
    bytemuck::cast_slice::<IndexEntry, u64>(entries)
        .iter()
        .try_for_each(|&x| writer.write_u64::<LittleEndian>(x))?;

    let footer = IndexFooter {
        bytes: (2 * SIZE_SECTION_HEADER + meta.len() + padding) as u64 + entry_header.len,
    };
    footer.write_bytes(writer)
}

/// Decodes a full sidecar image
pub fn decode_index(bytes: &[u8]) -> Result<LocusIndex> {
    let min_size = (SIZE_HEADER + SIZE_FOOTER) as u64;
    if (bytes.len() as u64) < min_size {
        return Err(IndexError::Truncated {
            expected: min_size,
            found: bytes.len() as u64,
        }
        .into());
    }

    FileHeader::from_bytes(&bytes[..SIZE_HEADER])?;
    let footer_start = bytes.len() - SIZE_FOOTER;
    let footer = IndexFooter::from_bytes(&bytes[footer_start..])?;

    let mut body = &bytes[SIZE_HEADER..footer_start];
    if footer.bytes != body.len() as u64 {
        return Err(IndexError::SectionSizeMismatch {
            expected: footer.bytes,
            found: body.len() as u64,
        }
        .into());
    }

    let metadata = IndexMetadata::from_bytes(next_section(&mut body, META_TAG)?)?;

    let mut entry_bytes = next_section(&mut body, ENTRY_TAG)?;
    if entry_bytes.len() % size_of::<IndexEntry>() != 0 {
        return Err(IndexError::InvalidEntrySection(entry_bytes.len() as u64).into());
    }
    let mut entries = vec![IndexEntry::default(); entry_bytes.len() / size_of::<IndexEntry>()];
    entry_bytes.read_u64_into::<LittleEndian>(bytemuck::cast_slice_mut::<IndexEntry, u64>(
        &mut entries,
    ))?;

    if !body.is_empty() {
        return Err(IndexError::SectionSizeMismatch {
            expected: footer.bytes,
            found: footer.bytes + body.len() as u64,
        }
        .into());
    }
    if let Some(idx) = first_unordered(&entries) {
        return Err(IndexError::UnorderedEntries(idx).into());
    }

    Ok(LocusIndex::from_parts(metadata, entries))
}

/// Splits the next section payload off the front of `body`, checking its tag
fn next_section<'a>(body: &mut &'a [u8], tag: &[u8; 4]) -> Result<&'a [u8]> {
    if body.len() < SIZE_SECTION_HEADER {
        return Err(IndexError::Truncated {
            expected: SIZE_SECTION_HEADER as u64,
            found: body.len() as u64,
        }
        .into());
    }
    let header = SectionHeader::from_bytes(&body[..SIZE_SECTION_HEADER]);
    if header.tag != *tag {
        return Err(IndexError::InvalidSectionTag {
            expected: *tag,
            found: header.tag,
        }
        .into());
    }

    let rest = &body[SIZE_SECTION_HEADER..];
    let padded_len = header.padded_len().unwrap_or(u64::MAX);
    if (rest.len() as u64) < padded_len {
        return Err(IndexError::Truncated {
            expected: padded_len,
            found: rest.len() as u64,
        }
        .into());
    }
    let (payload, rest) = rest.split_at(padded_len as usize);
    *body = rest;
    Ok(&payload[..header.len as usize])
}

/// Writes an index to `path`, removing the file again if the write fails
pub fn write_index<P: AsRef<Path>>(path: P, index: &LocusIndex) -> Result<()> {
    let path = path.as_ref();
    let mut buffer = Vec::new();
    encode_index(&mut buffer, index.metadata(), index.entries())?;

    if let Err(e) = fs::write(path, &buffer) {
        let _ = fs::remove_file(path);
        return Err(e.into());
    }
    debug!("Wrote {} bytes to {}", buffer.len(), path.display());
    Ok(())
}

/// Reads an index from a sidecar path
pub fn read_index<P: AsRef<Path>>(path: P) -> Result<LocusIndex> {
    let file = File::open(path)?;

    // Mapping an empty file fails on some platforms
    let size = file.metadata()?.len();
    let min_size = (SIZE_HEADER + SIZE_FOOTER) as u64;
    if size < min_size {
        return Err(IndexError::Truncated {
            expected: min_size,
            found: size,
        }
        .into());
    }

    // Load the mmap
    let inner = unsafe { Mmap::map(&file) }?;
    decode_index(&inner)
}
