use bytemuck::{Pod, Zeroable};

/// A single anchor of the index: a locus code and the byte offset of the
/// first line carrying that locus.
///
/// This is stored identically in memory and on disk (as two little-endian u64s).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Zeroable, Pod, Default)]
#[repr(C)]
pub struct IndexEntry {
    /// Encoded locus (see [`encode_locus`](crate::encode_locus))
    pub code: u64,

    /// Byte offset of the line start in the source file
    pub offset: u64,
}
impl IndexEntry {
    #[must_use]
    pub fn new(code: u64, offset: u64) -> Self {
        Self { code, offset }
    }
}

/// Returns the first position where entries stop being strictly ascending
pub(crate) fn first_unordered(entries: &[IndexEntry]) -> Option<usize> {
    entries
        .windows(2)
        .position(|pair| pair[0].code >= pair[1].code)
        .map(|idx| idx + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_size() {
        assert_eq!(size_of::<IndexEntry>(), 16);
    }

    #[test]
    fn test_first_unordered() {
        let sorted = [IndexEntry::new(1, 0), IndexEntry::new(5, 10)];
        assert_eq!(first_unordered(&sorted), None);

        let dup = [
            IndexEntry::new(1, 0),
            IndexEntry::new(5, 10),
            IndexEntry::new(5, 20),
        ];
        assert_eq!(first_unordered(&dup), Some(2));
        assert_eq!(first_unordered(&[]), None);
    }
}
