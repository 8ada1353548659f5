use std::error::Error as StdError;

/// Custom Result type for gtidx operations, wrapping the custom [`Error`] type
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for the gtidx library, encompassing all possible error cases
/// that can occur while building, loading, or querying a locus index.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Errors raised while building an index over a source file
    #[error("Error building index: {0}")]
    BuildError(#[from] BuildError),

    /// Errors raised while resolving a locus against a loaded index
    #[error("Error querying index: {0}")]
    QueryError(#[from] QueryError),

    /// Errors related to the on-disk sidecar
    #[error("Error processing Index: {0}")]
    IndexError(#[from] IndexError),

    /// Standard I/O errors
    #[error("Error with IO: {0}")]
    IoError(#[from] std::io::Error),

    /// Generic errors for other unexpected situations
    #[error("Generic error: {0}")]
    GenericError(#[from] Box<dyn StdError + Send + Sync>),
}
impl Error {
    /// Checks if the queried chromosome was never observed while building the index
    #[must_use]
    pub fn is_chromosome_not_indexed(&self) -> bool {
        matches!(self, Self::QueryError(QueryError::ChromosomeNotIndexed(_)))
    }

    /// Checks if the build was aborted because the source file is not sorted
    #[must_use]
    pub fn is_unsorted_input(&self) -> bool {
        matches!(self, Self::BuildError(BuildError::UnsortedInput { .. }))
    }

    /// Checks if the sidecar is unusable for its source file
    ///
    /// This covers both corrupt sidecars and sidecars that are stale with
    /// respect to the current source file. Either way the index must be rebuilt.
    #[must_use]
    pub fn is_index_mismatch(&self) -> bool {
        match self {
            Self::IndexError(err) => err.is_mismatch(),
            _ => false,
        }
    }
}

/// Errors raised while building an index
#[derive(thiserror::Error, Debug)]
pub enum BuildError {
    /// A decoded locus code was not strictly greater than the previously recorded one
    ///
    /// # Fields
    /// * `offset` - Byte offset of the offending line
    /// * `previous` - The last recorded locus code
    /// * `found` - The locus code decoded at `offset`
    #[error("File is not sorted: locus code {found} at byte {offset} follows {previous}")]
    UnsortedInput {
        offset: u64,
        previous: u64,
        found: u64,
    },

    /// The index rate must lie in the half-open interval (0, 1]
    #[error("Invalid index rate: {0} - expecting a value in (0, 1]")]
    InvalidIndexRate(f64),

    /// The chromosome and position columns must differ
    #[error("Chromosome and position columns must differ (both set to {0})")]
    DuplicateColumns(usize),

    /// The field delimiter is empty
    #[error("Field delimiter must not be empty")]
    EmptyDelimiter,

    /// A data line could not be decoded into a locus
    #[error("Malformed line at byte {offset}: {reason}")]
    MalformedLine { offset: u64, reason: String },
}

/// Errors raised while resolving a locus
///
/// These are scoped to a single query: the loaded index stays valid.
#[derive(thiserror::Error, Debug)]
pub enum QueryError {
    /// The queried chromosome was never observed while building the index
    #[error("Chromosome '{0}' not found in the index")]
    ChromosomeNotIndexed(String),

    /// A line in the scanned bracket could not be decoded into a locus
    #[error("Malformed line at byte {offset}: {reason}")]
    MalformedLine { offset: u64, reason: String },
}

/// Errors related to the sidecar file
///
/// These errors occur when the sidecar is corrupt, truncated, or out of sync
/// with the source file it indexes.
#[derive(thiserror::Error, Debug)]
pub enum IndexError {
    /// The file or footer magic number does not match
    #[error("Invalid magic number: {0:?}")]
    InvalidMagicNumber(Vec<u8>),

    /// The sidecar was written by an incompatible format version
    #[error("Unsupported index format version: {0}")]
    UnsupportedVersion(u8),

    /// The sidecar ends before all of its declared content
    #[error("Index is truncated - expected at least {expected} bytes, found {found}")]
    Truncated { expected: u64, found: u64 },

    /// A section tag was not the one expected at its position
    #[error("Invalid section tag {found:?} - expecting {expected:?}")]
    InvalidSectionTag { expected: [u8; 4], found: [u8; 4] },

    /// The entry section length is not a whole number of entries
    #[error("Entry section of {0} bytes is not a multiple of the entry size")]
    InvalidEntrySection(u64),

    /// The footer records a different payload size than found on disk
    #[error("Footer records {expected} section bytes but {found} were found")]
    SectionSizeMismatch { expected: u64, found: u64 },

    /// Entries on disk are not strictly ascending by locus code
    #[error("Index entries are not strictly ascending at entry {0}")]
    UnorderedEntries(usize),

    /// The metadata section could not be decoded
    #[error("Invalid index metadata: {0}")]
    InvalidMetadata(String),

    /// The indexed source file does not exist
    ///
    /// The parameter is the missing file path
    #[error("Index missing upstream file path: {0}")]
    MissingUpstreamFile(String),

    /// The source file changed size since the index was built
    ///
    /// The first parameter is the current source size, the second is the size recorded at build time
    #[error("Mismatch in size between upstream size: {0} and expected index size {1}")]
    ByteSizeMismatch(u64, u64),
}

impl IndexError {
    /// Checks if this error means the sidecar has to be rebuilt
    ///
    /// # Returns
    ///
    /// * `false` for `MissingUpstreamFile` (there is nothing to rebuild from)
    /// * `true` for every other error type
    #[must_use]
    pub fn is_mismatch(&self) -> bool {
        !matches!(self, Self::MissingUpstreamFile(_))
    }
}

/// Trait for converting arbitrary errors into `Error`
pub trait IntoGtidxError {
    fn into_gtidx_error(self) -> Error;
}

impl<E> IntoGtidxError for E
where
    E: StdError + Send + Sync + 'static,
{
    fn into_gtidx_error(self) -> Error {
        Error::GenericError(Box::new(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use thiserror::Error;

    #[derive(Error, Debug)]
    pub enum MyError {
        #[error("Custom error: {0}")]
        CustomError(String),
    }

    #[test]
    fn test_into_gtidx_error() {
        let my_error = MyError::CustomError(String::from("some error"));
        let error = my_error.into_gtidx_error();
        assert!(matches!(error, Error::GenericError(_)));
    }

    // ==================== Predicate Tests ====================

    #[test]
    fn test_is_chromosome_not_indexed() {
        let error: Error = QueryError::ChromosomeNotIndexed("5".to_string()).into();
        assert!(error.is_chromosome_not_indexed());
        assert!(!error.is_unsorted_input());
        assert!(!error.is_index_mismatch());
    }

    #[test]
    fn test_is_unsorted_input() {
        let error: Error = BuildError::UnsortedInput {
            offset: 10,
            previous: 2_000_000_011,
            found: 1_000_000_001,
        }
        .into();
        assert!(error.is_unsorted_input());
        assert!(!error.is_chromosome_not_indexed());
    }

    #[test]
    fn test_is_index_mismatch() {
        let error: Error = IndexError::ByteSizeMismatch(100, 200).into();
        assert!(error.is_index_mismatch());

        let error: Error = IndexError::UnorderedEntries(3).into();
        assert!(error.is_index_mismatch());

        let error: Error = QueryError::ChromosomeNotIndexed("X".to_string()).into();
        assert!(!error.is_index_mismatch());

        let error: Error = IndexError::MissingUpstreamFile("gone.tsv".to_string()).into();
        assert!(!error.is_index_mismatch());
        assert!(format!("{error}").contains("gone.tsv"));
    }

    // ==================== Display Tests ====================

    #[test]
    fn test_unsorted_input_display() {
        let error = BuildError::UnsortedInput {
            offset: 42,
            previous: 7,
            found: 3,
        };
        let error_str = format!("{error}");
        assert!(error_str.contains("42"));
        assert!(error_str.contains("not sorted"));
    }

    #[test]
    fn test_invalid_index_rate_display() {
        let error = BuildError::InvalidIndexRate(1.5);
        assert!(format!("{error}").contains("1.5"));
    }

    #[test]
    fn test_chromosome_not_indexed_display() {
        let error = QueryError::ChromosomeNotIndexed("MT".to_string());
        assert!(format!("{error}").contains("'MT'"));
    }

    #[test]
    fn test_truncated_display() {
        let error = IndexError::Truncated {
            expected: 32,
            found: 12,
        };
        let error_str = format!("{error}");
        assert!(error_str.contains("32"));
        assert!(error_str.contains("12"));
    }

    #[test]
    fn test_error_from_io_error() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let error: Error = io_error.into();
        assert!(matches!(error, Error::IoError(_)));
    }
}
