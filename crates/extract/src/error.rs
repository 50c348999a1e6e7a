//! Extraction Error Types
//!
//! Only catalog-export (INPX) parsing surfaces errors: the FB2/EPUB
//! extractors never fail hard, they return a partial record instead.

use derive_more::{Display, Error};

/// An extraction error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for extraction operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The catalog-export container could not be opened as a zip.
    #[display("catalog export is not a readable container")]
    Container,
    /// The catalog-export container holds no `*.inp` entries.
    #[display("catalog export has no record entries")]
    NoCatalogEntries,
    /// The catalog export parsed but yielded zero acceptable records.
    #[display("catalog export yielded no records")]
    NoRecords,
}

impl ErrorKind {
    pub fn is_retryable(&self) -> bool {
        false
    }
}
