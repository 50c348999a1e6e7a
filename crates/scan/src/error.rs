//! Scan Error Types
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction, matching the convention used by the other crates.

use derive_more::{Display, Error};

/// A scan error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for scan operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The configured books directory does not exist or cannot be read.
    #[display("books directory is missing or unreadable: {path}")]
    MissingRoot {
        #[error(not(source))]
        path: String,
    },
    /// The catalog store failed in a way a retry did not fix.
    #[display("catalog store unreachable")]
    Catalog,
    /// One book record could not be written; the scan goes on without it.
    #[display("could not store book: {path}")]
    Persist {
        #[error(not(source))]
        path: String,
    },
    /// A file on disk could not be read.
    #[display("could not read file: {path}")]
    Io {
        #[error(not(source))]
        path: String,
    },
    /// Failure while fingerprinting an archive file.
    #[display("could not fingerprint archive: {path}")]
    Fingerprint {
        #[error(not(source))]
        path: String,
    },
    /// The catalog-export import could not be completed.
    #[display("catalog export import failed")]
    Import,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        false
    }
}
