//! Archive Error Types
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction, matching the convention used by the other crates.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// An archive error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for archive operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The container could not be opened at all (corrupt, unsupported, or
    /// unreadable). The caller records the fingerprint with a rescan flag
    /// and moves on.
    #[display("cannot open container: {}", _0.display())]
    Open(#[error(not(source))] PathBuf),
    /// The container format could not be determined from extension or
    /// magic bytes.
    #[display("unrecognized container format")]
    UnknownFormat,
    /// A named entry does not exist in the container.
    #[display("entry not found: {_0}")]
    EntryNotFound(#[error(not(source))] String),
    /// An entry's declared size did not match the bytes actually read.
    /// The entry is skipped, never silently truncated or padded.
    #[display("entry size mismatch: {entry} (declared {declared}, read {read})")]
    SizeMismatch {
        #[error(not(source))]
        entry: String,
        declared: u64,
        read: u64,
    },
    /// An entry's declared size exceeds the per-entry cap, so it is never
    /// pulled into memory.
    #[display("entry too large: {entry} ({declared} bytes, cap {cap})")]
    EntryTooLarge {
        #[error(not(source))]
        entry: String,
        declared: u64,
        cap: u64,
    },
    /// Entry enumeration exceeded its count or wall-clock budget.
    #[display("enumeration budget exhausted after {_0} entries")]
    BudgetExhausted(#[error(not(source))] usize),
    /// I/O failure while reading container data.
    #[display("container read error")]
    Read,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        false
    }
}
