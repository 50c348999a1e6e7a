//! Config Error Types
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction, matching the convention used by the other crates.

use derive_more::{Display, Error};

/// A configuration error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for configuration operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The config file or environment could not be read or deserialized.
    #[display("could not load configuration")]
    Load,
    /// A loaded value fails validation for the requested operation.
    #[display("invalid configuration: {reason}")]
    Invalid {
        #[error(not(source))]
        reason: String,
    },
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            _ => false,
        }
    }
}
