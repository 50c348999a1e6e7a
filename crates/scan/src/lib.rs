//! Scan orchestration.
//!
//! Ties the other crates together: walks the library directory, gates
//! archives through fingerprint change detection, runs the extractors over
//! entries read in memory, and reconciles candidates against the catalog
//! with a size-based duplicate heuristic. One pass is one stream of
//! [`ScanEvent`]s.

pub mod dedup;
pub mod error;
pub mod events;
pub mod fingerprint;
mod import;
mod scan;
pub mod walk;

pub use crate::error::{Error, ErrorKind, Result};
pub use crate::events::{ScanEvent, ScanSummary, SkipReason};
pub use crate::fingerprint::HashAlgorithm;
pub use crate::scan::{ScanOptions, scan};
