//! Per-format backends. Each exposes `entries` and `read_entry` free
//! functions; dispatch lives on [`crate::ArchiveHandle`].

pub(crate) mod rar;
pub(crate) mod sevenz;
pub(crate) mod tar;
pub(crate) mod zip;
