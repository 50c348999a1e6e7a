//! Container traversal without full extraction.
//!
//! Books ship inside zip, rar, 7z and (optionally filtered) tar containers.
//! This crate opens a container from a path or an in-memory buffer, lists
//! its entries under an enumeration budget, and pulls individual entries
//! into memory under a per-entry size cap. Nothing is ever unpacked to a
//! staging directory.
//!
//! The container format is sniffed from magic bytes first and the file
//! extension second, so a `.zip` that is really a rar still opens.

pub mod budget;
pub mod error;
pub mod filter;
mod reader;

use std::fs::File;
use std::io::{Cursor, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use exn::{OptionExt, ResultExt};

pub use crate::budget::{DEFAULT_MAX_ENTRIES, DEFAULT_TIMEOUT, EnumerationBudget};
pub use crate::error::{Error, ErrorKind, Result};
pub use crate::filter::Filter;

/// Default per-entry size cap: entries larger than this are never read
/// into memory.
pub const DEFAULT_MAX_ENTRY_SIZE: u64 = 100 * 1024 * 1024;

/// How many leading bytes are sniffed for format detection. Enough to
/// reach the ustar magic at offset 257.
const SNIFF_LEN: usize = 512;

/// Supported container families.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArchiveKind {
    Zip,
    Rar,
    SevenZ,
    /// Plain or filter-compressed tar (`.tar`, `.tar.gz`, `.tgz`, ...).
    Tar,
}

impl ArchiveKind {
    /// Guess the container family from a file extension.
    pub fn from_extension(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "zip" => Some(Self::Zip),
            "rar" => Some(Self::Rar),
            "7z" => Some(Self::SevenZ),
            "tar" | "tgz" | "tbz2" | "txz" => Some(Self::Tar),
            // A bare filter extension only means tar when stacked on .tar.
            "gz" | "bz2" | "xz" | "zst" => {
                let stem = Path::new(path.file_stem()?);
                matches!(stem.extension()?.to_str()?, "tar").then_some(Self::Tar)
            }
            _ => None,
        }
    }

    /// Identify the container family from its leading bytes.
    ///
    /// A compression-filter signature implies a filtered tar: none of the
    /// other families are ever distributed behind an outer filter.
    pub fn from_magic_bytes(head: &[u8]) -> Option<Self> {
        if head.starts_with(b"PK\x03\x04") || head.starts_with(b"PK\x05\x06") {
            return Some(Self::Zip);
        }
        if head.starts_with(b"Rar!") {
            return Some(Self::Rar);
        }
        if head.starts_with(b"7z\xbc\xaf\x27\x1c") {
            return Some(Self::SevenZ);
        }
        if head.len() > 262 && &head[257..262] == b"ustar" {
            return Some(Self::Tar);
        }
        if Filter::from_magic_bytes(head) != Filter::None {
            return Some(Self::Tar);
        }
        None
    }
}

/// Where the container bytes live.
///
/// In-memory sources cover nested containers (an epub pulled out of a zip)
/// without a round-trip through the filesystem.
#[derive(Debug)]
pub enum ArchiveSource {
    Path(PathBuf),
    Memory(Vec<u8>),
}

impl ArchiveSource {
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Path(path) => Some(path),
            Self::Memory(_) => None,
        }
    }

    pub(crate) fn reader(&self) -> Result<SourceReader<'_>> {
        Ok(match self {
            Self::Path(path) => {
                SourceReader::File(File::open(path).or_raise(|| ErrorKind::Open(path.clone()))?)
            }
            Self::Memory(bytes) => SourceReader::Memory(Cursor::new(bytes.as_slice())),
        })
    }

    pub(crate) fn len(&self) -> Result<u64> {
        Ok(match self {
            Self::Path(path) => {
                std::fs::metadata(path).or_raise(|| ErrorKind::Open(path.clone()))?.len()
            }
            Self::Memory(bytes) => bytes.len() as u64,
        })
    }

    fn head(&self) -> Result<Vec<u8>> {
        let mut reader = self.reader()?;
        let mut head = vec![0u8; SNIFF_LEN];
        let mut filled = 0;
        // Plain read loop instead of read_exact: sources shorter than the
        // sniff window are still valid containers.
        while filled < head.len() {
            let n = reader.read(&mut head[filled..]).or_raise(|| ErrorKind::Read)?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        head.truncate(filled);
        Ok(head)
    }
}

/// A `Read + Seek` over either source variant, reopened per operation.
pub(crate) enum SourceReader<'a> {
    File(File),
    Memory(Cursor<&'a [u8]>),
}

impl Read for SourceReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            Self::File(file) => file.read(buf),
            Self::Memory(cursor) => cursor.read(buf),
        }
    }
}

impl Seek for SourceReader<'_> {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        match self {
            Self::File(file) => file.seek(pos),
            Self::Memory(cursor) => cursor.seek(pos),
        }
    }
}

/// One entry in a container listing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntryInfo {
    /// Entry path inside the container, `/`-separated.
    pub path: String,
    /// Declared uncompressed size in bytes.
    pub size: u64,
    pub is_file: bool,
}

/// An open container.
///
/// The handle keeps the source, not a decoder: each listing or entry read
/// reopens the underlying stream, so a handle stays cheap to hold across
/// a long scan and never pins decompressor state.
#[derive(Debug)]
pub struct ArchiveHandle {
    source: ArchiveSource,
    kind: ArchiveKind,
    filter: Filter,
    /// Rar extraction is path-only upstream, so in-memory rar sources are
    /// spilled to a tempfile that lives as long as the handle.
    spill: Option<tempfile::NamedTempFile>,
}

impl ArchiveHandle {
    /// Open a container, sniffing its format from magic bytes with the
    /// file extension as a fallback.
    pub fn open(source: ArchiveSource) -> Result<Self> {
        let head = source.head()?;
        let kind = ArchiveKind::from_magic_bytes(&head)
            .or_else(|| source.path().and_then(ArchiveKind::from_extension))
            .ok_or_raise(|| ErrorKind::UnknownFormat)?;
        Self::open_as(source, kind)
    }

    /// Open a container as a known format, skipping detection.
    pub fn open_as(source: ArchiveSource, kind: ArchiveKind) -> Result<Self> {
        let filter = match kind {
            ArchiveKind::Tar => Filter::from_magic_bytes(&source.head()?),
            _ => Filter::None,
        };
        let spill = match (&source, kind) {
            (ArchiveSource::Memory(bytes), ArchiveKind::Rar) => {
                Some(reader::rar::spill_to_tempfile(bytes)?)
            }
            _ => None,
        };
        Ok(Self { source, kind, filter, spill })
    }

    pub fn kind(&self) -> ArchiveKind {
        self.kind
    }

    /// The on-disk path backing rar operations.
    fn rar_path(&self) -> &Path {
        match &self.spill {
            Some(spill) => spill.path(),
            None => match &self.source {
                ArchiveSource::Path(path) => path,
                // open_as spills every in-memory rar source.
                ArchiveSource::Memory(_) => unreachable!("in-memory rar without spill file"),
            },
        }
    }

    /// List the container's entries, charging each one against `budget`.
    pub fn entries(&self, budget: &mut EnumerationBudget) -> Result<Vec<EntryInfo>> {
        match self.kind {
            ArchiveKind::Zip => reader::zip::entries(&self.source, budget),
            ArchiveKind::Rar => reader::rar::entries(self.rar_path(), budget),
            ArchiveKind::SevenZ => reader::sevenz::entries(&self.source, budget),
            ArchiveKind::Tar => reader::tar::entries(&self.source, self.filter, budget),
        }
    }

    /// Read a single entry into memory.
    ///
    /// Fails with [`ErrorKind::EntryTooLarge`] before reading anything if
    /// the declared size exceeds `max_size`, and with
    /// [`ErrorKind::SizeMismatch`] if the bytes actually decoded differ
    /// from the declared size.
    pub fn read_entry(&self, entry: &str, max_size: u64) -> Result<Vec<u8>> {
        match self.kind {
            ArchiveKind::Zip => reader::zip::read_entry(&self.source, entry, max_size),
            ArchiveKind::Rar => reader::rar::read_entry(self.rar_path(), entry, max_size),
            ArchiveKind::SevenZ => reader::sevenz::read_entry(&self.source, entry, max_size),
            ArchiveKind::Tar => reader::tar::read_entry(&self.source, self.filter, entry, max_size),
        }
    }
}

/// Check declared size against the cap before any bytes move.
pub(crate) fn check_cap(entry: &str, declared: u64, cap: u64) -> Result<()> {
    if declared > cap {
        exn::bail!(ErrorKind::EntryTooLarge { entry: entry.to_owned(), declared, cap });
    }
    Ok(())
}

/// Check bytes read against the declared size after the read.
pub(crate) fn check_size(entry: &str, declared: u64, read: usize) -> Result<()> {
    if read as u64 != declared {
        exn::bail!(ErrorKind::SizeMismatch {
            entry: entry.to_owned(),
            declared,
            read: read as u64,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("books.zip", Some(ArchiveKind::Zip))]
    #[case("books.RAR", Some(ArchiveKind::Rar))]
    #[case("books.7z", Some(ArchiveKind::SevenZ))]
    #[case("books.tar", Some(ArchiveKind::Tar))]
    #[case("books.tar.gz", Some(ArchiveKind::Tar))]
    #[case("books.tgz", Some(ArchiveKind::Tar))]
    #[case("books.tar.zst", Some(ArchiveKind::Tar))]
    #[case("book.fb2.gz", None)]
    #[case("book.fb2", None)]
    fn kind_from_extension(#[case] name: &str, #[case] expected: Option<ArchiveKind>) {
        assert_eq!(ArchiveKind::from_extension(Path::new(name)), expected);
    }

    #[test]
    fn magic_bytes_win_over_extension() {
        // A rar renamed to .zip must still open as rar.
        let head = b"Rar!\x1a\x07\x01\x00";
        assert_eq!(ArchiveKind::from_magic_bytes(head), Some(ArchiveKind::Rar));
    }

    #[test]
    fn gzip_magic_means_filtered_tar() {
        assert_eq!(ArchiveKind::from_magic_bytes(&[0x1f, 0x8b, 0x08]), Some(ArchiveKind::Tar));
    }

    #[test]
    fn ustar_magic_detected_at_offset() {
        let mut head = vec![0u8; 512];
        head[257..262].copy_from_slice(b"ustar");
        assert_eq!(ArchiveKind::from_magic_bytes(&head), Some(ArchiveKind::Tar));
    }

    #[test]
    fn unknown_bytes_and_extension_fail_open() {
        let err = ArchiveHandle::open(ArchiveSource::Memory(b"not an archive".to_vec()))
            .expect_err("garbage must not open");
        assert!(matches!(&*err, ErrorKind::UnknownFormat));
    }
}
