//! Book metadata extraction.
//!
//! Three extractors share one contract: bytes in, [`BookMetadata`] out,
//! never a hard failure. FB2 is a single XML document, EPUB a zip of
//! documents resolved through `META-INF/container.xml`, INPX a flat
//! 0x04-delimited catalog export. Encoding normalization (UTF-8 with a
//! Windows-1251 fallback) happens before any parsing.

pub mod encoding;
pub mod epub;
pub mod error;
pub mod fb2;
pub mod genres;
pub mod inpx;
pub mod metadata;

pub use crate::error::{Error, ErrorKind, Result};
pub use crate::metadata::{BookMetadata, CoverImage, DEFAULT_DESCRIPTION_LIMIT, UNKNOWN_AUTHOR};

/// Book formats the extractors understand.
///
/// `FilenameOnly` formats are cataloged with filename-derived metadata,
/// the files themselves are never parsed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BookFormat {
    Fb2,
    Epub,
    /// pdf, mobi, txt: known but not parsed.
    FilenameOnly,
}

impl BookFormat {
    /// Classify by file extension. `None` means the file is not a book.
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "fb2" => Some(Self::Fb2),
            "epub" => Some(Self::Epub),
            "pdf" | "mobi" | "txt" => Some(Self::FilenameOnly),
            _ => None,
        }
    }
}

/// Extract metadata from book bytes by declared format, then apply the
/// filename fallback so title and author are never empty.
pub fn extract(bytes: &[u8], format: BookFormat, file_name: &str, description_limit: usize) -> BookMetadata {
    let mut meta = match format {
        // A mislabeled .fb2 that is not a FictionBook document gets the
        // filename treatment instead of a garbage parse.
        BookFormat::Fb2 if fb2::is_fictionbook(&encoding::normalize(bytes)) => {
            fb2::extract(bytes, description_limit)
        }
        BookFormat::Fb2 => BookMetadata { file_size: bytes.len() as u64, ..Default::default() },
        BookFormat::Epub => epub::extract(bytes, description_limit),
        BookFormat::FilenameOnly => {
            BookMetadata { file_size: bytes.len() as u64, ..Default::default() }
        }
    };
    meta.fallback_from_filename(file_name);
    meta
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extraction_always_yields_title_and_author() {
        let meta = extract(b"garbage bytes", BookFormat::Fb2, "Doe - Memoirs.fb2", 1000);
        assert_eq!(meta.title, "Memoirs");
        assert_eq!(meta.author, "Doe");

        let meta = extract(b"%PDF-1.4", BookFormat::FilenameOnly, "report.pdf", 1000);
        assert_eq!(meta.title, "report");
        assert_eq!(meta.author, UNKNOWN_AUTHOR);
    }

    #[test]
    fn format_classification() {
        assert_eq!(BookFormat::from_extension("FB2"), Some(BookFormat::Fb2));
        assert_eq!(BookFormat::from_extension("epub"), Some(BookFormat::Epub));
        assert_eq!(BookFormat::from_extension("mobi"), Some(BookFormat::FilenameOnly));
        assert_eq!(BookFormat::from_extension("zip"), None);
    }
}
