//! Persisted row types for the `books` and `archives` tables.

use colophon_extract::BookMetadata;
use time::OffsetDateTime;

/// Current wall-clock time as unix seconds, the timestamp unit used
/// throughout the schema.
pub fn unix_now() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}

/// Where a book physically lives: a loose file, or an entry inside a
/// container archive.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BookLocation {
    File {
        path: String,
    },
    ArchiveEntry {
        archive_path: String,
        internal_path: String,
    },
}

impl BookLocation {
    /// Display path: the plain path, or `archive_path/internal_path`.
    pub fn display_path(&self) -> String {
        match self {
            Self::File { path } => path.clone(),
            Self::ArchiveEntry { archive_path, internal_path } => {
                format!("{archive_path}/{internal_path}")
            }
        }
    }

    /// The file name component, used for extension and fallback metadata.
    pub fn file_name(&self) -> &str {
        let path = match self {
            Self::File { path } => path,
            Self::ArchiveEntry { internal_path, .. } => internal_path,
        };
        path.rsplit(['/', '\\']).next().unwrap_or(path)
    }
}

/// A persisted book row.
#[derive(Clone, Debug, PartialEq, sqlx::FromRow)]
pub struct BookRecord {
    pub id: i64,
    pub file_path: String,
    pub file_name: String,
    pub file_size: i64,
    pub file_type: String,
    /// Empty string in storage means "not in an archive"; surfaced as
    /// `None` through [`Self::archive_path()`].
    pub archive_path: String,
    pub archive_internal_path: String,
    pub title: String,
    pub author: String,
    pub genre: String,
    pub series: String,
    pub series_number: i64,
    pub year: i64,
    pub language: String,
    pub publisher: String,
    pub description: String,
    pub added: i64,
    pub last_modified: i64,
    pub last_scanned: i64,
    pub file_mtime: i64,
}

impl BookRecord {
    pub fn archive_path(&self) -> Option<&str> {
        (!self.archive_path.is_empty()).then_some(self.archive_path.as_str())
    }

    pub fn archive_internal_path(&self) -> Option<&str> {
        (!self.archive_internal_path.is_empty()).then_some(self.archive_internal_path.as_str())
    }
}

/// A book ready for insertion, before the store assigns id and
/// bookkeeping timestamps.
#[derive(Clone, Debug, PartialEq)]
pub struct NewBook {
    pub file_path: String,
    pub file_name: String,
    pub file_size: i64,
    pub file_type: String,
    pub archive_path: String,
    pub archive_internal_path: String,
    pub title: String,
    pub author: String,
    pub genre: String,
    pub series: String,
    pub series_number: i64,
    pub year: i64,
    pub language: String,
    pub publisher: String,
    pub description: String,
    pub file_mtime: i64,
}

impl NewBook {
    /// Build an insertable row from extracted metadata and a location.
    ///
    /// The metadata must already have the filename fallback applied; the
    /// non-empty title/author invariant is the caller's to uphold.
    pub fn from_metadata(meta: &BookMetadata, location: &BookLocation, file_mtime: i64) -> Self {
        let file_name = location.file_name().to_owned();
        let file_type = file_name.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase()).unwrap_or_default();
        let (archive_path, archive_internal_path) = match location {
            BookLocation::File { .. } => (String::new(), String::new()),
            BookLocation::ArchiveEntry { archive_path, internal_path } => {
                (archive_path.clone(), internal_path.clone())
            }
        };
        Self {
            file_path: location.display_path(),
            file_name,
            file_size: meta.file_size as i64,
            file_type,
            archive_path,
            archive_internal_path,
            title: meta.title.clone(),
            author: meta.author.clone(),
            genre: meta.genre.clone(),
            series: meta.series.clone(),
            series_number: meta.series_number as i64,
            year: meta.year as i64,
            language: meta.language.clone(),
            publisher: meta.publisher.clone(),
            description: meta.description.clone(),
            file_mtime,
        }
    }
}

/// A persisted archive fingerprint row.
#[derive(Clone, Debug, PartialEq, Eq, sqlx::FromRow)]
pub struct ArchiveFingerprint {
    pub archive_path: String,
    pub archive_hash: String,
    pub file_count: i64,
    pub total_size: i64,
    pub last_modified: i64,
    pub last_scanned: i64,
    pub needs_rescan: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::plain("book001.fb2", "book001.fb2")]
    #[case::nested("sub/dir/book001.fb2", "book001.fb2")]
    #[case::backslashes("sub\\dir\\book001.fb2", "book001.fb2")]
    #[case::no_separator("book001", "book001")]
    fn file_name_takes_the_last_component(#[case] internal: &str, #[case] expected: &str) {
        let location = BookLocation::ArchiveEntry {
            archive_path: "/library/a.zip".into(),
            internal_path: internal.into(),
        };
        assert_eq!(location.file_name(), expected);
    }

    #[test]
    fn location_display_paths() {
        let file = BookLocation::File { path: "/library/Doe - Memoirs.fb2".into() };
        assert_eq!(file.display_path(), "/library/Doe - Memoirs.fb2");
        assert_eq!(file.file_name(), "Doe - Memoirs.fb2");

        let entry = BookLocation::ArchiveEntry {
            archive_path: "/library/books01.zip".into(),
            internal_path: "sub/book001.fb2".into(),
        };
        assert_eq!(entry.display_path(), "/library/books01.zip/sub/book001.fb2");
        assert_eq!(entry.file_name(), "book001.fb2");
    }

    #[test]
    fn new_book_from_metadata() {
        let meta = BookMetadata {
            title: "Starfall".into(),
            author: "Sidorov Ivan".into(),
            file_size: 2048,
            ..Default::default()
        };
        let location = BookLocation::ArchiveEntry {
            archive_path: "/library/a.zip".into(),
            internal_path: "book001.FB2".into(),
        };
        let book = NewBook::from_metadata(&meta, &location, 1_700_000_000);
        assert_eq!(book.file_path, "/library/a.zip/book001.FB2");
        assert_eq!(book.file_name, "book001.FB2");
        assert_eq!(book.file_type, "fb2");
        assert_eq!(book.file_size, 2048);
        assert_eq!(book.archive_path, "/library/a.zip");
    }
}
