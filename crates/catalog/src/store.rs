//! The storage-agnostic catalog interface.
//!
//! Exactly one implementation is selected at startup (embedded SQLite or
//! client-server MySQL); nothing above this trait ever branches on the
//! backend.

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{ArchiveFingerprint, BookRecord, NewBook};

/// Relational persistence for books and archive fingerprints.
///
/// Both implementations expose the same effective uniqueness semantics on
/// the (file_path, archive_path, archive_internal_path) triple: SQLite
/// through a composite unique index, MySQL through an existence check
/// before insert.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn find_by_path_triple(
        &self,
        file_path: &str,
        archive_path: &str,
        archive_internal_path: &str,
    ) -> Result<Option<BookRecord>>;

    /// Exact (title, author) matches, largest file first.
    async fn find_by_title_author(&self, title: &str, author: &str) -> Result<Vec<BookRecord>>;

    async fn insert_book(&self, book: &NewBook) -> Result<i64>;
    async fn update_book(&self, id: i64, book: &NewBook) -> Result<()>;
    async fn delete_book(&self, id: i64) -> Result<()>;
    async fn get_book(&self, id: i64) -> Result<Option<BookRecord>>;

    async fn upsert_archive_fingerprint(&self, fingerprint: &ArchiveFingerprint) -> Result<()>;
    async fn get_archive_fingerprint(&self, archive_path: &str) -> Result<Option<ArchiveFingerprint>>;
    /// Refresh only `last_scanned` on an unchanged archive.
    async fn touch_archive_last_scanned(&self, archive_path: &str, last_scanned: i64) -> Result<()>;
    /// Set the sticky rescan flag on every fingerprint, hashes untouched.
    async fn mark_all_archives_for_rescan(&self) -> Result<()>;

    // Read queries used by browsers of the catalog.
    async fn list_authors(&self, prefix: &str) -> Result<Vec<String>>;
    async fn list_series(&self, prefix: &str) -> Result<Vec<String>>;
    async fn list_genres(&self) -> Result<Vec<String>>;
    async fn books_by_author(&self, author: &str) -> Result<Vec<BookRecord>>;
    async fn books_by_series(&self, series: &str) -> Result<Vec<BookRecord>>;
    async fn books_by_genre(&self, genre: &str) -> Result<Vec<BookRecord>>;
    /// LIKE search over title, author and series.
    async fn search(&self, query: &str) -> Result<Vec<BookRecord>>;
    async fn count_books(&self) -> Result<i64>;
    async fn count_authors(&self) -> Result<i64>;
    async fn count_series(&self) -> Result<i64>;
}

/// `%`-wrap for a contains-style LIKE match.
pub(crate) fn like_contains(query: &str) -> String {
    format!("%{query}%")
}

/// Prefix LIKE match.
pub(crate) fn like_prefix(prefix: &str) -> String {
    format!("{prefix}%")
}
