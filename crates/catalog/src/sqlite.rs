//! Embedded catalog backend on SQLite.
//!
//! The composite uniqueness on (file_path, archive_path,
//! archive_internal_path) is enforced by the schema's unique index, so a
//! duplicate insert surfaces as [`ErrorKind::Constraint`].

use async_trait::async_trait;
use std::path::Path;

use crate::db::Database;
use crate::error::{Result, raise};
use crate::model::{ArchiveFingerprint, BookRecord, NewBook, unix_now};
use crate::store::{CatalogStore, like_contains, like_prefix};

/// The embedded catalog store.
#[derive(Debug, Clone)]
pub struct SqliteCatalog {
    db: Database,
}

impl SqliteCatalog {
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self { db: Database::connect(path).await? })
    }

    /// In-memory catalog, destroyed on drop. Used by tests across crates.
    pub async fn connect_in_memory() -> Result<Self> {
        Ok(Self { db: Database::connect_in_memory().await? })
    }

    pub async fn close(&self) {
        self.db.close().await;
    }

    /// The underlying pool, for callers that need raw SQL access.
    pub fn pool(&self) -> &sqlx::SqlitePool {
        self.db.pool()
    }
}

#[async_trait]
impl CatalogStore for SqliteCatalog {
    async fn find_by_path_triple(
        &self,
        file_path: &str,
        archive_path: &str,
        archive_internal_path: &str,
    ) -> Result<Option<BookRecord>> {
        raise(
            sqlx::query_as(include_str!("../queries/find_by_path_triple.sql"))
                .bind(file_path)
                .bind(archive_path)
                .bind(archive_internal_path)
                .fetch_optional(self.pool())
                .await,
        )
    }

    async fn find_by_title_author(&self, title: &str, author: &str) -> Result<Vec<BookRecord>> {
        raise(
            sqlx::query_as(include_str!("../queries/find_by_title_author.sql"))
                .bind(title)
                .bind(author)
                .fetch_all(self.pool())
                .await,
        )
    }

    async fn insert_book(&self, book: &NewBook) -> Result<i64> {
        let now = unix_now();
        let result = raise(
            sqlx::query(include_str!("../queries/insert_book.sql"))
                .bind(&book.file_path)
                .bind(&book.file_name)
                .bind(book.file_size)
                .bind(&book.file_type)
                .bind(&book.archive_path)
                .bind(&book.archive_internal_path)
                .bind(&book.title)
                .bind(&book.author)
                .bind(&book.genre)
                .bind(&book.series)
                .bind(book.series_number)
                .bind(book.year)
                .bind(&book.language)
                .bind(&book.publisher)
                .bind(&book.description)
                .bind(now)
                .bind(now)
                .bind(now)
                .bind(book.file_mtime)
                .execute(self.pool())
                .await,
        )?;
        Ok(result.last_insert_rowid())
    }

    async fn update_book(&self, id: i64, book: &NewBook) -> Result<()> {
        let now = unix_now();
        raise(
            sqlx::query(include_str!("../queries/update_book.sql"))
                .bind(&book.file_path)
                .bind(&book.file_name)
                .bind(book.file_size)
                .bind(&book.file_type)
                .bind(&book.archive_path)
                .bind(&book.archive_internal_path)
                .bind(&book.title)
                .bind(&book.author)
                .bind(&book.genre)
                .bind(&book.series)
                .bind(book.series_number)
                .bind(book.year)
                .bind(&book.language)
                .bind(&book.publisher)
                .bind(&book.description)
                .bind(now)
                .bind(now)
                .bind(book.file_mtime)
                .bind(id)
                .execute(self.pool())
                .await,
        )?;
        Ok(())
    }

    async fn delete_book(&self, id: i64) -> Result<()> {
        raise(
            sqlx::query(include_str!("../queries/delete_book.sql"))
                .bind(id)
                .execute(self.pool())
                .await,
        )?;
        Ok(())
    }

    async fn get_book(&self, id: i64) -> Result<Option<BookRecord>> {
        raise(
            sqlx::query_as(include_str!("../queries/get_book.sql"))
                .bind(id)
                .fetch_optional(self.pool())
                .await,
        )
    }

    async fn upsert_archive_fingerprint(&self, fingerprint: &ArchiveFingerprint) -> Result<()> {
        raise(
            sqlx::query(include_str!("../queries/upsert_fingerprint_sqlite.sql"))
                .bind(&fingerprint.archive_path)
                .bind(&fingerprint.archive_hash)
                .bind(fingerprint.file_count)
                .bind(fingerprint.total_size)
                .bind(fingerprint.last_modified)
                .bind(fingerprint.last_scanned)
                .bind(fingerprint.needs_rescan)
                .execute(self.pool())
                .await,
        )?;
        Ok(())
    }

    async fn get_archive_fingerprint(&self, archive_path: &str) -> Result<Option<ArchiveFingerprint>> {
        raise(
            sqlx::query_as(include_str!("../queries/get_fingerprint.sql"))
                .bind(archive_path)
                .fetch_optional(self.pool())
                .await,
        )
    }

    async fn touch_archive_last_scanned(&self, archive_path: &str, last_scanned: i64) -> Result<()> {
        raise(
            sqlx::query(include_str!("../queries/touch_archive.sql"))
                .bind(last_scanned)
                .bind(archive_path)
                .execute(self.pool())
                .await,
        )?;
        Ok(())
    }

    async fn mark_all_archives_for_rescan(&self) -> Result<()> {
        raise(
            sqlx::query(include_str!("../queries/mark_all_rescan.sql"))
                .execute(self.pool())
                .await,
        )?;
        Ok(())
    }

    async fn list_authors(&self, prefix: &str) -> Result<Vec<String>> {
        let rows: Vec<(String,)> = raise(
            sqlx::query_as(include_str!("../queries/list_authors.sql"))
                .bind(like_prefix(prefix))
                .fetch_all(self.pool())
                .await,
        )?;
        Ok(rows.into_iter().map(|(author,)| author).collect())
    }

    async fn list_series(&self, prefix: &str) -> Result<Vec<String>> {
        let rows: Vec<(String,)> = raise(
            sqlx::query_as(include_str!("../queries/list_series.sql"))
                .bind(like_prefix(prefix))
                .fetch_all(self.pool())
                .await,
        )?;
        Ok(rows.into_iter().map(|(series,)| series).collect())
    }

    async fn list_genres(&self) -> Result<Vec<String>> {
        let rows: Vec<(String,)> = raise(
            sqlx::query_as(include_str!("../queries/list_genres.sql"))
                .fetch_all(self.pool())
                .await,
        )?;
        Ok(rows.into_iter().map(|(genre,)| genre).collect())
    }

    async fn books_by_author(&self, author: &str) -> Result<Vec<BookRecord>> {
        raise(
            sqlx::query_as(include_str!("../queries/books_by_author.sql"))
                .bind(author)
                .fetch_all(self.pool())
                .await,
        )
    }

    async fn books_by_series(&self, series: &str) -> Result<Vec<BookRecord>> {
        raise(
            sqlx::query_as(include_str!("../queries/books_by_series.sql"))
                .bind(series)
                .fetch_all(self.pool())
                .await,
        )
    }

    async fn books_by_genre(&self, genre: &str) -> Result<Vec<BookRecord>> {
        raise(
            sqlx::query_as(include_str!("../queries/books_by_genre.sql"))
                .bind(genre)
                .fetch_all(self.pool())
                .await,
        )
    }

    async fn search(&self, query: &str) -> Result<Vec<BookRecord>> {
        let pattern = like_contains(query);
        raise(
            sqlx::query_as(include_str!("../queries/search.sql"))
                .bind(&pattern)
                .bind(&pattern)
                .bind(&pattern)
                .fetch_all(self.pool())
                .await,
        )
    }

    async fn count_books(&self) -> Result<i64> {
        raise(
            sqlx::query_scalar(include_str!("../queries/count_books.sql"))
                .fetch_one(self.pool())
                .await,
        )
    }

    async fn count_authors(&self) -> Result<i64> {
        raise(
            sqlx::query_scalar(include_str!("../queries/count_authors.sql"))
                .fetch_one(self.pool())
                .await,
        )
    }

    async fn count_series(&self) -> Result<i64> {
        raise(
            sqlx::query_scalar(include_str!("../queries/count_series.sql"))
                .fetch_one(self.pool())
                .await,
        )
    }
}
