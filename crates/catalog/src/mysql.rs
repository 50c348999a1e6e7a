//! Networked catalog backend on MySQL.
//!
//! MySQL cannot put a unique index on unbounded TEXT columns, so the
//! path-triple uniqueness that SQLite enforces in the schema is emulated
//! here with an existence check before insert, and the fingerprint upsert
//! runs as an UPDATE followed by an INSERT when no row matched. Transient
//! connection failures are retried once with a fresh acquisition from the
//! pool.

use async_trait::async_trait;
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions};

use crate::error::{ErrorKind, Result, raise};
use crate::model::{ArchiveFingerprint, BookRecord, NewBook, unix_now};
use crate::store::{CatalogStore, like_contains, like_prefix};

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations/mysql");

const MAX_CONNECTIONS: u32 = 5;

/// Connection parameters for a MySQL catalog.
#[derive(Debug, Clone, Default)]
pub struct MySqlParams {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    /// Unix socket path. When set, takes precedence over host/port.
    pub socket: Option<String>,
}

/// The networked catalog store.
#[derive(Debug, Clone)]
pub struct MySqlCatalog {
    pool: MySqlPool,
}

impl MySqlCatalog {
    pub async fn connect(params: &MySqlParams) -> Result<Self> {
        use exn::ResultExt;

        let mut options = MySqlConnectOptions::new()
            .username(&params.user)
            .password(&params.password)
            .database(&params.database);
        options = match &params.socket {
            Some(socket) => options.socket(socket),
            None => {
                let port = if params.port == 0 { 3306 } else { params.port };
                options.host(&params.host).port(port)
            }
        };

        let pool = MySqlPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect_with(options)
            .await
            .or_raise(|| ErrorKind::Connection)?;
        MIGRATOR.run(&pool).await.or_raise(|| ErrorKind::Migration)?;
        Ok(Self { pool })
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Runs an operation, retrying it once when the failure looks like a
    /// dropped connection. The pool hands out a fresh connection on the
    /// second attempt.
    async fn with_retry<T, F, Fut>(&self, op: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        match op().await {
            Ok(value) => Ok(value),
            Err(err) if err.is_retryable() => {
                tracing::warn!(error = %err, "catalog query failed, retrying once on a fresh connection");
                op().await
            }
            Err(err) => Err(err),
        }
    }

    async fn insert_book_row(&self, book: &NewBook) -> Result<i64> {
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
                .execute(&self.pool)
                .await,
        )?;
        Ok(result.last_insert_id() as i64)
    }
}

#[async_trait]
impl CatalogStore for MySqlCatalog {
    async fn find_by_path_triple(
        &self,
        file_path: &str,
        archive_path: &str,
        archive_internal_path: &str,
    ) -> Result<Option<BookRecord>> {
        self.with_retry(|| async {
            raise(
                sqlx::query_as(include_str!("../queries/find_by_path_triple.sql"))
                    .bind(file_path)
                    .bind(archive_path)
                    .bind(archive_internal_path)
                    .fetch_optional(&self.pool)
                    .await,
            )
        })
        .await
    }

    async fn find_by_title_author(&self, title: &str, author: &str) -> Result<Vec<BookRecord>> {
        self.with_retry(|| async {
            raise(
                sqlx::query_as(include_str!("../queries/find_by_title_author.sql"))
                    .bind(title)
                    .bind(author)
                    .fetch_all(&self.pool)
                    .await,
            )
        })
        .await
    }

    async fn insert_book(&self, book: &NewBook) -> Result<i64> {
        // The schema carries no unique index over the path triple, so
        // duplicates are rejected here instead.
        let existing = self
            .find_by_path_triple(&book.file_path, &book.archive_path, &book.archive_internal_path)
            .await?;
        if existing.is_some() {
            exn::bail!(ErrorKind::Constraint);
        }
        self.with_retry(|| self.insert_book_row(book)).await
    }

    async fn update_book(&self, id: i64, book: &NewBook) -> Result<()> {
        self.with_retry(|| async {
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
                    .execute(&self.pool)
                    .await,
            )?;
            Ok(())
        })
        .await
    }

    async fn delete_book(&self, id: i64) -> Result<()> {
        self.with_retry(|| async {
            raise(
                sqlx::query(include_str!("../queries/delete_book.sql"))
                    .bind(id)
                    .execute(&self.pool)
                    .await,
            )?;
            Ok(())
        })
        .await
    }

    async fn get_book(&self, id: i64) -> Result<Option<BookRecord>> {
        self.with_retry(|| async {
            raise(
                sqlx::query_as(include_str!("../queries/get_book.sql"))
                    .bind(id)
                    .fetch_optional(&self.pool)
                    .await,
            )
        })
        .await
    }

    async fn upsert_archive_fingerprint(&self, fingerprint: &ArchiveFingerprint) -> Result<()> {
        self.with_retry(|| async {
            let updated = raise(
                sqlx::query(include_str!("../queries/update_fingerprint.sql"))
                    .bind(&fingerprint.archive_hash)
                    .bind(fingerprint.file_count)
                    .bind(fingerprint.total_size)
                    .bind(fingerprint.last_modified)
                    .bind(fingerprint.last_scanned)
                    .bind(fingerprint.needs_rescan)
                    .bind(&fingerprint.archive_path)
                    .execute(&self.pool)
                    .await,
            )?;
            if updated.rows_affected() == 0 {
                raise(
                    sqlx::query(include_str!("../queries/insert_fingerprint.sql"))
                        .bind(&fingerprint.archive_path)
                        .bind(&fingerprint.archive_hash)
                        .bind(fingerprint.file_count)
                        .bind(fingerprint.total_size)
                        .bind(fingerprint.last_modified)
                        .bind(fingerprint.last_scanned)
                        .bind(fingerprint.needs_rescan)
                        .execute(&self.pool)
                        .await,
                )?;
            }
            Ok(())
        })
        .await
    }

    async fn get_archive_fingerprint(&self, archive_path: &str) -> Result<Option<ArchiveFingerprint>> {
        self.with_retry(|| async {
            raise(
                sqlx::query_as(include_str!("../queries/get_fingerprint.sql"))
                    .bind(archive_path)
                    .fetch_optional(&self.pool)
                    .await,
            )
        })
        .await
    }

    async fn touch_archive_last_scanned(&self, archive_path: &str, last_scanned: i64) -> Result<()> {
        self.with_retry(|| async {
            raise(
                sqlx::query(include_str!("../queries/touch_archive.sql"))
                    .bind(last_scanned)
                    .bind(archive_path)
                    .execute(&self.pool)
                    .await,
            )?;
            Ok(())
        })
        .await
    }

    async fn mark_all_archives_for_rescan(&self) -> Result<()> {
        self.with_retry(|| async {
            raise(
                sqlx::query(include_str!("../queries/mark_all_rescan.sql"))
                    .execute(&self.pool)
                    .await,
            )?;
            Ok(())
        })
        .await
    }

    async fn list_authors(&self, prefix: &str) -> Result<Vec<String>> {
        self.with_retry(|| async {
            let rows: Vec<(String,)> = raise(
                sqlx::query_as(include_str!("../queries/list_authors.sql"))
                    .bind(like_prefix(prefix))
                    .fetch_all(&self.pool)
                    .await,
            )?;
            Ok(rows.into_iter().map(|(author,)| author).collect())
        })
        .await
    }

    async fn list_series(&self, prefix: &str) -> Result<Vec<String>> {
        self.with_retry(|| async {
            let rows: Vec<(String,)> = raise(
                sqlx::query_as(include_str!("../queries/list_series.sql"))
                    .bind(like_prefix(prefix))
                    .fetch_all(&self.pool)
                    .await,
            )?;
            Ok(rows.into_iter().map(|(series,)| series).collect())
        })
        .await
    }

    async fn list_genres(&self) -> Result<Vec<String>> {
        self.with_retry(|| async {
            let rows: Vec<(String,)> = raise(
                sqlx::query_as(include_str!("../queries/list_genres.sql"))
                    .fetch_all(&self.pool)
                    .await,
            )?;
            Ok(rows.into_iter().map(|(genre,)| genre).collect())
        })
        .await
    }

    async fn books_by_author(&self, author: &str) -> Result<Vec<BookRecord>> {
        self.with_retry(|| async {
            raise(
                sqlx::query_as(include_str!("../queries/books_by_author.sql"))
                    .bind(author)
                    .fetch_all(&self.pool)
                    .await,
            )
        })
        .await
    }

    async fn books_by_series(&self, series: &str) -> Result<Vec<BookRecord>> {
        self.with_retry(|| async {
            raise(
                sqlx::query_as(include_str!("../queries/books_by_series.sql"))
                    .bind(series)
                    .fetch_all(&self.pool)
                    .await,
            )
        })
        .await
    }

    async fn books_by_genre(&self, genre: &str) -> Result<Vec<BookRecord>> {
        self.with_retry(|| async {
            raise(
                sqlx::query_as(include_str!("../queries/books_by_genre.sql"))
                    .bind(genre)
                    .fetch_all(&self.pool)
                    .await,
            )
        })
        .await
    }

    async fn search(&self, query: &str) -> Result<Vec<BookRecord>> {
        self.with_retry(|| async {
            let pattern = like_contains(query);
            raise(
                sqlx::query_as(include_str!("../queries/search.sql"))
                    .bind(&pattern)
                    .bind(&pattern)
                    .bind(&pattern)
                    .fetch_all(&self.pool)
                    .await,
            )
        })
        .await
    }

    async fn count_books(&self) -> Result<i64> {
        self.with_retry(|| async {
            raise(
                sqlx::query_scalar(include_str!("../queries/count_books.sql"))
                    .fetch_one(&self.pool)
                    .await,
            )
        })
        .await
    }

    async fn count_authors(&self) -> Result<i64> {
        self.with_retry(|| async {
            raise(
                sqlx::query_scalar(include_str!("../queries/count_authors.sql"))
                    .fetch_one(&self.pool)
                    .await,
            )
        })
        .await
    }

    async fn count_series(&self) -> Result<i64> {
        self.with_retry(|| async {
            raise(
                sqlx::query_scalar(include_str!("../queries/count_series.sql"))
                    .fetch_one(&self.pool)
                    .await,
            )
        })
        .await
    }
}
