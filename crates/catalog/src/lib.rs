//! Relational persistence for the book catalog.
//!
//! Two interchangeable backends implement [`CatalogStore`]: an embedded
//! SQLite database ([`SqliteCatalog`]) and a client-server MySQL database
//! ([`MySqlCatalog`]). Both speak the same schema (books plus archive
//! fingerprints) through shared parameterised queries.

mod db;
mod error;
mod model;
mod mysql;
mod sqlite;
mod store;

pub use self::db::Database;
pub use self::error::{Error, ErrorKind, Result};
pub use self::model::{ArchiveFingerprint, BookLocation, BookRecord, NewBook, unix_now};
pub use self::mysql::{MySqlCatalog, MySqlParams};
pub use self::sqlite::SqliteCatalog;
pub use self::store::CatalogStore;
