//! Top-level CLI errors.

use derive_more::{Display, Error};

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("configuration problem")]
    Config,
    #[display("catalog problem")]
    Catalog,
    #[display("scan aborted")]
    Scan,
    #[display("another scan is already running (lock file: {path})")]
    ScanInProgress {
        #[error(not(source))]
        path: String,
    },
    #[display("no book with id {id}")]
    NotFound {
        #[error(not(source))]
        id: i64,
    },
    #[display("could not read book content: {path}")]
    Content {
        #[error(not(source))]
        path: String,
    },
    #[display("{path}: i/o failure")]
    Io {
        #[error(not(source))]
        path: String,
    },
}
