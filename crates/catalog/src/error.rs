//! Catalog Error Types
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction, matching the convention used by the other crates.

use derive_more::{Display, Error};

/// A catalog error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for catalog operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// General database failure (query, decode, unexpected state).
    #[display("database error")]
    Database,
    /// Schema migration failure.
    #[display("database migration failed")]
    Migration,
    /// Connection-level failure on the client-server backend. Worth one
    /// retry before the operation is abandoned.
    #[display("database connection lost")]
    Connection,
    /// A uniqueness or integrity constraint was violated.
    #[display("constraint violation")]
    Constraint,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection)
    }
}

/// Lift an sqlx result, classifying the failure.
pub(crate) fn raise<T>(result: std::result::Result<T, sqlx::Error>) -> Result<T> {
    use exn::ResultExt;
    match result {
        Ok(value) => Ok(value),
        Err(err) => {
            let kind = classify(&err);
            Err(err).or_raise(|| kind)
        }
    }
}

fn classify(err: &sqlx::Error) -> ErrorKind {
    match err {
        sqlx::Error::Database(db) if db.is_unique_violation() => ErrorKind::Constraint,
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::Protocol(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed => ErrorKind::Connection,
        _ => ErrorKind::Database,
    }
}
