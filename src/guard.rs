//! Single-scan-in-flight guard.
//!
//! A lock file in the library root keeps two scans from reconciling the
//! same catalog at once. The file is removed when the guard drops, so a
//! crashed scan leaves it behind; the error message names the path so the
//! operator can delete a stale one.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{ErrorKind, Result};

const LOCK_FILE_NAME: &str = ".colophon-scan.lock";

#[derive(Debug)]
pub struct ScanGuard {
    path: PathBuf,
}

impl ScanGuard {
    /// Takes the lock for `books_dir`, failing when another scan holds it.
    pub fn acquire(books_dir: &Path) -> Result<Self> {
        let path = books_dir.join(LOCK_FILE_NAME);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                let _ = writeln!(file, "{}", std::process::id());
                Ok(Self { path })
            }
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
                exn::bail!(ErrorKind::ScanInProgress { path: path.display().to_string() });
            }
            Err(_) => {
                exn::bail!(ErrorKind::Io { path: path.display().to_string() });
            }
        }
    }
}

impl Drop for ScanGuard {
    fn drop(&mut self) {
        if let Err(err) = std::fs::remove_file(&self.path) {
            tracing::warn!(error = %err, path = %self.path.display(), "could not remove scan lock file");
        }
    }
}
