//! Directory discovery.
//!
//! Files are collected up front so the scan has a denominator for progress
//! reporting before any extraction work starts.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// Extensions handled by the format extractors (or the filename fallback).
pub const BOOK_EXTENSIONS: &[&str] = &["fb2", "epub", "pdf", "mobi", "txt"];
/// Extensions treated as book containers.
pub const ARCHIVE_EXTENSIONS: &[&str] = &["zip", "rar", "7z", "tar", "gz", "bz2", "tgz", "tbz2", "xz", "txz", "zst"];

/// A file the scanner knows what to do with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Discovered {
    Book(PathBuf),
    Archive(PathBuf),
}

impl Discovered {
    pub fn path(&self) -> &Path {
        match self {
            Self::Book(path) | Self::Archive(path) => path,
        }
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension().map(|ext| ext.to_string_lossy().to_ascii_lowercase())
}

/// Classifies a path by extension; `None` for anything unsupported.
pub fn classify(path: &Path) -> Option<Discovered> {
    let ext = extension(path)?;
    if BOOK_EXTENSIONS.contains(&ext.as_str()) {
        Some(Discovered::Book(path.to_path_buf()))
    } else if ARCHIVE_EXTENSIONS.contains(&ext.as_str()) {
        Some(Discovered::Archive(path.to_path_buf()))
    } else {
        None
    }
}

/// Walks `root` and returns every supported file, sorted for deterministic
/// scan order. Unreadable subtrees are logged and skipped.
pub fn discover(root: &Path) -> Vec<Discovered> {
    let mut found = Vec::new();
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                tracing::warn!(error = %err, "skipping unreadable directory entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        if let Some(discovered) = classify(entry.path()) {
            found.push(discovered);
        }
    }
    found.sort_by(|a, b| a.path().cmp(b.path()));
    found
}
