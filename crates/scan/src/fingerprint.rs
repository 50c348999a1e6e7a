//! Archive change detection.
//!
//! An archive's fingerprint is a content hash of the whole file, streamed in
//! 64 KiB blocks, paired with its modification time. An archive whose stored
//! fingerprint matches is never opened again; its `last_scanned` timestamp is
//! refreshed and the scan moves on.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use colophon_catalog::{ArchiveFingerprint, CatalogStore, unix_now};
use exn::ResultExt;
use sha2::Digest;

use crate::error::{ErrorKind, Result};

const HASH_BLOCK: usize = 64 * 1024;

/// Content hash used for archive fingerprints.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HashAlgorithm {
    #[default]
    Blake3,
    Sha256,
}

impl HashAlgorithm {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "blake3" => Some(Self::Blake3),
            "sha256" => Some(Self::Sha256),
            _ => None,
        }
    }

    /// Hashes the file at `path`, streaming it block by block.
    pub fn hash_file(&self, path: &Path) -> Result<String> {
        let raise = || ErrorKind::Fingerprint { path: path.display().to_string() };
        let mut file = File::open(path).or_raise(raise)?;
        let mut block = vec![0_u8; HASH_BLOCK];
        match self {
            Self::Blake3 => {
                let mut hasher = blake3::Hasher::new();
                loop {
                    let read = file.read(&mut block).or_raise(raise)?;
                    if read == 0 {
                        break;
                    }
                    hasher.update(&block[..read]);
                }
                Ok(hasher.finalize().to_string())
            }
            Self::Sha256 => {
                let mut hasher = sha2::Sha256::new();
                loop {
                    let read = file.read(&mut block).or_raise(raise)?;
                    if read == 0 {
                        break;
                    }
                    hasher.update(&block[..read]);
                }
                Ok(format!("{:x}", hasher.finalize()))
            }
        }
    }
}

/// Decides whether an archive has to be opened at all.
///
/// True when the catalog has no fingerprint for it, when a previous scan
/// left the sticky rescan flag set, or when the hash or modification time
/// no longer match the stored row.
pub async fn needs_rescan(
    store: &dyn CatalogStore,
    archive_path: &str,
    archive_hash: &str,
    last_modified: i64,
) -> Result<bool> {
    let stored = lift(store.get_archive_fingerprint(archive_path).await, archive_path)?;
    Ok(match stored {
        None => true,
        Some(fp) => fp.needs_rescan || fp.archive_hash != archive_hash || fp.last_modified != last_modified,
    })
}

/// Records the outcome of an archive scan attempt.
///
/// Called after every attempt, success or not. A failed attempt keeps
/// `needs_rescan` set so the archive is retried on the next pass.
pub async fn record_scan(
    store: &dyn CatalogStore,
    archive_path: &str,
    archive_hash: &str,
    file_count: i64,
    total_size: i64,
    last_modified: i64,
    succeeded: bool,
) -> Result<()> {
    lift(
        store
            .upsert_archive_fingerprint(&ArchiveFingerprint {
                archive_path: archive_path.to_owned(),
                archive_hash: archive_hash.to_owned(),
                file_count,
                total_size,
                last_modified,
                last_scanned: unix_now(),
                needs_rescan: !succeeded,
            })
            .await,
        archive_path,
    )
}

/// Connection loss ends the scan; any other store failure stays confined
/// to the archive being fingerprinted.
fn lift<T>(result: colophon_catalog::Result<T>, archive_path: &str) -> Result<T> {
    match result {
        Ok(value) => Ok(value),
        Err(err) if err.is_retryable() => Err(err).or_raise(|| ErrorKind::Catalog),
        Err(err) => {
            Err(err).or_raise(|| ErrorKind::Fingerprint { path: archive_path.to_owned() })
        }
    }
}
