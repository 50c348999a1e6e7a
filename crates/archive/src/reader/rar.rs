//! Rar backend.
//!
//! The upstream unrar bindings only operate on paths, so in-memory
//! sources are spilled to a tempfile by [`spill_to_tempfile`] before any
//! operation runs.

use std::io::Write;
use std::path::Path;

use exn::ResultExt;
use unrar::Archive;

use crate::error::{ErrorKind, Result};
use crate::{EntryInfo, EnumerationBudget};

pub(crate) fn spill_to_tempfile(bytes: &[u8]) -> Result<tempfile::NamedTempFile> {
    let mut spill = tempfile::Builder::new()
        .prefix("colophon-rar-")
        .suffix(".rar")
        .tempfile()
        .or_raise(|| ErrorKind::Read)?;
    spill.write_all(bytes).or_raise(|| ErrorKind::Read)?;
    spill.flush().or_raise(|| ErrorKind::Read)?;
    Ok(spill)
}

pub(crate) fn entries(path: &Path, budget: &mut EnumerationBudget) -> Result<Vec<EntryInfo>> {
    let archive = Archive::new(path)
        .open_for_listing()
        .or_raise(|| ErrorKind::Open(path.to_path_buf()))?;
    let mut entries = Vec::new();
    for header in archive {
        budget.charge()?;
        let header = header.or_raise(|| ErrorKind::Read)?;
        entries.push(EntryInfo {
            path: normalize(&header.filename),
            size: header.unpacked_size as u64,
            is_file: header.is_file(),
        });
    }
    Ok(entries)
}

pub(crate) fn read_entry(path: &Path, name: &str, max_size: u64) -> Result<Vec<u8>> {
    let mut archive = Archive::new(path)
        .open_for_processing()
        .or_raise(|| ErrorKind::Open(path.to_path_buf()))?;
    loop {
        let Some(header) = archive.read_header().or_raise(|| ErrorKind::Read)? else {
            exn::bail!(ErrorKind::EntryNotFound(name.to_owned()));
        };
        if header.entry().is_file() && normalize(&header.entry().filename) == name {
            let declared = header.entry().unpacked_size as u64;
            crate::check_cap(name, declared, max_size)?;
            let (data, _rest) = header.read().or_raise(|| ErrorKind::Read)?;
            crate::check_size(name, declared, data.len())?;
            return Ok(data);
        }
        archive = header.skip().or_raise(|| ErrorKind::Read)?;
    }
}

/// Rar headers store DOS-style separators.
fn normalize(filename: &Path) -> String {
    filename.to_string_lossy().replace('\\', "/")
}
