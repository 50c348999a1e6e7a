//! Tar backend, with transparent [`Filter`] decompression for
//! `.tar.gz`/`.tgz`/`.tar.bz2`/`.tar.xz`/`.tar.zst`.
//!
//! Tar has no central directory, so both operations stream the whole
//! container front to back.

use std::io::Read;

use exn::ResultExt;

use crate::error::{ErrorKind, Result};
use crate::{ArchiveSource, EntryInfo, EnumerationBudget, Filter};

pub(crate) fn entries(
    source: &ArchiveSource,
    filter: Filter,
    budget: &mut EnumerationBudget,
) -> Result<Vec<EntryInfo>> {
    let mut archive = open(source, filter)?;
    let mut entries = Vec::new();
    for entry in archive.entries().or_raise(|| ErrorKind::Read)? {
        budget.charge()?;
        let entry = entry.or_raise(|| ErrorKind::Read)?;
        let path = entry.path().or_raise(|| ErrorKind::Read)?.to_string_lossy().into_owned();
        entries.push(EntryInfo {
            path,
            size: entry.size(),
            is_file: entry.header().entry_type().is_file(),
        });
    }
    Ok(entries)
}

pub(crate) fn read_entry(
    source: &ArchiveSource,
    filter: Filter,
    name: &str,
    max_size: u64,
) -> Result<Vec<u8>> {
    let mut archive = open(source, filter)?;
    for entry in archive.entries().or_raise(|| ErrorKind::Read)? {
        let mut entry = entry.or_raise(|| ErrorKind::Read)?;
        if !entry.header().entry_type().is_file() {
            continue;
        }
        if entry.path().or_raise(|| ErrorKind::Read)?.to_string_lossy() != name {
            continue;
        }
        let declared = entry.size();
        crate::check_cap(name, declared, max_size)?;
        let mut data = Vec::with_capacity(declared as usize);
        Read::take(&mut entry, declared + 1).read_to_end(&mut data).or_raise(|| ErrorKind::Read)?;
        crate::check_size(name, declared, data.len())?;
        return Ok(data);
    }
    exn::bail!(ErrorKind::EntryNotFound(name.to_owned()))
}

fn open<'a>(source: &'a ArchiveSource, filter: Filter) -> Result<tar::Archive<Box<dyn Read + 'a>>> {
    let reader = source.reader()?;
    Ok(tar::Archive::new(filter.wrap(reader)?))
}
