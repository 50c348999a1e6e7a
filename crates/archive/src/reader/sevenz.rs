//! 7z backend.
//!
//! 7z archives are usually solid, so reading one entry can mean decoding
//! everything before it in the block. Acceptable for a scanner that reads
//! most entries anyway, but worth knowing when a single lookup is slow.

use exn::ResultExt;
use sevenz_rust::{Password, SevenZReader};

use crate::error::{ErrorKind, Result};
use crate::{ArchiveSource, EntryInfo, EnumerationBudget};

pub(crate) fn entries(
    source: &ArchiveSource,
    budget: &mut EnumerationBudget,
) -> Result<Vec<EntryInfo>> {
    let reader = open(source)?;
    let mut entries = Vec::new();
    for entry in &reader.archive().files {
        budget.charge()?;
        entries.push(EntryInfo {
            path: entry.name().replace('\\', "/"),
            size: entry.size(),
            is_file: !entry.is_directory(),
        });
    }
    Ok(entries)
}

pub(crate) fn read_entry(source: &ArchiveSource, name: &str, max_size: u64) -> Result<Vec<u8>> {
    let mut reader = open(source)?;
    let declared = reader
        .archive()
        .files
        .iter()
        .find(|entry| !entry.is_directory() && entry.name().replace('\\', "/") == name)
        .map(|entry| entry.size());
    let Some(declared) = declared else {
        exn::bail!(ErrorKind::EntryNotFound(name.to_owned()));
    };
    crate::check_cap(name, declared, max_size)?;

    let mut data = Vec::with_capacity(declared as usize);
    let mut found = false;
    reader
        .for_each_entries(|entry, entry_reader| {
            if !entry.is_directory() && entry.name().replace('\\', "/") == name {
                entry_reader.read_to_end(&mut data)?;
                found = true;
                Ok(false)
            } else {
                Ok(true)
            }
        })
        .or_raise(|| ErrorKind::Read)?;
    if !found {
        exn::bail!(ErrorKind::EntryNotFound(name.to_owned()));
    }
    crate::check_size(name, declared, data.len())?;
    Ok(data)
}

fn open(source: &ArchiveSource) -> Result<SevenZReader<crate::SourceReader<'_>>> {
    let len = source.len()?;
    SevenZReader::new(source.reader()?, len, Password::empty()).or_raise(|| match source.path() {
        Some(path) => ErrorKind::Open(path.to_path_buf()),
        None => ErrorKind::Open("<memory>".into()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn garbage_sevenz_fails_to_open() {
        let source = ArchiveSource::Memory(b"definitely not 7z".to_vec());
        let err = entries(&source, &mut EnumerationBudget::default()).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Open(_)));
    }
}
