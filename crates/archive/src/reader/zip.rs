//! Zip backend. Also serves epub and inpx, which are both zip at heart.

use std::io::Read;

use exn::ResultExt;
use zip::ZipArchive;
use zip::result::ZipError;

use crate::error::{ErrorKind, Result};
use crate::{ArchiveSource, EntryInfo, EnumerationBudget};

pub(crate) fn entries(
    source: &ArchiveSource,
    budget: &mut EnumerationBudget,
) -> Result<Vec<EntryInfo>> {
    let mut archive = open(source)?;
    let mut entries = Vec::with_capacity(archive.len());
    for index in 0..archive.len() {
        budget.charge()?;
        let entry = archive.by_index_raw(index).or_raise(|| ErrorKind::Read)?;
        entries.push(EntryInfo {
            path: entry.name().replace('\\', "/"),
            size: entry.size(),
            is_file: !entry.is_dir(),
        });
    }
    Ok(entries)
}

pub(crate) fn read_entry(source: &ArchiveSource, name: &str, max_size: u64) -> Result<Vec<u8>> {
    let mut archive = open(source)?;
    let mut entry = match archive.by_name(name) {
        Ok(entry) => entry,
        Err(ZipError::FileNotFound) => exn::bail!(ErrorKind::EntryNotFound(name.to_owned())),
        Err(err) => return Err(err).or_raise(|| ErrorKind::Read),
    };
    let declared = entry.size();
    crate::check_cap(name, declared, max_size)?;
    let mut data = Vec::with_capacity(declared as usize);
    // take() guards against an entry lying about its size in the central
    // directory; the mismatch check below catches the short case.
    Read::take(&mut entry, declared + 1).read_to_end(&mut data).or_raise(|| ErrorKind::Read)?;
    crate::check_size(name, declared, data.len())?;
    Ok(data)
}

fn open(source: &ArchiveSource) -> Result<ZipArchive<crate::SourceReader<'_>>> {
    ZipArchive::new(source.reader()?).or_raise(|| match source.path() {
        Some(path) => ErrorKind::Open(path.to_path_buf()),
        None => ErrorKind::Open("<memory>".into()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use zip::write::{SimpleFileOptions, ZipWriter};

    fn fixture() -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();
        writer.add_directory("nested/", options).unwrap();
        writer.start_file("book001.fb2", options).unwrap();
        writer.write_all(b"<FictionBook/>").unwrap();
        writer.start_file("nested/book002.fb2", options).unwrap();
        writer.write_all(b"<FictionBook></FictionBook>").unwrap();
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn lists_files_and_directories() {
        let source = ArchiveSource::Memory(fixture());
        let entries = entries(&source, &mut EnumerationBudget::default()).unwrap();
        assert_eq!(entries.len(), 3);
        assert!(entries.iter().any(|e| e.path == "nested/" && !e.is_file));
        let book = entries.iter().find(|e| e.path == "book001.fb2").unwrap();
        assert!(book.is_file);
        assert_eq!(book.size, 14);
    }

    #[test]
    fn reads_entry_by_name() {
        let source = ArchiveSource::Memory(fixture());
        let data = read_entry(&source, "nested/book002.fb2", 1024).unwrap();
        assert_eq!(data, b"<FictionBook></FictionBook>");
    }

    #[test]
    fn missing_entry_is_not_found() {
        let source = ArchiveSource::Memory(fixture());
        let err = read_entry(&source, "nope.fb2", 1024).unwrap_err();
        assert!(matches!(&*err, ErrorKind::EntryNotFound(name) if name == "nope.fb2"));
    }

    #[test]
    fn oversized_entry_is_rejected_before_reading() {
        let source = ArchiveSource::Memory(fixture());
        let err = read_entry(&source, "book001.fb2", 4).unwrap_err();
        assert!(matches!(&*err, ErrorKind::EntryTooLarge { declared: 14, cap: 4, .. }));
    }

    #[test]
    fn budget_caps_enumeration() {
        let source = ArchiveSource::Memory(fixture());
        let mut budget = EnumerationBudget::new(2, std::time::Duration::from_secs(60));
        let err = entries(&source, &mut budget).unwrap_err();
        assert!(matches!(&*err, ErrorKind::BudgetExhausted(_)));
    }
}
