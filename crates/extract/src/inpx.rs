//! INPX catalog-export parsing (format C).
//!
//! An `.inpx` file is a zip of `*.inp` text files plus a few info entries.
//! Each `.inp` line is one book record: fields separated by 0x04, records
//! by CR/LF, field positions mapped to semantic roles by a [`FieldMap`]
//! built once from the structure-description string.

use colophon_archive::{ArchiveHandle, ArchiveKind, ArchiveSource, EnumerationBudget};
use exn::ResultExt;

use crate::encoding;
use crate::error::{ErrorKind, Result};
use crate::metadata::{self, BookMetadata};

const FIELD_SEP: char = '\x04';
/// Entries this large are not catalog exports.
const INP_ENTRY_CAP: u64 = 100 * 1024 * 1024;
/// Lines at or under this length cannot hold a full record.
const MIN_RECORD_LEN: usize = 10;

/// Default column layout of an `.inp` record.
pub const DEFAULT_STRUCTURE: &str =
    "AUTHOR;GENRE;TITLE;SERIES;SERNO;FILE;SIZE;LIBID;DEL;EXT;DATE;LANG;KEYWORDS";

/// Semantic role of one record column.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Field {
    Author,
    Genre,
    Title,
    Series,
    SerNo,
    File,
    Size,
    LibId,
    Deleted,
    Ext,
    Date,
    Lang,
    Keywords,
    /// Column present in the structure string but not understood.
    Unmapped,
}

impl Field {
    fn from_token(token: &str) -> Self {
        match token {
            "AUTHOR" => Self::Author,
            "GENRE" => Self::Genre,
            "TITLE" => Self::Title,
            "SERIES" => Self::Series,
            "SERNO" => Self::SerNo,
            "FILE" => Self::File,
            "SIZE" => Self::Size,
            "LIBID" => Self::LibId,
            "DEL" => Self::Deleted,
            "EXT" => Self::Ext,
            "DATE" => Self::Date,
            "LANG" => Self::Lang,
            "KEYWORDS" => Self::Keywords,
            _ => Self::Unmapped,
        }
    }
}

/// Ordered column-position → role mapping, built once per import.
#[derive(Clone, Debug)]
pub struct FieldMap(Vec<Field>);

impl FieldMap {
    /// Parse a `;`-separated structure string. An empty string yields the
    /// default layout.
    pub fn parse(structure: &str) -> Self {
        let structure = if structure.trim().is_empty() { DEFAULT_STRUCTURE } else { structure };
        Self(structure.split(';').map(|token| Field::from_token(token.trim())).collect())
    }

    fn role(&self, position: usize) -> Field {
        self.0.get(position).copied().unwrap_or(Field::Unmapped)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for FieldMap {
    fn default() -> Self {
        Self::parse(DEFAULT_STRUCTURE)
    }
}

/// One accepted catalog record.
#[derive(Clone, Debug)]
pub struct CatalogRecord {
    pub meta: BookMetadata,
    /// FILE column: archive-internal file name without extension.
    pub file: String,
    /// EXT column; empty means the conventional default applies.
    pub ext: String,
}

impl CatalogRecord {
    /// Archive-internal path: `FILE.EXT`, defaulting the extension.
    pub fn internal_path(&self) -> String {
        if self.ext.is_empty() {
            format!("{}.fb2", self.file)
        } else {
            format!("{}.{}", self.file, self.ext)
        }
    }
}

/// Parsed contents of one `*.inp` entry.
#[derive(Debug)]
pub struct CatalogFile {
    /// Entry name inside the export container.
    pub name: String,
    pub records: Vec<CatalogRecord>,
}

impl CatalogFile {
    /// The book archive this `.inp` indexes: same stem, `.zip` extension.
    pub fn archive_file_name(&self) -> String {
        let base = self.name.rsplit('/').next().unwrap_or(&self.name);
        match base.rsplit_once('.') {
            Some((stem, _)) => format!("{stem}.zip"),
            None => format!("{base}.zip"),
        }
    }
}

/// Parse a whole catalog export (`.inpx` bytes).
///
/// Fails only at the catalog level: not a zip, no `.inp` entries, or zero
/// acceptable records overall. Individual bad lines are skipped.
#[tracing::instrument(skip_all, fields(bytes = bytes.len()))]
pub fn parse_catalog(bytes: &[u8], map: &FieldMap) -> Result<Vec<CatalogFile>> {
    let handle = ArchiveHandle::open_as(ArchiveSource::Memory(bytes.to_vec()), ArchiveKind::Zip)
        .or_raise(|| ErrorKind::Container)?;
    let mut budget = EnumerationBudget::default();
    let entries = handle.entries(&mut budget).or_raise(|| ErrorKind::Container)?;

    let mut files = Vec::new();
    let mut total_records = 0usize;
    let mut inp_entries = 0usize;
    for entry in &entries {
        if !entry.is_file || !is_inp_entry(&entry.path) {
            continue;
        }
        inp_entries += 1;
        if entry.size == 0 || entry.size > INP_ENTRY_CAP {
            tracing::warn!(entry = %entry.path, size = entry.size, "skipping unusable inp entry");
            continue;
        }
        let content = match handle.read_entry(&entry.path, INP_ENTRY_CAP) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!(entry = %entry.path, error = %err, "failed to read inp entry");
                continue;
            }
        };
        let text = encoding::normalize(&content);
        let records: Vec<CatalogRecord> = text
            .split(['\r', '\n'])
            .filter(|line| line.len() > MIN_RECORD_LEN)
            .filter_map(|line| parse_record(line, map))
            .collect();
        tracing::debug!(entry = %entry.path, records = records.len(), "parsed inp entry");
        total_records += records.len();
        files.push(CatalogFile { name: entry.path.clone(), records });
    }

    if inp_entries == 0 {
        exn::bail!(ErrorKind::NoCatalogEntries);
    }
    if total_records == 0 {
        exn::bail!(ErrorKind::NoRecords);
    }
    Ok(files)
}

fn is_inp_entry(path: &str) -> bool {
    let lower = path.to_ascii_lowercase();
    if lower.ends_with("structure.info")
        || lower.ends_with("collection.info")
        || lower.ends_with("version.info")
    {
        return false;
    }
    lower.ends_with(".inp")
}

/// Parse one record line. Returns `None` unless title, author and file
/// are all non-empty after mapping.
pub fn parse_record(line: &str, map: &FieldMap) -> Option<CatalogRecord> {
    let mut meta = BookMetadata::default();
    let mut file = String::new();
    let mut ext = String::new();

    for (position, value) in line.split(FIELD_SEP).enumerate() {
        if value.is_empty() {
            continue;
        }
        match map.role(position) {
            Field::Author => {
                if meta.author.is_empty() {
                    meta.author = parse_author(value);
                }
            }
            Field::Genre => {
                if meta.genre.is_empty() {
                    let code = value.split(':').next().unwrap_or(value);
                    meta.genre = code.trim().to_owned();
                }
            }
            Field::Title => {
                if meta.title.is_empty() {
                    meta.title = value.trim().to_owned();
                }
            }
            Field::Series => {
                if meta.series.is_empty() {
                    let name = value.split('(').next().unwrap_or(value);
                    meta.series = name.trim_end().trim().to_owned();
                }
            }
            Field::SerNo => {
                let number = atoi_prefix(value);
                if number > 0 {
                    meta.series_number = number as i32;
                }
            }
            Field::File => file = value.trim().to_owned(),
            Field::Size => {
                let size = atoi_prefix(value);
                if size > 0 {
                    meta.file_size = size as u64;
                }
            }
            Field::Ext => ext = value.trim().trim_start_matches('.').to_owned(),
            Field::Date => {
                if value.len() >= 4 {
                    let year = atoi_prefix(value);
                    if year > 0 {
                        meta.year = year as i32;
                    }
                }
            }
            Field::Lang => {
                if meta.language.is_empty() {
                    meta.language = value.trim().to_owned();
                }
            }
            Field::LibId | Field::Deleted | Field::Keywords | Field::Unmapped => {}
        }
    }

    if meta.title.is_empty() || meta.author.is_empty() || file.is_empty() {
        return None;
    }
    Some(CatalogRecord { meta, file, ext })
}

/// `Last:First:Middle`, commas replaced with spaces, single-space joined.
fn parse_author(value: &str) -> String {
    let joined = value
        .splitn(3, ':')
        .map(|part| part.replace(',', " "))
        .collect::<Vec<_>>()
        .join(" ");
    metadata::collapse_whitespace(&joined)
}

/// Leading-digits integer parse, `atoi`-style: `"2005-01"` → 2005.
fn atoi_prefix(value: &str) -> i64 {
    let digits: &str = {
        let end = value.trim().find(|c: char| !c.is_ascii_digit());
        let trimmed = value.trim();
        match end {
            Some(end) => &trimmed[..end],
            None => trimmed,
        }
    };
    digits.parse().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use zip::write::{SimpleFileOptions, ZipWriter};

    const SAMPLE_LINE: &str =
        "Ivanov,:Petr,:A.\x04sf\x04Title\x04Series (2)\x043\x04book001\x041024\x04\x04\x04fb2\x042005\x04ru\x04";

    #[test]
    fn default_structure_record() {
        let record = parse_record(SAMPLE_LINE, &FieldMap::default()).expect("record accepted");
        assert_eq!(record.meta.author, "Ivanov Petr A.");
        assert_eq!(record.meta.genre, "sf");
        assert_eq!(record.meta.title, "Title");
        assert_eq!(record.meta.series, "Series");
        assert_eq!(record.meta.series_number, 3);
        assert_eq!(record.file, "book001");
        assert_eq!(record.meta.file_size, 1024);
        assert_eq!(record.ext, "fb2");
        assert_eq!(record.meta.year, 2005);
        assert_eq!(record.meta.language, "ru");
        assert_eq!(record.internal_path(), "book001.fb2");
    }

    #[test]
    fn record_without_title_author_or_file_is_rejected() {
        let map = FieldMap::default();
        assert!(parse_record("\x04sf\x04Title\x04\x04\x04book001", &map).is_none());
        assert!(parse_record("Ivanov\x04sf\x04\x04\x04\x04book001", &map).is_none());
        assert!(parse_record("Ivanov\x04sf\x04Title\x04\x04\x04", &map).is_none());
    }

    #[test]
    fn genre_truncates_at_colon_and_ext_defaults() {
        let line = "Ivanov\x04sf:subgenre\x04Title\x04\x04\x04book002";
        let record = parse_record(line, &FieldMap::default()).unwrap();
        assert_eq!(record.meta.genre, "sf");
        assert_eq!(record.internal_path(), "book002.fb2");
    }

    #[test]
    fn short_structure_maps_trailing_columns_unmapped() {
        let map = FieldMap::parse("AUTHOR;GENRE;TITLE");
        assert_eq!(map.len(), 3);
        assert_eq!(map.role(0), Field::Author);
        assert_eq!(map.role(2), Field::Title);
        assert_eq!(map.role(3), Field::Unmapped);
        assert_eq!(map.role(99), Field::Unmapped);
    }

    #[test]
    fn unknown_tokens_become_unmapped() {
        let map = FieldMap::parse("AUTHOR;BOGUS;TITLE");
        assert_eq!(map.role(1), Field::Unmapped);
    }

    fn build_inpx(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();
        for (name, content) in entries {
            writer.start_file(*name, options).unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn catalog_parses_inp_entries_and_skips_info_files() {
        let inpx = build_inpx(&[
            ("structure.info", DEFAULT_STRUCTURE),
            ("collection.info", "My Library"),
            ("books01.inp", SAMPLE_LINE),
        ]);
        let files = parse_catalog(&inpx, &FieldMap::default()).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].name, "books01.inp");
        assert_eq!(files[0].records.len(), 1);
        assert_eq!(files[0].archive_file_name(), "books01.zip");
    }

    #[test]
    fn catalog_without_inp_entries_fails() {
        let inpx = build_inpx(&[("collection.info", "My Library")]);
        let err = parse_catalog(&inpx, &FieldMap::default()).unwrap_err();
        assert!(matches!(&*err, ErrorKind::NoCatalogEntries));
    }

    #[test]
    fn catalog_with_only_bad_lines_fails() {
        let inpx = build_inpx(&[("books01.inp", "too short\x04\x04")]);
        let err = parse_catalog(&inpx, &FieldMap::default()).unwrap_err();
        assert!(matches!(&*err, ErrorKind::NoRecords));
    }

    #[test]
    fn non_zip_catalog_fails_as_container() {
        let err = parse_catalog(b"plain text", &FieldMap::default()).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Container));
    }
}
