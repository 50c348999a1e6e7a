//! EPUB metadata extraction.
//!
//! An EPUB is a zip: `META-INF/container.xml` points at an OPF manifest,
//! the manifest carries the Dublin Core metadata block plus the item list
//! used for cover resolution.

use colophon_archive::{ArchiveHandle, ArchiveKind, ArchiveSource, EnumerationBudget};
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::encoding;
use crate::genres;
use crate::metadata::{self, BookMetadata, CoverImage};

const CONTAINER_ENTRY: &str = "META-INF/container.xml";
/// Manifest and pointer documents are tiny; anything bigger is broken.
const MANIFEST_CAP: u64 = 4 * 1024 * 1024;
const COVER_CAP: u64 = 16 * 1024 * 1024;

/// Extract metadata from EPUB bytes.
///
/// Never fails hard: a buffer that does not open as a zip or is missing
/// its pointer/manifest yields an empty record for the filename fallback.
pub fn extract(bytes: &[u8], description_limit: usize) -> BookMetadata {
    let mut meta = BookMetadata { file_size: bytes.len() as u64, ..Default::default() };
    if let Err(err) = try_extract(bytes, description_limit, &mut meta) {
        tracing::debug!(error = %err, "epub extraction incomplete");
    }
    meta
}

fn try_extract(
    bytes: &[u8],
    description_limit: usize,
    meta: &mut BookMetadata,
) -> colophon_archive::Result<()> {
    let handle = ArchiveHandle::open_as(ArchiveSource::Memory(bytes.to_vec()), ArchiveKind::Zip)?;

    let container = handle.read_entry(CONTAINER_ENTRY, MANIFEST_CAP)?;
    let opf_path = match opf_path(&encoding::normalize(&container)) {
        Some(path) => path,
        None => return Ok(()),
    };
    let opf = handle.read_entry(&opf_path, MANIFEST_CAP)?;
    let manifest = parse_opf(&encoding::normalize(&opf), description_limit, meta);

    if let Some((path, media_type)) = resolve_cover(&handle, &opf_path, &manifest) {
        if let Ok(data) = handle.read_entry(&path, COVER_CAP) {
            meta.cover = Some(CoverImage { media_type, data });
        }
    }
    Ok(())
}

/// `<rootfile full-path="OEBPS/content.opf" .../>` in the pointer file.
fn opf_path(xml: &str) -> Option<String> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                if e.name().local_name().as_ref() == b"rootfile" {
                    for attr in e.attributes().flatten() {
                        if attr.key.as_ref() == b"full-path" {
                            return Some(String::from_utf8_lossy(&attr.value).into_owned());
                        }
                    }
                }
            }
            Ok(Event::Eof) | Err(_) => return None,
            _ => {}
        }
        buf.clear();
    }
}

/// An `<item>` from the OPF manifest.
struct ManifestItem {
    id: String,
    href: String,
    media_type: String,
    properties: String,
}

struct Manifest {
    items: Vec<ManifestItem>,
    cover_meta_id: Option<String>,
}

fn parse_opf(xml: &str, description_limit: usize, meta: &mut BookMetadata) -> Manifest {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();

    let mut manifest = Manifest { items: Vec::new(), cover_meta_id: None };
    let mut capture: Option<&'static str> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.name().local_name().as_ref() {
                b"title" => capture = Some("title"),
                b"creator" => capture = Some("creator"),
                b"subject" => capture = Some("subject"),
                b"description" => capture = Some("description"),
                b"date" => capture = Some("date"),
                b"publisher" => capture = Some("publisher"),
                b"language" => capture = Some("language"),
                b"meta" => read_cover_meta(&e, &mut manifest),
                b"item" => manifest.items.push(read_item(&e)),
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.name().local_name().as_ref() {
                b"meta" => read_cover_meta(&e, &mut manifest),
                b"item" => manifest.items.push(read_item(&e)),
                _ => {}
            },
            Ok(Event::Text(t)) => {
                let text = t.unescape().unwrap_or_default();
                match capture {
                    Some("title") if meta.title.is_empty() => {
                        meta.title = metadata::collapse_whitespace(&text);
                    }
                    Some("creator") if meta.author.is_empty() => {
                        meta.author = metadata::collapse_whitespace(&text);
                    }
                    Some("subject") if meta.genre.is_empty() => {
                        meta.genre = genres::label(&text);
                    }
                    Some("description") if meta.description.is_empty() => {
                        meta.description = metadata::strip_markup(&text, description_limit);
                    }
                    Some("date") if meta.year == 0 => {
                        meta.year = metadata::year_from_date(&text);
                    }
                    Some("publisher") if meta.publisher.is_empty() => {
                        meta.publisher = metadata::collapse_whitespace(&text);
                    }
                    Some("language") if meta.language.is_empty() => {
                        meta.language = metadata::collapse_whitespace(&text);
                    }
                    _ => {}
                }
            }
            Ok(Event::End(_)) => capture = None,
            Ok(Event::Eof) => break,
            Err(err) => {
                tracing::debug!(error = %err, "opf parse stopped early");
                break;
            }
            _ => {}
        }
        buf.clear();
    }
    manifest
}

/// `<meta name="cover" content="cover-image-id"/>`.
fn read_cover_meta(e: &BytesStart<'_>, manifest: &mut Manifest) {
    let mut name = String::new();
    let mut content = String::new();
    for attr in e.attributes().flatten() {
        match attr.key.as_ref() {
            b"name" => name = String::from_utf8_lossy(&attr.value).into_owned(),
            b"content" => content = String::from_utf8_lossy(&attr.value).into_owned(),
            _ => {}
        }
    }
    if name == "cover" && manifest.cover_meta_id.is_none() {
        manifest.cover_meta_id = Some(content);
    }
}

fn read_item(e: &BytesStart<'_>) -> ManifestItem {
    let mut item = ManifestItem {
        id: String::new(),
        href: String::new(),
        media_type: String::new(),
        properties: String::new(),
    };
    for attr in e.attributes().flatten() {
        let value = String::from_utf8_lossy(&attr.value).into_owned();
        match attr.key.as_ref() {
            b"id" => item.id = value,
            b"href" => item.href = value,
            b"media-type" => item.media_type = value,
            b"properties" => item.properties = value,
            _ => {}
        }
    }
    item
}

/// Find the cover entry path and media type.
///
/// Conventional entry names win; the manifest declaration
/// (`properties="cover-image"` or `meta[name=cover]` → item id) is the
/// fallback, with hrefs resolved relative to the OPF directory.
fn resolve_cover(
    handle: &ArchiveHandle,
    opf_path: &str,
    manifest: &Manifest,
) -> Option<(String, String)> {
    let mut budget = EnumerationBudget::default();
    if let Ok(entries) = handle.entries(&mut budget) {
        for entry in &entries {
            if !entry.is_file {
                continue;
            }
            let lower = entry.path.to_ascii_lowercase();
            let base = lower.rsplit('/').next().unwrap_or(&lower);
            let conventional = matches!(base, "cover.jpg" | "cover.jpeg" | "cover.png")
                || (lower.contains("cover") && media_type_for(&lower).is_some());
            if conventional {
                if let Some(media_type) = media_type_for(&lower) {
                    return Some((entry.path.clone(), media_type.to_owned()));
                }
            }
        }
    }

    let item = manifest
        .items
        .iter()
        .find(|item| item.properties.contains("cover-image"))
        .or_else(|| {
            let id = manifest.cover_meta_id.as_deref()?;
            manifest.items.iter().find(|item| item.id == id)
        })?;
    let opf_dir = opf_path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("");
    let path = if opf_dir.is_empty() {
        item.href.clone()
    } else {
        format!("{opf_dir}/{}", item.href)
    };
    let media_type = if item.media_type.is_empty() {
        media_type_for(&path.to_ascii_lowercase())?.to_owned()
    } else {
        item.media_type.clone()
    };
    Some((path, media_type))
}

fn media_type_for(path: &str) -> Option<&'static str> {
    let ext = path.rsplit('.').next()?;
    match ext {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "gif" => Some("image/gif"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::DEFAULT_DESCRIPTION_LIMIT;
    use std::io::{Cursor, Write};
    use zip::write::{SimpleFileOptions, ZipWriter};

    const CONTAINER: &str = r#"<?xml version="1.0"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>"#;

    const OPF: &str = r#"<?xml version="1.0"?>
<package xmlns="http://www.idpf.org/2007/opf" version="2.0">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:title>The Glass Orbit</dc:title>
    <dc:creator>Nora Hale</dc:creator>
    <dc:subject>sf</dc:subject>
    <dc:description>&lt;p&gt;An orbital  mystery.&lt;/p&gt;</dc:description>
    <dc:date>2019-06-01</dc:date>
    <dc:publisher>Meridian Press</dc:publisher>
    <dc:language>en</dc:language>
    <meta name="cover" content="cover-img"/>
  </metadata>
  <manifest>
    <item id="cover-img" href="images/front.jpeg" media-type="image/jpeg"/>
    <item id="text" href="text.xhtml" media-type="application/xhtml+xml"/>
  </manifest>
</package>"#;

    fn build_epub(cover_entry: Option<(&str, &[u8])>) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();
        writer.start_file("META-INF/container.xml", options).unwrap();
        writer.write_all(CONTAINER.as_bytes()).unwrap();
        writer.start_file("OEBPS/content.opf", options).unwrap();
        writer.write_all(OPF.as_bytes()).unwrap();
        if let Some((name, data)) = cover_entry {
            writer.start_file(name, options).unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn extracts_dublin_core_fields() {
        let meta = extract(&build_epub(None), DEFAULT_DESCRIPTION_LIMIT);
        assert_eq!(meta.title, "The Glass Orbit");
        assert_eq!(meta.author, "Nora Hale");
        assert_eq!(meta.genre, "Science Fiction");
        assert_eq!(meta.description, "An orbital mystery.");
        assert_eq!(meta.year, 2019);
        assert_eq!(meta.publisher, "Meridian Press");
        assert_eq!(meta.language, "en");
    }

    #[test]
    fn cover_resolves_through_manifest_meta() {
        let meta = extract(
            &build_epub(Some(("OEBPS/images/front.jpeg", b"jpegbytes"))),
            DEFAULT_DESCRIPTION_LIMIT,
        );
        let cover = meta.cover.expect("cover present");
        assert_eq!(cover.media_type, "image/jpeg");
        assert_eq!(cover.data, b"jpegbytes");
    }

    #[test]
    fn conventional_cover_name_wins() {
        let meta = extract(
            &build_epub(Some(("cover.png", b"pngbytes"))),
            DEFAULT_DESCRIPTION_LIMIT,
        );
        let cover = meta.cover.expect("cover present");
        assert_eq!(cover.media_type, "image/png");
        assert_eq!(cover.data, b"pngbytes");
    }

    #[test]
    fn non_zip_bytes_yield_empty_record() {
        let meta = extract(b"this is not an epub", DEFAULT_DESCRIPTION_LIMIT);
        assert!(meta.title.is_empty());
        assert!(meta.author.is_empty());
    }
}
