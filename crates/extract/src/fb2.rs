//! FB2 (FictionBook 2) metadata extraction.
//!
//! A single XML document: metadata lives in `description/title-info`,
//! the cover in a `binary` element referenced from `coverpage`. Event
//! parsing only, the body is never materialized.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::encoding;
use crate::genres;
use crate::metadata::{self, BookMetadata, CoverImage};

/// Root element that marks a FictionBook document.
pub const ROOT_SENTINEL: &[u8] = b"FictionBook";

/// Check whether a document's root element is `FictionBook`.
pub fn is_fictionbook(text: &str) -> bool {
    let mut reader = Reader::from_str(text);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                return e.name().local_name().as_ref() == ROOT_SENTINEL;
            }
            Ok(Event::Eof) | Err(_) => return false,
            _ => {}
        }
        buf.clear();
    }
}

/// Which element's character data is currently being captured.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Capture {
    BookTitle,
    FirstName,
    LastName,
    MiddleName,
    Genre,
    Date,
    Lang,
    Publisher,
}

/// Extract metadata from an FB2 document.
///
/// Never fails hard: malformed XML yields whatever was captured before
/// the parser gave up, and the caller's filename fallback fills the rest.
pub fn extract(bytes: &[u8], description_limit: usize) -> BookMetadata {
    let text = encoding::normalize(bytes);
    let mut meta = BookMetadata { file_size: bytes.len() as u64, ..Default::default() };

    let mut reader = Reader::from_str(&text);
    let mut buf = Vec::new();

    let mut capture: Option<Capture> = None;
    let mut in_title_info = false;
    let mut in_author = false;
    let mut authors_seen = 0usize;
    let mut first = String::new();
    let mut last = String::new();
    let mut middle = String::new();

    let mut in_annotation = false;
    let mut paragraph = String::new();
    let mut paragraphs: Vec<String> = Vec::new();

    let mut in_coverpage = false;
    let mut cover_href: Option<String> = None;
    let mut cover_type = String::new();
    let mut in_cover_binary = false;
    let mut cover_base64 = String::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.name().local_name().as_ref() {
                b"title-info" => in_title_info = true,
                b"author" if in_title_info => {
                    in_author = true;
                    authors_seen += 1;
                }
                b"book-title" if in_title_info => capture = Some(Capture::BookTitle),
                b"first-name" if in_author => capture = Some(Capture::FirstName),
                b"last-name" if in_author => capture = Some(Capture::LastName),
                b"middle-name" if in_author => capture = Some(Capture::MiddleName),
                b"genre" if in_title_info => capture = Some(Capture::Genre),
                b"date" if in_title_info => capture = Some(Capture::Date),
                b"lang" if in_title_info => capture = Some(Capture::Lang),
                b"publisher" => capture = Some(Capture::Publisher),
                b"annotation" if in_title_info => in_annotation = true,
                b"p" if in_annotation => paragraph.clear(),
                b"coverpage" => in_coverpage = true,
                b"sequence" if in_title_info => read_sequence(&e, &mut meta),
                b"image" if in_coverpage => cover_href = image_href(&e),
                b"binary" => {
                    let (id, content_type) = binary_attrs(&e);
                    if cover_href.as_deref() == Some(id.as_str()) && meta.cover.is_none() {
                        in_cover_binary = true;
                        cover_type = content_type;
                        cover_base64.clear();
                    }
                }
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.name().local_name().as_ref() {
                b"sequence" if in_title_info => read_sequence(&e, &mut meta),
                b"image" if in_coverpage => cover_href = image_href(&e),
                _ => {}
            },
            Ok(Event::Text(t)) => {
                let text = t.unescape().unwrap_or_default();
                if in_cover_binary {
                    cover_base64.extend(text.chars().filter(|c| !c.is_whitespace()));
                } else if in_annotation {
                    // Chunks around inline markup stay unseparated here;
                    // whitespace is collapsed once per paragraph.
                    paragraph.push_str(&text);
                } else if let Some(field) = capture {
                    if field == Capture::Date {
                        if meta.year == 0 {
                            meta.year = metadata::year_from_date(&text);
                        }
                    } else {
                        let target = match field {
                            Capture::BookTitle => &mut meta.title,
                            Capture::FirstName => &mut first,
                            Capture::LastName => &mut last,
                            Capture::MiddleName => &mut middle,
                            Capture::Genre => &mut meta.genre,
                            Capture::Lang => &mut meta.language,
                            Capture::Publisher => &mut meta.publisher,
                            Capture::Date => unreachable!(),
                        };
                        if target.is_empty() {
                            *target = metadata::collapse_whitespace(&text);
                        }
                    }
                }
            }
            Ok(Event::End(e)) => match e.name().local_name().as_ref() {
                b"title-info" => in_title_info = false,
                b"author" => {
                    if in_author && authors_seen == 1 && meta.author.is_empty() {
                        meta.author = compose_author(&last, &first, &middle);
                    }
                    in_author = false;
                }
                b"annotation" => in_annotation = false,
                b"p" if in_annotation => {
                    let collapsed = metadata::collapse_whitespace(&paragraph);
                    paragraph.clear();
                    if !collapsed.is_empty() {
                        paragraphs.push(collapsed);
                    }
                }
                b"coverpage" => in_coverpage = false,
                b"binary" if in_cover_binary => {
                    in_cover_binary = false;
                    if let Ok(data) = BASE64.decode(cover_base64.as_bytes()) {
                        meta.cover = Some(CoverImage {
                            media_type: std::mem::take(&mut cover_type),
                            data,
                        });
                    }
                }
                b"description" if cover_href.is_none() => break,
                _ => capture = None,
            },
            Ok(Event::Eof) => break,
            Err(err) => {
                tracing::debug!(error = %err, "fb2 parse stopped early");
                break;
            }
            _ => {}
        }
        buf.clear();
    }

    if !meta.genre.is_empty() {
        meta.genre = genres::label(&meta.genre);
    }
    if !paragraphs.is_empty() {
        let mut description = paragraphs.join("\n\n");
        metadata::truncate_chars(&mut description, description_limit);
        meta.description = description;
    }
    meta
}

fn compose_author(last: &str, first: &str, middle: &str) -> String {
    [last, first, middle]
        .iter()
        .filter(|part| !part.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(" ")
}

fn read_sequence(e: &BytesStart<'_>, meta: &mut BookMetadata) {
    if !meta.series.is_empty() {
        return;
    }
    for attr in e.attributes().flatten() {
        let value = String::from_utf8_lossy(&attr.value);
        match attr.key.local_name().as_ref() {
            b"name" => meta.series = metadata::collapse_whitespace(&value),
            b"number" => meta.series_number = value.trim().parse().unwrap_or(0),
            _ => {}
        }
    }
}

/// `<image l:href="#cover.jpg"/>` → `cover.jpg`.
fn image_href(e: &BytesStart<'_>) -> Option<String> {
    for attr in e.attributes().flatten() {
        if attr.key.local_name().as_ref() == b"href" {
            let value = String::from_utf8_lossy(&attr.value);
            return Some(value.trim_start_matches('#').to_owned());
        }
    }
    None
}

fn binary_attrs(e: &BytesStart<'_>) -> (String, String) {
    let mut id = String::new();
    let mut content_type = String::new();
    for attr in e.attributes().flatten() {
        match attr.key.local_name().as_ref() {
            b"id" => id = String::from_utf8_lossy(&attr.value).into_owned(),
            b"content-type" => content_type = String::from_utf8_lossy(&attr.value).into_owned(),
            _ => {}
        }
    }
    (id, content_type)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::DEFAULT_DESCRIPTION_LIMIT;

    const SAMPLE: &str = r##"<?xml version="1.0" encoding="utf-8"?>
<FictionBook xmlns="http://www.gribuser.ru/xml/fictionbook/2.0" xmlns:l="http://www.w3.org/1999/xlink">
  <description>
    <title-info>
      <genre>sf_space</genre>
      <author>
        <first-name>Ivan</first-name>
        <middle-name>Petrovich</middle-name>
        <last-name>Sidorov</last-name>
      </author>
      <book-title>Starfall</book-title>
      <annotation>
        <p>A ship is lost.</p>
        <p>A crew <emphasis>endures</emphasis>.</p>
      </annotation>
      <date>2005-03-01</date>
      <coverpage><image l:href="#cover.jpg"/></coverpage>
      <lang>ru</lang>
      <sequence name="Void Cycle" number="2"/>
    </title-info>
    <publish-info>
      <publisher>Orbita</publisher>
    </publish-info>
  </description>
  <body><p>text</p></body>
  <binary id="cover.jpg" content-type="image/jpeg">aGVsbG8=</binary>
</FictionBook>"##;

    #[test]
    fn extracts_all_title_info_fields() {
        let meta = extract(SAMPLE.as_bytes(), DEFAULT_DESCRIPTION_LIMIT);
        assert_eq!(meta.title, "Starfall");
        assert_eq!(meta.author, "Sidorov Ivan Petrovich");
        assert_eq!(meta.genre, "Space Science Fiction");
        assert_eq!(meta.series, "Void Cycle");
        assert_eq!(meta.series_number, 2);
        assert_eq!(meta.year, 2005);
        assert_eq!(meta.language, "ru");
        assert_eq!(meta.publisher, "Orbita");
        assert_eq!(meta.description, "A ship is lost.\n\nA crew endures.");
    }

    #[test]
    fn decodes_cover_binary() {
        let meta = extract(SAMPLE.as_bytes(), DEFAULT_DESCRIPTION_LIMIT);
        let cover = meta.cover.expect("cover present");
        assert_eq!(cover.media_type, "image/jpeg");
        assert_eq!(cover.data, b"hello");
    }

    #[test]
    fn inline_markup_keeps_punctuation_attached() {
        let xml = r#"<FictionBook><description><title-info>
            <book-title>T</book-title>
            <annotation><p>Ships <strong>burn</strong>, crews <emphasis>endure</emphasis>.</p></annotation>
        </title-info></description></FictionBook>"#;
        let meta = extract(xml.as_bytes(), DEFAULT_DESCRIPTION_LIMIT);
        assert_eq!(meta.description, "Ships burn, crews endure.");
    }

    #[test]
    fn unmapped_genre_is_title_cased() {
        let xml = r#"<FictionBook><description><title-info>
            <genre>space_opera_x</genre><book-title>T</book-title>
        </title-info></description></FictionBook>"#;
        let meta = extract(xml.as_bytes(), DEFAULT_DESCRIPTION_LIMIT);
        assert_eq!(meta.genre, "Space Opera X");
    }

    #[test]
    fn malformed_xml_yields_partial_record() {
        let xml = r#"<FictionBook><description><title-info>
            <book-title>Broken</book-title><genre>sf</gen"#;
        let meta = extract(xml.as_bytes(), DEFAULT_DESCRIPTION_LIMIT);
        assert_eq!(meta.title, "Broken");
    }

    #[test]
    fn windows_1251_document_is_normalized() {
        // <book-title>Тест</book-title> with the title in Windows-1251.
        let mut xml = Vec::new();
        xml.extend_from_slice(b"<FictionBook><description><title-info><book-title>");
        xml.extend_from_slice(&[0xd2, 0xe5, 0xf1, 0xf2]);
        xml.extend_from_slice(b"</book-title></title-info></description></FictionBook>");
        let meta = extract(&xml, DEFAULT_DESCRIPTION_LIMIT);
        assert_eq!(meta.title, "Тест");
    }

    #[test]
    fn sentinel_check() {
        assert!(is_fictionbook(SAMPLE));
        assert!(!is_fictionbook("<html><body/></html>"));
        assert!(!is_fictionbook("not xml at all"));
    }
}
