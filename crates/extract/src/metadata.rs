//! The canonical metadata record produced by every extractor.

/// Default cap on the description/annotation length, in characters.
pub const DEFAULT_DESCRIPTION_LIMIT: usize = 1000;

/// Author used when nothing better can be derived, not even from the
/// filename.
pub const UNKNOWN_AUTHOR: &str = "Unknown Author";

/// A cover image pulled out of a book file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CoverImage {
    pub media_type: String,
    pub data: Vec<u8>,
}

/// Canonical book metadata, as extracted from file content.
///
/// Extractors fill what they can and leave the rest at the zero value
/// (`0` series number and year mean "not present"). The caller applies
/// [`BookMetadata::fallback_from_filename`] afterwards, so a record that
/// reaches persistence always has a non-empty title and author.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BookMetadata {
    pub title: String,
    /// Normalized "Last First [Middle]", or free text from a fallback.
    pub author: String,
    pub genre: String,
    pub series: String,
    pub series_number: i32,
    pub year: i32,
    pub language: String,
    pub publisher: String,
    pub description: String,
    pub file_size: u64,
    pub cover: Option<CoverImage>,
}

impl BookMetadata {
    /// Fill empty title/author from the filename.
    ///
    /// Recognized shapes, in order: `Author - Title.ext` (splits on the
    /// first `" - "`), `01. Title.ext` (drops the leading ordinal),
    /// `Title_with_underscores.ext` (underscores become spaces). Anything
    /// else uses the bare stem. The author falls back to
    /// [`UNKNOWN_AUTHOR`] when no shape yields one.
    pub fn fallback_from_filename(&mut self, file_name: &str) {
        if self.title.is_empty() {
            let stem = file_stem(file_name);
            if let Some((author, title)) = stem.split_once(" - ") {
                if self.author.is_empty() {
                    self.author = collapse_whitespace(author);
                }
                self.title = collapse_whitespace(title);
            } else if let Some(title) = strip_ordinal(stem) {
                self.title = collapse_whitespace(title);
            } else if stem.contains('_') {
                self.title = collapse_whitespace(&stem.replace('_', " "));
            } else {
                self.title = collapse_whitespace(stem);
            }
        }
        if self.title.is_empty() {
            self.title = "Unknown Title".to_owned();
        }
        if self.author.is_empty() {
            self.author = UNKNOWN_AUTHOR.to_owned();
        }
    }
}

fn file_stem(file_name: &str) -> &str {
    match file_name.rsplit_once('.') {
        Some((stem, _ext)) if !stem.is_empty() => stem,
        _ => file_name,
    }
}

/// `"01. Title"` → `"Title"`; anything not starting with digits-dot is
/// left alone.
fn strip_ordinal(stem: &str) -> Option<&str> {
    let (ordinal, rest) = stem.split_once('.')?;
    if ordinal.is_empty() || !ordinal.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let rest = rest.trim_start();
    (!rest.is_empty()).then_some(rest)
}

/// Trim and collapse internal whitespace runs to single spaces.
pub(crate) fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Extract the first run of four consecutive ASCII digits as a year.
pub(crate) fn year_from_date(date: &str) -> i32 {
    let bytes = date.as_bytes();
    let mut run = 0;
    for (index, byte) in bytes.iter().enumerate() {
        if byte.is_ascii_digit() {
            run += 1;
            if run == 4 {
                return date[index + 1 - 4..=index].parse().unwrap_or(0);
            }
        } else {
            run = 0;
        }
    }
    0
}

/// Truncate to `limit` characters on a char boundary.
pub(crate) fn truncate_chars(text: &mut String, limit: usize) {
    if text.chars().count() > limit {
        *text = text.chars().take(limit).collect();
    }
}

/// Strip markup tags and collapse whitespace, truncating to `limit`
/// characters on a char boundary.
pub(crate) fn strip_markup(text: &str, limit: usize) -> String {
    let mut plain = String::with_capacity(text.len().min(limit));
    let mut in_tag = false;
    for c in text.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            c if !in_tag => plain.push(c),
            _ => {}
        }
    }
    let mut collapsed = collapse_whitespace(&plain);
    truncate_chars(&mut collapsed, limit);
    collapsed
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("Tolstoy - War and Peace.fb2", "War and Peace", "Tolstoy")]
    #[case("01. The Hobbit.epub", "The Hobbit", UNKNOWN_AUTHOR)]
    #[case("brave_new_world.fb2", "brave new world", UNKNOWN_AUTHOR)]
    #[case("Dune.epub", "Dune", UNKNOWN_AUTHOR)]
    #[case("noextension", "noextension", UNKNOWN_AUTHOR)]
    fn fallback_shapes(#[case] file_name: &str, #[case] title: &str, #[case] author: &str) {
        let mut meta = BookMetadata::default();
        meta.fallback_from_filename(file_name);
        assert_eq!(meta.title, title);
        assert_eq!(meta.author, author);
    }

    #[test]
    fn fallback_never_overwrites_extracted_fields() {
        let mut meta =
            BookMetadata { title: "Real Title".into(), author: "Real Author".into(), ..Default::default() };
        meta.fallback_from_filename("Somebody - Something Else.fb2");
        assert_eq!(meta.title, "Real Title");
        assert_eq!(meta.author, "Real Author");
    }

    #[test]
    fn fallback_fills_author_but_keeps_title_nonempty_invariant() {
        let mut meta = BookMetadata::default();
        meta.fallback_from_filename(".fb2");
        assert!(!meta.title.is_empty());
        assert!(!meta.author.is_empty());
    }

    #[rstest]
    #[case("2005", 2005)]
    #[case("2005-01-17", 2005)]
    #[case("17.01.1994", 1994)]
    #[case("circa 1876?", 1876)]
    #[case("n.d.", 0)]
    #[case("", 0)]
    fn years(#[case] date: &str, #[case] expected: i32) {
        assert_eq!(year_from_date(date), expected);
    }

    #[test]
    fn markup_is_stripped_and_truncated() {
        let html = "<p>First   paragraph.</p>\n\n<p>Second <em>one</em>.</p>";
        assert_eq!(strip_markup(html, 1000), "First paragraph. Second one.");
        assert_eq!(strip_markup(html, 5), "First");
    }
}
