//! Size-heuristic duplicate resolution.
//!
//! When a candidate book shares a (title, author) pair with cataloged rows,
//! relative file size decides its fate: a much larger copy replaces what is
//! stored, a much smaller one is assumed to be an abridged cut, and anything
//! in between is treated as the same book.

use colophon_catalog::{BookLocation, BookRecord, CatalogStore, NewBook};
use exn::ResultExt;

use crate::error::{ErrorKind, Result};
use crate::events::{ScanEvent, SkipReason};

/// Candidate below this fraction of an existing copy is considered abridged.
const ABRIDGED_RATIO: f64 = 0.5;
/// Candidate above this fraction of every existing copy supersedes them.
const SUPERSEDES_RATIO: f64 = 1.1;

/// What to do with a candidate book.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// No copy of this title/author is cataloged yet.
    Insert,
    /// A same-or-better copy already exists (or sizes are unknown).
    Skip(SkipReason),
    /// The candidate supersedes these catalog rows.
    Replace(Vec<i64>),
}

/// Pure resolution against the already-cataloged copies of the same
/// title/author. `existing` must be every current match; an empty slice
/// means the candidate is new.
pub fn resolve(candidate_size: i64, existing: &[BookRecord]) -> Resolution {
    if existing.is_empty() {
        return Resolution::Insert;
    }
    // Unknown sizes give the heuristic nothing to compare. Keep what we have.
    if candidate_size <= 0 || existing.iter().any(|record| record.file_size <= 0) {
        return Resolution::Skip(SkipReason::Duplicate);
    }
    let candidate = candidate_size as f64;
    if existing.iter().any(|record| candidate < record.file_size as f64 * ABRIDGED_RATIO) {
        return Resolution::Skip(SkipReason::Abridged);
    }
    if existing.iter().all(|record| candidate > record.file_size as f64 * SUPERSEDES_RATIO) {
        return Resolution::Replace(existing.iter().map(|record| record.id).collect());
    }
    Resolution::Skip(SkipReason::Duplicate)
}

/// Applies a [`Resolution::Replace`]: deletes the superseded rows, then
/// inserts the candidate. Returns the new row id.
pub async fn apply_replace(
    store: &dyn CatalogStore,
    ids: &[i64],
    book: &NewBook,
) -> colophon_catalog::Result<i64> {
    for &id in ids {
        store.delete_book(id).await?;
    }
    store.insert_book(book).await
}

/// Lifts a store failure out of one record's write. Connection loss means
/// the catalog is gone and ends the scan; anything else stays confined to
/// the record at hand.
fn lift<T>(result: colophon_catalog::Result<T>, location: &BookLocation) -> Result<T> {
    match result {
        Ok(value) => Ok(value),
        Err(err) if err.is_retryable() => Err(err).or_raise(|| ErrorKind::Catalog),
        Err(err) => Err(err).or_raise(|| ErrorKind::Persist { path: location.display_path() }),
    }
}

/// Reconciles one candidate book against the catalog: skip it when its
/// location is already cataloged, otherwise resolve against same-title
/// same-author rows and insert, replace, or skip accordingly.
pub(crate) async fn reconcile(
    store: &dyn CatalogStore,
    book: &NewBook,
    location: &BookLocation,
) -> Result<ScanEvent> {
    let existing = lift(
        store
            .find_by_path_triple(&book.file_path, &book.archive_path, &book.archive_internal_path)
            .await,
        location,
    )?;
    if existing.is_some() {
        return Ok(ScanEvent::BookSkipped {
            location: location.clone(),
            reason: SkipReason::AlreadyCataloged,
        });
    }

    let matches = lift(store.find_by_title_author(&book.title, &book.author).await, location)?;
    let title = book.title.clone();
    match resolve(book.file_size, &matches) {
        Resolution::Insert => {
            lift(store.insert_book(book).await, location)?;
            Ok(ScanEvent::BookAdded { location: location.clone(), title })
        }
        Resolution::Replace(ids) => {
            lift(apply_replace(store, &ids, book).await, location)?;
            Ok(ScanEvent::BookReplaced { location: location.clone(), title })
        }
        Resolution::Skip(reason) => Ok(ScanEvent::BookSkipped { location: location.clone(), reason }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn record(id: i64, file_size: i64) -> BookRecord {
        BookRecord {
            id,
            file_path: format!("/lib/{id}.fb2"),
            file_name: format!("{id}.fb2"),
            file_size,
            file_type: "fb2".to_owned(),
            archive_path: String::new(),
            archive_internal_path: String::new(),
            title: "T".to_owned(),
            author: "A".to_owned(),
            genre: String::new(),
            series: String::new(),
            series_number: 0,
            year: 0,
            language: String::new(),
            publisher: String::new(),
            description: String::new(),
            added: 0,
            last_modified: 0,
            last_scanned: 0,
            file_mtime: 0,
        }
    }

    #[test]
    fn no_match_inserts() {
        assert_eq!(resolve(1000, &[]), Resolution::Insert);
    }

    #[rstest]
    #[case::much_smaller(400, Resolution::Skip(SkipReason::Abridged))]
    #[case::comparable(1000, Resolution::Skip(SkipReason::Duplicate))]
    #[case::slightly_larger(1100, Resolution::Skip(SkipReason::Duplicate))]
    #[case::much_larger(1500, Resolution::Replace(vec![1]))]
    fn size_ratio_decides(#[case] candidate: i64, #[case] expected: Resolution) {
        // Existing copy is 1000 bytes; thresholds sit at 500 and 1100.
        assert_eq!(resolve(candidate, &[record(1, 1000)]), expected);
    }

    #[test]
    fn threshold_boundaries_are_exclusive() {
        assert_eq!(resolve(500, &[record(1, 1000)]), Resolution::Skip(SkipReason::Duplicate));
        assert_eq!(resolve(499, &[record(1, 1000)]), Resolution::Skip(SkipReason::Abridged));
        assert_eq!(resolve(1101, &[record(1, 1000)]), Resolution::Replace(vec![1]));
    }

    #[test]
    fn replacement_must_beat_every_copy() {
        let existing = [record(1, 1000), record(2, 2000)];
        assert_eq!(resolve(2100, &existing), Resolution::Skip(SkipReason::Duplicate));
        assert_eq!(resolve(2300, &existing), Resolution::Replace(vec![1, 2]));
    }

    #[rstest]
    #[case::zero_candidate(0, 1000)]
    #[case::zero_existing(1500, 0)]
    fn unknown_sizes_are_conservative(#[case] candidate: i64, #[case] existing_size: i64) {
        assert_eq!(resolve(candidate, &[record(1, existing_size)]), Resolution::Skip(SkipReason::Duplicate));
    }
}
