//! The scan orchestrator.
//!
//! One pass over the library directory, emitted as a stream of
//! [`ScanEvent`]s. Per-item failures are logged and counted but never stop
//! the pass; only a missing root directory or an unreachable catalog
//! terminates the stream with an error.

use std::path::{Path, PathBuf};
use std::pin::pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, UNIX_EPOCH};

use async_stream::stream;
use colophon_archive::{ArchiveHandle, ArchiveSource, EnumerationBudget};
use colophon_catalog::{BookLocation, CatalogStore, NewBook, unix_now};
use colophon_extract::BookFormat;
use futures::{Stream, StreamExt};

use crate::error::{ErrorKind, Result};
use crate::events::{ScanEvent, ScanSummary};
use crate::fingerprint::{self, HashAlgorithm};
use crate::walk::{self, Discovered};
use crate::{dedup, import};

/// Tunables for one scan pass.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub books_dir: PathBuf,
    /// When set, the INPX import runs first and, if it succeeds, replaces
    /// the directory walk entirely.
    pub inpx_path: Option<PathBuf>,
    pub hash_algorithm: HashAlgorithm,
    /// Per-entry size cap in bytes. Larger entries are skipped.
    pub max_entry_size: u64,
    pub max_entries_per_archive: usize,
    pub enumeration_timeout: Duration,
    pub description_limit: usize,
}

impl ScanOptions {
    pub fn new(books_dir: impl Into<PathBuf>) -> Self {
        Self {
            books_dir: books_dir.into(),
            inpx_path: None,
            hash_algorithm: HashAlgorithm::default(),
            max_entry_size: colophon_archive::DEFAULT_MAX_ENTRY_SIZE,
            max_entries_per_archive: colophon_archive::DEFAULT_MAX_ENTRIES,
            enumeration_timeout: colophon_archive::DEFAULT_TIMEOUT,
            description_limit: colophon_extract::DEFAULT_DESCRIPTION_LIMIT,
        }
    }
}

/// Runs one scan pass. The returned stream must be polled to completion or
/// dropped; rows written before a cancellation or drop stay in the catalog.
pub fn scan<'a>(
    store: &'a dyn CatalogStore,
    options: ScanOptions,
    cancel: Arc<AtomicBool>,
) -> impl Stream<Item = Result<ScanEvent>> + 'a {
    stream! {
        yield Ok(ScanEvent::Started);
        let mut summary = ScanSummary::default();
        let mut percent = 0_u8;

        if let Err(err) = ensure_root(&options.books_dir) {
            yield Err(err);
            return;
        }

        if let Some(inpx_path) = options.inpx_path.as_deref() {
            let mut failed = false;
            {
                let mut events = pin!(import::import_stream(
                    store,
                    inpx_path,
                    &options.books_dir,
                    Arc::clone(&cancel),
                ));
                while let Some(event) = events.next().await {
                    match event {
                        Ok(event) => {
                            tally(&mut summary, &event);
                            clamp_progress(&mut percent, &event);
                            yield Ok(event);
                        }
                        Err(err) if matches!(&*err, ErrorKind::Catalog) => {
                            yield Err(err);
                            return;
                        }
                        Err(err) if matches!(&*err, ErrorKind::Persist { .. }) => {
                            tracing::warn!(error = %err, "imported record dropped");
                            summary.failures += 1;
                        }
                        Err(err) => {
                            tracing::warn!(
                                error = %err,
                                path = %inpx_path.display(),
                                "catalog export import failed, falling back to directory walk",
                            );
                            summary.failures += 1;
                            failed = true;
                            break;
                        }
                    }
                }
            }
            if cancel.load(Ordering::Relaxed) {
                yield Ok(ScanEvent::Cancelled(summary));
                return;
            }
            if !failed {
                yield Ok(ScanEvent::Finished(summary));
                return;
            }
        }

        let files = walk::discover(&options.books_dir);
        summary.files_seen = files.len() as u64;
        let total = files.len().max(1);

        for (index, discovered) in files.iter().enumerate() {
            if cancel.load(Ordering::Relaxed) {
                yield Ok(ScanEvent::Cancelled(summary));
                return;
            }
            let next = (index * 100 / total) as u8;
            if next > percent {
                percent = next;
                yield Ok(ScanEvent::Progress {
                    percent,
                    status: discovered.path().display().to_string(),
                });
            }

            match discovered {
                Discovered::Book(path) => {
                    match scan_book(store, path, options.description_limit).await {
                        Ok(event) => {
                            tally(&mut summary, &event);
                            yield Ok(event);
                        }
                        Err(err) if matches!(&*err, ErrorKind::Catalog) => {
                            yield Err(err);
                            return;
                        }
                        Err(err) => {
                            tracing::warn!(error = %err, path = %path.display(), "book skipped");
                            summary.failures += 1;
                        }
                    }
                }
                Discovered::Archive(path) => {
                    let events = scan_archive(store, path, &options, &cancel, &mut summary).await;
                    for event in events {
                        match event {
                            Ok(event) => yield Ok(event),
                            Err(err) => {
                                yield Err(err);
                                return;
                            }
                        }
                    }
                    if cancel.load(Ordering::Relaxed) {
                        yield Ok(ScanEvent::Cancelled(summary));
                        return;
                    }
                }
            }
        }

        if percent < 100 {
            yield Ok(ScanEvent::Progress { percent: 100, status: "done".to_owned() });
        }
        yield Ok(ScanEvent::Finished(summary));
    }
}

fn ensure_root(path: &Path) -> Result<()> {
    if !path.is_dir() {
        exn::bail!(ErrorKind::MissingRoot { path: path.display().to_string() });
    }
    Ok(())
}

fn tally(summary: &mut ScanSummary, event: &ScanEvent) {
    match event {
        ScanEvent::BookAdded { .. } => summary.books_added += 1,
        ScanEvent::BookReplaced { .. } => summary.books_replaced += 1,
        ScanEvent::BookSkipped { .. } => summary.books_skipped += 1,
        _ => {}
    }
}

fn clamp_progress(percent: &mut u8, event: &ScanEvent) {
    if let ScanEvent::Progress { percent: reported, .. } = event
        && *reported > *percent
    {
        *percent = *reported;
    }
}

fn file_mtime(path: &Path) -> i64 {
    std::fs::metadata(path)
        .and_then(|meta| meta.modified())
        .ok()
        .and_then(|modified| modified.duration_since(UNIX_EPOCH).ok())
        .map(|elapsed| elapsed.as_secs() as i64)
        .unwrap_or(0)
}

async fn scan_book(
    store: &dyn CatalogStore,
    path: &Path,
    description_limit: usize,
) -> Result<ScanEvent> {
    use exn::ResultExt;

    let bytes = std::fs::read(path).or_raise(|| ErrorKind::Io {
        path: path.display().to_string(),
    })?;
    let location = BookLocation::File { path: path.display().to_string() };
    let file_name = location.file_name().to_owned();
    let format = extension(path)
        .as_deref()
        .and_then(BookFormat::from_extension)
        .unwrap_or(BookFormat::FilenameOnly);
    let meta = colophon_extract::extract(&bytes, format, &file_name, description_limit);
    let book = NewBook::from_metadata(&meta, &location, file_mtime(path));
    dedup::reconcile(store, &book, &location).await
}

/// Scans one archive end to end and returns everything it yielded. The
/// fingerprint row is updated after every attempt, success or not, so a
/// broken archive stays marked for rescan.
async fn scan_archive(
    store: &dyn CatalogStore,
    path: &Path,
    options: &ScanOptions,
    cancel: &AtomicBool,
    summary: &mut ScanSummary,
) -> Vec<Result<ScanEvent>> {
    let path_text = path.display().to_string();
    let mut events = Vec::new();

    let hash = match options.hash_algorithm.hash_file(path) {
        Ok(hash) => hash,
        Err(err) => {
            summary.failures += 1;
            events.push(Ok(ScanEvent::ArchiveFailed { path: path_text, message: err.to_string() }));
            return events;
        }
    };
    let mtime = file_mtime(path);

    match fingerprint::needs_rescan(store, &path_text, &hash, mtime).await {
        Ok(true) => {}
        Ok(false) => {
            if let Err(err) = store.touch_archive_last_scanned(&path_text, unix_now()).await {
                tracing::warn!(error = %err, path = %path_text, "failed to refresh scan timestamp");
            }
            summary.archives_unchanged += 1;
            events.push(Ok(ScanEvent::ArchiveUnchanged { path: path_text }));
            return events;
        }
        Err(err) if matches!(&*err, ErrorKind::Catalog) => {
            events.push(Err(err));
            return events;
        }
        Err(err) => {
            summary.failures += 1;
            events.push(Ok(ScanEvent::ArchiveFailed { path: path_text, message: err.to_string() }));
            return events;
        }
    }

    let outcome = scan_archive_entries(store, path, &path_text, options, cancel, summary, &mut events).await;
    let (succeeded, file_count, total_size) = match outcome {
        Ok(ArchiveOutcome { cancelled: true, .. }) => {
            // Incomplete pass. Keep the rescan flag so the next run resumes.
            (false, 0, 0)
        }
        Ok(outcome) => {
            summary.archives_scanned += 1;
            (true, outcome.file_count, outcome.total_size)
        }
        Err(message) => {
            summary.failures += 1;
            events.push(Ok(ScanEvent::ArchiveFailed { path: path_text.clone(), message }));
            (false, 0, 0)
        }
    };
    if let Err(err) =
        fingerprint::record_scan(store, &path_text, &hash, file_count, total_size, mtime, succeeded).await
    {
        if matches!(&*err, ErrorKind::Catalog) {
            events.push(Err(err));
        } else {
            tracing::warn!(error = %err, path = %path_text, "could not record the scan attempt");
            summary.failures += 1;
        }
    }
    events
}

struct ArchiveOutcome {
    file_count: i64,
    total_size: i64,
    cancelled: bool,
}

async fn scan_archive_entries(
    store: &dyn CatalogStore,
    path: &Path,
    path_text: &str,
    options: &ScanOptions,
    cancel: &AtomicBool,
    summary: &mut ScanSummary,
    events: &mut Vec<Result<ScanEvent>>,
) -> std::result::Result<ArchiveOutcome, String> {
    let handle = ArchiveHandle::open(ArchiveSource::Path(path.to_path_buf()))
        .map_err(|err| err.to_string())?;
    let mut budget = EnumerationBudget::new(options.max_entries_per_archive, options.enumeration_timeout);
    let entries = handle.entries(&mut budget).map_err(|err| err.to_string())?;

    let file_count = entries.iter().filter(|entry| entry.is_file).count() as i64;
    let total_size = entries.iter().map(|entry| entry.size as i64).sum();

    for entry in &entries {
        if cancel.load(Ordering::Relaxed) {
            return Ok(ArchiveOutcome { file_count, total_size, cancelled: true });
        }
        if !entry.is_file {
            continue;
        }
        let Some(format) = entry
            .path
            .rsplit_once('.')
            .and_then(|(_, ext)| BookFormat::from_extension(ext))
        else {
            continue;
        };
        if entry.size > options.max_entry_size {
            tracing::warn!(
                entry = %entry.path,
                size = entry.size,
                archive = %path_text,
                "entry exceeds the size cap, skipped",
            );
            summary.failures += 1;
            continue;
        }
        let bytes = match handle.read_entry(&entry.path, options.max_entry_size) {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::warn!(error = %err, entry = %entry.path, archive = %path_text, "unreadable entry, skipped");
                summary.failures += 1;
                continue;
            }
        };
        let location = BookLocation::ArchiveEntry {
            archive_path: path_text.to_owned(),
            internal_path: entry.path.clone(),
        };
        let file_name = location.file_name().to_owned();
        let meta = colophon_extract::extract(&bytes, format, &file_name, options.description_limit);
        let book = NewBook::from_metadata(&meta, &location, file_mtime(path));
        match dedup::reconcile(store, &book, &location).await {
            Ok(event) => {
                tally(summary, &event);
                events.push(Ok(event));
            }
            Err(err) if matches!(&*err, ErrorKind::Catalog) => {
                // The store is gone, so wrapping up this archive is moot.
                events.push(Err(err));
                return Ok(ArchiveOutcome { file_count, total_size, cancelled: true });
            }
            Err(err) => {
                tracing::warn!(error = %err, entry = %entry.path, archive = %path_text, "entry skipped");
                summary.failures += 1;
            }
        }
    }
    Ok(ArchiveOutcome { file_count, total_size, cancelled: false })
}

fn extension(path: &Path) -> Option<String> {
    path.extension().map(|ext| ext.to_string_lossy().to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use colophon_catalog::SqliteCatalog;
    use futures::StreamExt;
    use std::io::Write;

    fn fb2_doc(title: &str, padding: usize) -> String {
        format!(
            concat!(
                "<?xml version=\"1.0\" encoding=\"utf-8\"?>",
                "<FictionBook xmlns=\"http://www.gribuser.ru/xml/fictionbook/2.0\">",
                "<description><title-info>",
                "<genre>sf</genre>",
                "<author><first-name>Ivan</first-name><last-name>Sidorov</last-name></author>",
                "<book-title>{title}</book-title>",
                "<lang>ru</lang>",
                "</title-info></description>",
                "<body><p>{body}</p></body>",
                "</FictionBook>",
            ),
            title = title,
            body = "x".repeat(padding),
        )
    }

    fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
        let file = std::fs::File::create(path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        for (name, bytes) in entries {
            writer.start_file(*name, zip::write::SimpleFileOptions::default()).unwrap();
            writer.write_all(bytes).unwrap();
        }
        writer.finish().unwrap();
    }

    async fn run(store: &SqliteCatalog, options: ScanOptions) -> Vec<ScanEvent> {
        let cancel = Arc::new(AtomicBool::new(false));
        let events: Vec<_> = scan(store, options, cancel).collect().await;
        events.into_iter().map(|event| event.unwrap()).collect()
    }

    fn summary_of(events: &[ScanEvent]) -> &ScanSummary {
        match events.last().unwrap() {
            ScanEvent::Finished(summary) | ScanEvent::Cancelled(summary) => summary,
            other => panic!("stream ended with {other:?}"),
        }
    }

    #[tokio::test]
    async fn archives_are_scanned_once_and_skipped_while_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteCatalog::connect_in_memory().await.unwrap();
        write_zip(
            &dir.path().join("pack.zip"),
            &[
                ("one.fb2", fb2_doc("First", 100).as_bytes()),
                ("two.fb2", fb2_doc("Second", 100).as_bytes()),
                ("notes.txt", b"not gated by the fb2 sentinel"),
            ],
        );

        let events = run(&store, ScanOptions::new(dir.path())).await;
        let summary = summary_of(&events);
        assert_eq!(summary.books_added, 3);
        assert_eq!(summary.archives_scanned, 1);
        assert_eq!(summary.failures, 0);
        assert_eq!(store.count_books().await.unwrap(), 3);

        let book = store.search("First").await.unwrap().pop().unwrap();
        assert_eq!(book.author, "Sidorov Ivan");
        assert_eq!(book.genre, "Science Fiction");
        assert_eq!(book.archive_internal_path(), Some("one.fb2"));

        // Second pass: fingerprint matches, the container is never opened.
        let events = run(&store, ScanOptions::new(dir.path())).await;
        let summary = summary_of(&events);
        assert_eq!(summary.archives_unchanged, 1);
        assert_eq!(summary.books_added, 0);
        assert!(events.iter().any(|event| matches!(event, ScanEvent::ArchiveUnchanged { .. })));
        assert_eq!(store.count_books().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn forced_rescan_reopens_unchanged_archives() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteCatalog::connect_in_memory().await.unwrap();
        write_zip(&dir.path().join("pack.zip"), &[("one.fb2", fb2_doc("First", 100).as_bytes())]);

        run(&store, ScanOptions::new(dir.path())).await;
        store.mark_all_archives_for_rescan().await.unwrap();

        let events = run(&store, ScanOptions::new(dir.path())).await;
        let summary = summary_of(&events);
        assert_eq!(summary.archives_scanned, 1);
        assert_eq!(summary.archives_unchanged, 0);
        // Already cataloged, so the rescan changes nothing.
        assert_eq!(summary.books_added, 0);
        assert_eq!(summary.books_skipped, 1);
        assert_eq!(store.count_books().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn a_larger_copy_replaces_a_smaller_one() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteCatalog::connect_in_memory().await.unwrap();
        std::fs::write(dir.path().join("a.fb2"), fb2_doc("Same Book", 100)).unwrap();
        std::fs::write(dir.path().join("b.fb2"), fb2_doc("Same Book", 4000)).unwrap();

        let events = run(&store, ScanOptions::new(dir.path())).await;
        let summary = summary_of(&events);
        assert_eq!(summary.files_seen, 2);
        assert_eq!(summary.books_added, 1);
        assert_eq!(summary.books_replaced, 1);
        assert_eq!(store.count_books().await.unwrap(), 1);
        let kept = store.search("Same Book").await.unwrap().pop().unwrap();
        assert!(kept.file_path.ends_with("b.fb2"));
    }

    #[tokio::test]
    async fn one_broken_archive_does_not_stop_the_pass() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteCatalog::connect_in_memory().await.unwrap();
        std::fs::write(dir.path().join("broken.zip"), b"PK\x03\x04 but then garbage").unwrap();
        write_zip(&dir.path().join("good.zip"), &[("one.fb2", fb2_doc("Survivor", 100).as_bytes())]);

        let events = run(&store, ScanOptions::new(dir.path())).await;
        let summary = summary_of(&events);
        assert_eq!(summary.books_added, 1);
        assert_eq!(summary.failures, 1);
        assert!(events.iter().any(|event| matches!(event, ScanEvent::ArchiveFailed { .. })));

        // The broken archive stays marked for rescan and is retried.
        let events = run(&store, ScanOptions::new(dir.path())).await;
        assert!(events.iter().any(|event| matches!(event, ScanEvent::ArchiveFailed { .. })));
        assert_eq!(summary_of(&events).archives_unchanged, 1);
    }

    #[tokio::test]
    async fn one_failed_write_does_not_stop_the_pass() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteCatalog::connect_in_memory().await.unwrap();
        // Reject one title at the schema level to stand in for a per-row
        // persistence failure.
        sqlx::query(
            "CREATE TRIGGER reject_one BEFORE INSERT ON books \
             WHEN NEW.title = 'Rejected' \
             BEGIN SELECT RAISE(ABORT, 'rejected by trigger'); END",
        )
        .execute(store.pool())
        .await
        .unwrap();
        std::fs::write(dir.path().join("a.fb2"), fb2_doc("Rejected", 100)).unwrap();
        std::fs::write(dir.path().join("b.fb2"), fb2_doc("Survivor", 100)).unwrap();

        let events = run(&store, ScanOptions::new(dir.path())).await;
        let summary = summary_of(&events);
        assert!(matches!(events.last().unwrap(), ScanEvent::Finished(_)));
        assert_eq!(summary.failures, 1);
        assert_eq!(summary.books_added, 1);
        assert_eq!(store.search("Survivor").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn missing_root_terminates_the_stream() {
        let store = SqliteCatalog::connect_in_memory().await.unwrap();
        let cancel = Arc::new(AtomicBool::new(false));
        let events: Vec<_> = scan(&store, ScanOptions::new("/no/such/library"), cancel).collect().await;
        assert!(matches!(events[0], Ok(ScanEvent::Started)));
        let err = events[1].as_ref().unwrap_err();
        assert!(matches!(&**err, ErrorKind::MissingRoot { .. }));
    }

    #[tokio::test]
    async fn cancellation_yields_a_summary_and_keeps_written_rows() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteCatalog::connect_in_memory().await.unwrap();
        std::fs::write(dir.path().join("a.fb2"), fb2_doc("Kept", 100)).unwrap();

        let cancel = Arc::new(AtomicBool::new(true));
        let events: Vec<_> = scan(&store, ScanOptions::new(dir.path()), cancel).collect().await;
        let events: Vec<_> = events.into_iter().map(|event| event.unwrap()).collect();
        assert!(matches!(events.last().unwrap(), ScanEvent::Cancelled(_)));
        assert_eq!(store.count_books().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn catalog_export_import_replaces_the_directory_walk() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteCatalog::connect_in_memory().await.unwrap();
        std::fs::write(dir.path().join("walked.fb2"), fb2_doc("Never Seen", 100)).unwrap();

        let inpx = dir.path().join("library.inpx");
        let record = "Sidorov:Ivan:\x04sf\x04Imported Title\x04\x040\x04book001\x042048\x041\x040\x04fb2\x042005\x04ru\x04\r\n";
        write_zip(&inpx, &[("books01.inp", record.as_bytes())]);

        let mut options = ScanOptions::new(dir.path());
        options.inpx_path = Some(inpx);
        let events = run(&store, options).await;
        let summary = summary_of(&events);
        assert_eq!(summary.books_added, 1);
        assert_eq!(summary.files_seen, 0, "the walk must not run after a successful import");

        let book = store.search("Imported").await.unwrap().pop().unwrap();
        assert_eq!(book.author, "Sidorov Ivan");
        assert_eq!(book.file_size, 2048);
        assert_eq!(book.archive_internal_path(), Some("book001.fb2"));
        assert!(book.archive_path().unwrap().ends_with("books01.zip"));
    }

    #[tokio::test]
    async fn failed_import_falls_through_to_the_walk() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteCatalog::connect_in_memory().await.unwrap();
        std::fs::write(dir.path().join("walked.fb2"), fb2_doc("Found Anyway", 100)).unwrap();
        let inpx = dir.path().join("library.inpx");
        std::fs::write(&inpx, b"not a zip at all").unwrap();

        let mut options = ScanOptions::new(dir.path());
        options.inpx_path = Some(inpx);
        let events = run(&store, options).await;
        let summary = summary_of(&events);
        assert_eq!(summary.books_added, 1);
        assert_eq!(summary.files_seen, 1);
        assert_eq!(summary.failures, 1);
        assert_eq!(store.search("Found Anyway").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn progress_is_monotone() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteCatalog::connect_in_memory().await.unwrap();
        for index in 0..8 {
            std::fs::write(dir.path().join(format!("book{index}.fb2")), fb2_doc(&format!("Book {index}"), 50)).unwrap();
        }
        let events = run(&store, ScanOptions::new(dir.path())).await;
        let reported: Vec<u8> = events
            .iter()
            .filter_map(|event| match event {
                ScanEvent::Progress { percent, .. } => Some(*percent),
                _ => None,
            })
            .collect();
        assert!(!reported.is_empty());
        assert!(reported.windows(2).all(|pair| pair[0] < pair[1]));
    }
}
