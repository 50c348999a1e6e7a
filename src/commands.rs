//! Command implementations.

use std::path::{Path, PathBuf};
use std::pin::pin;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use colophon_archive::{ArchiveHandle, ArchiveSource};
use colophon_catalog::{BookRecord, CatalogStore};
use colophon_config::Config;
use colophon_extract::BookFormat;
use colophon_scan::{HashAlgorithm, ScanEvent, ScanOptions, ScanSummary};
use exn::{OptionExt, ResultExt};
use futures::StreamExt;

use crate::error::{ErrorKind, Result};
use crate::guard::ScanGuard;

fn scan_options(config: &Config, books_dir: Option<PathBuf>, inpx: Option<PathBuf>) -> ScanOptions {
    let scanner = &config.scanner;
    let mut options = ScanOptions::new(books_dir.unwrap_or_else(|| scanner.books_dir.clone()));
    options.inpx_path = inpx.or_else(|| {
        scanner.use_inpx.then(|| scanner.inpx_path.clone())
    });
    if let Some(algorithm) = HashAlgorithm::from_name(&scanner.hash_algorithm) {
        options.hash_algorithm = algorithm;
    } else {
        tracing::warn!(name = %scanner.hash_algorithm, "unknown hash algorithm, using blake3");
    }
    options.max_entry_size = scanner.max_entry_size;
    options.max_entries_per_archive = scanner.max_entries_per_archive;
    options.enumeration_timeout = Duration::from_secs(scanner.enumeration_timeout_secs);
    options.description_limit = scanner.description_limit;
    options
}

pub async fn scan(
    store: &dyn CatalogStore,
    config: &Config,
    books_dir: Option<PathBuf>,
    inpx: Option<PathBuf>,
) -> Result<()> {
    if books_dir.is_none() {
        config.validate_for_scan().or_raise(|| ErrorKind::Config)?;
    }
    let options = scan_options(config, books_dir, inpx);
    let _guard = ScanGuard::acquire(&options.books_dir)?;

    let cancel = Arc::new(AtomicBool::new(false));
    {
        let cancel = Arc::clone(&cancel);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("interrupt received, finishing the current item");
                cancel.store(true, std::sync::atomic::Ordering::Relaxed);
            }
        });
    }

    let mut events = pin!(colophon_scan::scan(store, options, cancel));
    while let Some(event) = events.next().await {
        let event = event.or_raise(|| ErrorKind::Scan)?;
        report(&event);
    }
    Ok(())
}

fn report(event: &ScanEvent) {
    match event {
        ScanEvent::Started => tracing::info!("scan started"),
        ScanEvent::Progress { percent, status } => tracing::info!("[{percent:>3}%] {status}"),
        ScanEvent::BookAdded { location, title } => {
            tracing::info!(path = %location.display_path(), "added: {title}");
        }
        ScanEvent::BookReplaced { location, title } => {
            tracing::info!(path = %location.display_path(), "replaced with larger copy: {title}");
        }
        ScanEvent::BookSkipped { location, reason } => {
            tracing::debug!(path = %location.display_path(), "skipped: {reason}");
        }
        ScanEvent::ArchiveUnchanged { path } => tracing::debug!("unchanged: {path}"),
        ScanEvent::ArchiveFailed { path, message } => {
            tracing::warn!("archive failed, will retry next scan: {path}: {message}");
        }
        ScanEvent::Finished(summary) => {
            tracing::info!("scan finished");
            print_summary(summary);
        }
        ScanEvent::Cancelled(summary) => {
            tracing::info!("scan cancelled, catalog rows written so far are kept");
            print_summary(summary);
        }
    }
}

fn print_summary(summary: &ScanSummary) {
    println!("files seen:         {}", summary.files_seen);
    println!("books added:        {}", summary.books_added);
    println!("books replaced:     {}", summary.books_replaced);
    println!("books skipped:      {}", summary.books_skipped);
    println!("archives scanned:   {}", summary.archives_scanned);
    println!("archives unchanged: {}", summary.archives_unchanged);
    println!("failures:           {}", summary.failures);
}

pub async fn rescan_all(store: &dyn CatalogStore) -> Result<()> {
    store.mark_all_archives_for_rescan().await.or_raise(|| ErrorKind::Catalog)?;
    println!("all archives marked for rescan; run `colophon scan` to rebuild");
    Ok(())
}

pub async fn search(store: &dyn CatalogStore, query: &str) -> Result<()> {
    let books = store.search(query).await.or_raise(|| ErrorKind::Catalog)?;
    if books.is_empty() {
        println!("no matches for '{query}'");
        return Ok(());
    }
    for book in &books {
        let series = if book.series.is_empty() {
            String::new()
        } else {
            format!("  [{} #{}]", book.series, book.series_number)
        };
        println!("{:>6}  {}: {}{}", book.id, book.author, book.title, series);
    }
    Ok(())
}

pub async fn show(
    store: &dyn CatalogStore,
    config: &Config,
    id: i64,
    cover: Option<&Path>,
) -> Result<()> {
    let book = store
        .get_book(id)
        .await
        .or_raise(|| ErrorKind::Catalog)?
        .ok_or_raise(|| ErrorKind::NotFound { id })?;

    println!("id:        {}", book.id);
    println!("title:     {}", book.title);
    println!("author:    {}", book.author);
    if !book.series.is_empty() {
        println!("series:    {} #{}", book.series, book.series_number);
    }
    if !book.genre.is_empty() {
        println!("genre:     {}", book.genre);
    }
    if book.year > 0 {
        println!("year:      {}", book.year);
    }
    if !book.language.is_empty() {
        println!("language:  {}", book.language);
    }
    if !book.publisher.is_empty() {
        println!("publisher: {}", book.publisher);
    }
    println!("format:    {}", book.file_type);
    println!("size:      {} bytes", book.file_size);
    match book.archive_path() {
        Some(archive) => println!("location:  {} :: {}", archive, book.archive_internal_path().unwrap_or_default()),
        None => println!("location:  {}", book.file_path),
    }
    if !book.description.is_empty() {
        println!("\n{}", book.description);
    }

    if let Some(output) = cover {
        write_cover(&book, config, output)?;
    }
    Ok(())
}

/// Re-extracts the book's cover image from its source and writes it out.
/// Covers are not persisted in the catalog; the source of truth stays the
/// book file itself.
fn write_cover(book: &BookRecord, config: &Config, output: &Path) -> Result<()> {
    let content_path = book.archive_path().unwrap_or(&book.file_path).to_owned();
    let raise_content = || ErrorKind::Content { path: content_path.clone() };

    let bytes = match (book.archive_path(), book.archive_internal_path()) {
        (Some(archive), Some(internal)) => {
            let handle = ArchiveHandle::open(ArchiveSource::Path(PathBuf::from(archive)))
                .or_raise(raise_content)?;
            handle.read_entry(internal, config.scanner.max_entry_size).or_raise(raise_content)?
        }
        _ => std::fs::read(&book.file_path).or_raise(raise_content)?,
    };

    let format = BookFormat::from_extension(&book.file_type).unwrap_or(BookFormat::FilenameOnly);
    let meta = colophon_extract::extract(&bytes, format, &book.file_name, config.scanner.description_limit);
    let cover = meta.cover.ok_or_raise(|| ErrorKind::NotFound { id: book.id })?;
    std::fs::write(output, &cover.data).or_raise(|| ErrorKind::Io {
        path: output.display().to_string(),
    })?;
    println!("cover ({}) written to {}", cover.media_type, output.display());
    Ok(())
}

pub async fn stats(store: &dyn CatalogStore) -> Result<()> {
    let books = store.count_books().await.or_raise(|| ErrorKind::Catalog)?;
    let authors = store.count_authors().await.or_raise(|| ErrorKind::Catalog)?;
    let series = store.count_series().await.or_raise(|| ErrorKind::Catalog)?;
    println!("books:   {books}");
    println!("authors: {authors}");
    println!("series:  {series}");
    Ok(())
}
