//! Catalog-export (INPX) import.
//!
//! When a library ships a prebuilt INPX index, importing it is much cheaper
//! than opening every archive: each record already names its archive, its
//! internal path, and its metadata. Imported locations point at
//! `<books_dir>/<inp stem>.zip`.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_stream::stream;
use colophon_catalog::{BookLocation, CatalogStore, NewBook};
use colophon_extract::inpx::{self, FieldMap};
use exn::ResultExt;
use futures::Stream;

use crate::dedup;
use crate::error::{ErrorKind, Result};
use crate::events::ScanEvent;

/// Progress range reserved for the import phase.
const PROGRESS_START: u8 = 10;
const PROGRESS_END: u8 = 90;

/// Streams the import of one INPX file. Yields `Progress`, `BookAdded`,
/// `BookReplaced` and `BookSkipped` events; the caller owns `Started` and
/// the terminal events.
pub(crate) fn import_stream<'a>(
    store: &'a dyn CatalogStore,
    inpx_path: &'a Path,
    books_dir: &'a Path,
    cancel: Arc<AtomicBool>,
) -> impl Stream<Item = Result<ScanEvent>> + 'a {
    stream! {
        let bytes = std::fs::read(inpx_path)
            .or_raise(|| ErrorKind::Import)?;
        let catalogs = inpx::parse_catalog(&bytes, &FieldMap::default())
            .or_raise(|| ErrorKind::Import)?;

        let total: usize = catalogs.iter().map(|file| file.records.len()).sum();
        let span = (PROGRESS_END - PROGRESS_START) as usize;
        let mut done = 0_usize;
        let mut percent = PROGRESS_START;

        for catalog in &catalogs {
            let archive_path = books_dir.join(catalog.archive_file_name());
            let archive_path = archive_path.to_string_lossy().into_owned();
            for record in &catalog.records {
                if cancel.load(Ordering::Relaxed) {
                    return;
                }
                done += 1;
                let next = PROGRESS_START + (done * span / total.max(1)) as u8;
                if next > percent {
                    percent = next;
                    yield Ok(ScanEvent::Progress {
                        percent,
                        status: format!("importing {}", catalog.name),
                    });
                }

                let location = BookLocation::ArchiveEntry {
                    archive_path: archive_path.clone(),
                    internal_path: record.internal_path(),
                };
                let book = NewBook::from_metadata(&record.meta, &location, 0);
                yield dedup::reconcile(store, &book, &location).await;
            }
        }
    }
}
