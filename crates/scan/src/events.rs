use colophon_catalog::BookLocation;

/// Running totals accumulated over one scan pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScanSummary {
    pub files_seen: u64,
    pub books_added: u64,
    pub books_replaced: u64,
    pub books_skipped: u64,
    pub archives_scanned: u64,
    pub archives_unchanged: u64,
    pub failures: u64,
}

/// Progress and outcome notifications yielded by the scan stream.
#[derive(Debug)]
pub enum ScanEvent {
    Started,
    /// `percent` only ever moves forward within a single scan.
    Progress { percent: u8, status: String },
    BookAdded { location: BookLocation, title: String },
    BookReplaced { location: BookLocation, title: String },
    BookSkipped { location: BookLocation, reason: SkipReason },
    /// Fingerprint matched the stored one; the container was not opened.
    ArchiveUnchanged { path: String },
    /// The archive could not be opened or enumerated. It stays marked for
    /// rescan so the next pass retries it.
    ArchiveFailed { path: String, message: String },
    Finished(ScanSummary),
    Cancelled(ScanSummary),
}

/// Why a discovered book was not added to the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Same path triple already cataloged.
    AlreadyCataloged,
    /// A same-or-better copy of this title/author exists.
    Duplicate,
    /// The candidate looks like an abridged cut of an existing copy.
    Abridged,
    /// Metadata extraction failed beyond recovery.
    Unreadable,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Self::AlreadyCataloged => "already cataloged",
            Self::Duplicate => "duplicate of an existing copy",
            Self::Abridged => "smaller than an existing copy",
            Self::Unreadable => "unreadable",
        };
        f.write_str(text)
    }
}
