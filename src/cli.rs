//! Command-line surface.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "colophon", version, about = "Incremental e-book catalog scanner and indexer")]
pub struct Args {
    /// Path to a configuration file (defaults to the per-user config).
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Scan the library directory and reconcile the catalog.
    Scan {
        /// Scan this directory instead of the configured one.
        #[arg(long)]
        books_dir: Option<PathBuf>,
    },
    /// Import a catalog-export (INPX) index instead of walking archives.
    Import {
        /// The .inpx file to import.
        inpx: PathBuf,
    },
    /// Mark every archive for rescan, ignoring stored fingerprints.
    RescanAll,
    /// Search titles, authors and series.
    Search { query: String },
    /// Show one cataloged book in full.
    Show {
        id: i64,
        /// Also re-extract the cover image to this path.
        #[arg(long)]
        cover: Option<PathBuf>,
    },
    /// Catalog totals.
    Stats,
}
