//! CLI entry point for the colophon catalog scanner.

use clap::Parser;
use colophon_config::Config;
use exn::ResultExt;

mod cli;
mod commands;
mod error;
mod guard;
mod store;

use crate::cli::{Args, Command};
use crate::error::{ErrorKind, Result};

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let args = Args::parse();

    let default_level = match args.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match run(args).await {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{err}");
            std::process::ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let config = Config::load(args.config.as_deref()).or_raise(|| ErrorKind::Config)?;
    let store = store::connect(&config).await?;

    match args.command {
        Command::Scan { books_dir } => {
            commands::scan(store.as_ref(), &config, books_dir, None).await
        }
        Command::Import { inpx } => {
            commands::scan(store.as_ref(), &config, None, Some(inpx)).await
        }
        Command::RescanAll => commands::rescan_all(store.as_ref()).await,
        Command::Search { query } => commands::search(store.as_ref(), &query).await,
        Command::Show { id, cover } => {
            commands::show(store.as_ref(), &config, id, cover.as_deref()).await
        }
        Command::Stats => commands::stats(store.as_ref()).await,
    }
}
