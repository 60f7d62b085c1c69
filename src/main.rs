//! `notch` - a terminal mail reader over a tagged mail index
//!
//! Opens the index, starts a search and hands control to the interactive
//! frontend.

use anyhow::{Context, Result};
use clap::Parser;
use log::LevelFilter;
use notch_core::{logger, Config, MemoryStore};
use std::path::PathBuf;

mod keymap;
mod terminal;

#[derive(Parser, Debug)]
#[command(name = "notch")]
#[command(author, about, long_about = None)]
#[command(version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("NOTCH_GIT_HASH"), ")"))]
struct Cli {
    /// Configuration file (default: <config dir>/notch/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Index file, overriding `general.store`
    #[arg(short, long)]
    store: Option<PathBuf>,

    /// Open the index read-only
    #[arg(long)]
    read_only: bool,

    /// Append log records to this file
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Log debug records
    #[arg(short, long)]
    verbose: bool,

    /// Initial search, overriding `general.initial_search`
    #[arg(num_args = 1..)]
    query: Vec<String>,
}

fn data_dir() -> Option<PathBuf> {
    dirs::data_dir().map(|d| d.join("notch"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let log_file = cli
        .log_file
        .clone()
        .or_else(|| data_dir().map(|d| d.join("debug.log")));
    if let Some(dir) = log_file.as_ref().and_then(|p| p.parent()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    logger::init(log_file, level);
    log::info!("notch {} starting", env!("CARGO_PKG_VERSION"));

    let config = Config::load_or_default(cli.config.as_deref())
        .context("Failed to load configuration")?;

    let store_path = cli
        .store
        .clone()
        .or_else(|| config.general.store.clone())
        .or_else(|| data_dir().map(|d| d.join("index.yml")))
        .context("Could not find data directory")?;
    let read_only = cli.read_only || config.general.read_only;
    let store = MemoryStore::open(&store_path)
        .with_context(|| format!("Failed to open index {}", store_path.display()))?
        .read_only(read_only);

    let initial_search = if cli.query.is_empty() {
        config.general.initial_search.clone()
    } else {
        cli.query.join(" ")
    };

    terminal::run(config, store, initial_search).await
}
