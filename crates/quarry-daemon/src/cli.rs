use std::path::PathBuf;

use clap::Parser;

/// Periodic scraper daemon: fetch, validate, store.
#[derive(Debug, Parser)]
#[command(name = "quarry", version, about)]
pub struct Cli {
    /// Path to the YAML settings file.
    #[arg(long, short, default_value = "config/settings.yaml")]
    pub config: PathBuf,

    /// Run one cycle of every scraper and exit instead of scheduling.
    #[arg(long)]
    pub once: bool,
}
