use std::path::PathBuf;

use clap::Parser;

use crate::cmd::Commands;

/// Parametric construction task catalogue.
/// Storage defaults to ~/.ptask/catalog.json or a path passed via --db.
#[derive(Parser)]
#[command(name = "ptask", version, about = "Parametric task catalogue CLI")]
pub struct Cli {
    /// Path to the JSON catalogue snapshot.
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}
