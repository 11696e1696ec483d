use std::path::PathBuf;

use clap::Parser;

use crate::cmd::Commands;

/// Roadmap CLI over a file-backed board and settings store.
/// Storage defaults to ~/.workboard/ or paths passed via --board/--settings.
#[derive(Parser)]
#[command(name = "workboard", version, about = "Work item roadmap CLI")]
pub struct Cli {
    /// Path to the JSON board file.
    #[arg(long, global = true)]
    pub board: Option<PathBuf>,

    /// Path to the JSON settings file.
    #[arg(long, global = true)]
    pub settings: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}
