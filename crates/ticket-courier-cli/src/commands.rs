use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "ticket-courier")]
#[command(about = "Download, redact and file ticket PDFs listed in spreadsheets", long_about = None)]
pub struct Cli {
    /// Configuration file (defaults to ./Config.toml when present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Process every spreadsheet in the unprocessed folder
    Process,
    /// Redact the PDFs currently waiting in the download folder
    Redact,
    /// Trim a fixed height off the bottom of every page of one PDF
    Crop {
        #[arg(short, long)]
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        /// Points removed from the bottom edge
        #[arg(long, default_value_t = 50.0)]
        height: f32,
    },
    /// List pending batches and any interrupted ones
    Status,
    /// Print configuration values
    PrintConfig,
}
