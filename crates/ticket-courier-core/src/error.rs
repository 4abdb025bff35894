use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Spreadsheet error in {path}: {message}")]
    Spreadsheet { path: PathBuf, message: String },

    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Report error: {0}")]
    Report(#[from] csv::Error),

    #[error("Stage journal error: {0}")]
    Journal(#[from] serde_json::Error),

    #[error("Error archiving {}: {source}", path.display())]
    Archive {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid name: {0}")]
    InvalidName(String),

    #[error("{0}")]
    Other(String),
}
