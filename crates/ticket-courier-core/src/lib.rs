pub mod browser;
pub mod config;
pub mod engine;
pub mod error;
pub mod fs;
pub mod naming;
pub mod pdf;
pub mod pipeline;
pub mod progress;
pub mod spreadsheet;

pub use config::{AppConfig, FolderRole};
pub use engine::{Batch, BatchEngine, BatchSummary, RunSummary};
pub use error::Error;
pub use progress::{PipelineReporter, SilentReporter};
