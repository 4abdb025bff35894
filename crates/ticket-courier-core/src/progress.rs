use crate::engine::BatchSummary;

/// Trait for reporting pipeline progress.
///
/// The CLI implements it with indicatif bars. All methods have default
/// no-op implementations.
pub trait PipelineReporter {
    fn on_run_start(&self, _batches: usize) {}
    fn on_batch_start(&self, _batch: &str, _rows: usize) {}
    fn on_row_complete(&self, _rows_done: usize, _total_rows: usize, _fetched: bool) {}
    fn on_redaction_complete(&self, _redacted: usize, _failed: usize) {}
    fn on_batch_complete(&self, _summary: &BatchSummary) {}
}

/// No-op progress reporter for silent operation.
pub struct SilentReporter;

impl PipelineReporter for SilentReporter {}
