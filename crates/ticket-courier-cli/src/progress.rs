use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Mutex;
use std::time::Duration;
use ticket_courier_core::{BatchSummary, PipelineReporter};

/// CLI progress reporter using indicatif progress bars.
///
/// - Fetch phase: one bar per batch, one tick per spreadsheet row
/// - Redaction and reconciliation: summary lines on stderr
pub struct CliReporter {
    bar: Mutex<Option<ProgressBar>>,
}

impl CliReporter {
    pub fn new() -> Self {
        Self {
            bar: Mutex::new(None),
        }
    }

    fn with_bar(&self, f: impl FnOnce(&ProgressBar)) {
        if let Ok(guard) = self.bar.lock() {
            if let Some(pb) = guard.as_ref() {
                f(pb);
            }
        }
    }

    fn set_bar(&self, pb: ProgressBar) {
        if let Ok(mut guard) = self.bar.lock() {
            if let Some(old) = guard.take() {
                old.finish_and_clear();
            }
            *guard = Some(pb);
        }
    }

    fn finish_bar(&self) {
        if let Ok(mut guard) = self.bar.lock() {
            if let Some(pb) = guard.take() {
                pb.finish_and_clear();
            }
        }
    }
}

impl PipelineReporter for CliReporter {
    fn on_run_start(&self, batches: usize) {
        eprintln!("  {} batch(es) waiting", batches.to_string().cyan());
    }

    fn on_batch_start(&self, batch: &str, rows: usize) {
        let pb = ProgressBar::new(rows as u64);
        let style = ProgressStyle::with_template(
            "  {spinner:.cyan} {msg} [{bar:30.cyan/dim}] {pos}/{len} rows ({eta} remaining)",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("━╸─")
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");
        pb.set_style(style);
        pb.set_message(batch.to_string());
        pb.enable_steady_tick(Duration::from_millis(80));
        self.set_bar(pb);
    }

    fn on_row_complete(&self, rows_done: usize, _total_rows: usize, _fetched: bool) {
        self.with_bar(|pb| pb.set_position(rows_done as u64));
    }

    fn on_redaction_complete(&self, redacted: usize, failed: usize) {
        self.finish_bar();
        if failed == 0 {
            eprintln!("  {} Redacted {} documents", "✓".green(), redacted);
        } else {
            eprintln!(
                "  {} Redacted {} documents, {} could not be edited",
                "!".yellow(),
                redacted,
                failed
            );
        }
    }

    fn on_batch_complete(&self, summary: &BatchSummary) {
        self.finish_bar();
        let missing = summary.rows.saturating_sub(summary.reconcile.moved.len());
        let mark = if missing == 0 { "✓".green() } else { "!".yellow() };
        eprintln!(
            "  {} {}: {}/{} delivered in {:.2}s",
            mark,
            summary.batch,
            summary.reconcile.moved.len(),
            summary.rows,
            summary.duration.as_secs_f64()
        );
    }
}
