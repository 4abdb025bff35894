pub mod fetch;
pub mod reconcile;
pub mod redact;
pub mod report;
pub mod stage;

pub use fetch::{fetch_rows, FetchSummary};
pub use reconcile::{archive_batch, create_output_folder, reconcile_rows, ReconcileSummary, Unmatched};
pub use redact::{redact_pending, RedactionSummary};
pub use report::{collect_entries, write_report, ReportEntry};
pub use stage::{BatchStage, StageJournal, StageMarker};
