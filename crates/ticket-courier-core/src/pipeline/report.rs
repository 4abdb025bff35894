use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::Error;
use crate::fs::FileSystem;
use crate::naming::unique_path;
use crate::spreadsheet::{Row, RowOutcome};

use super::reconcile::ReconcileSummary;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportEntry {
    pub row: usize,
    pub shortcode: String,
    pub link: String,
    pub stage: &'static str,
    pub reason: String,
}

/// Rows of a batch that did not end up in its output folder: failed
/// fetches first, then rows that could not be reconciled.
pub fn collect_entries(rows: &[Row], reconcile: &ReconcileSummary) -> Vec<ReportEntry> {
    let mut entries: Vec<ReportEntry> = rows
        .iter()
        .filter_map(|row| match &row.outcome {
            RowOutcome::Failed(failure) => Some(ReportEntry {
                row: row.index,
                shortcode: row.shortcode.clone(),
                link: row.link.clone(),
                stage: "fetch",
                reason: failure.to_string(),
            }),
            _ => None,
        })
        .collect();

    for (index, why) in &reconcile.unmatched {
        // a failed fetch already explains a missing document
        if entries.iter().any(|e| e.row == *index) {
            continue;
        }
        let row = rows.iter().find(|r| r.index == *index);
        entries.push(ReportEntry {
            row: *index,
            shortcode: row.map(|r| r.shortcode.clone()).unwrap_or_default(),
            link: row.map(|r| r.link.clone()).unwrap_or_default(),
            stage: "reconcile",
            reason: why.reason(),
        });
    }
    entries
}

/// Write `entries` as `<batch_stem>.csv` into the error folder. Returns
/// `None` without touching the folder when there is nothing to report.
pub fn write_report(
    fs: &dyn FileSystem,
    error_dir: &Path,
    batch_stem: &str,
    entries: &[ReportEntry],
) -> Result<Option<PathBuf>, Error> {
    if entries.is_empty() {
        return Ok(None);
    }

    let mut writer = csv::Writer::from_writer(Vec::new());
    for entry in entries {
        writer.serialize(entry)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| Error::Other(format!("could not finish report: {}", e)))?;

    let path = unique_path(fs, error_dir, &format!("{}.csv", batch_stem))?;
    fs.write(&path, &bytes)?;
    info!("Wrote {} unmatched rows to {}", entries.len(), path.display());
    Ok(Some(path))
}
