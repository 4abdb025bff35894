use std::path::{Component, Path, PathBuf};
use tracing::{debug, error, info, warn};

use crate::error::Error;
use crate::fs::FileSystem;
use crate::naming::unique_path;
use crate::spreadsheet::Row;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unmatched {
    EmptyShortcode,
    InvalidShortcode,
    Missing,
    MoveFailed(String),
}

impl Unmatched {
    pub fn reason(&self) -> String {
        match self {
            Unmatched::EmptyShortcode => "row has no shortcode".to_string(),
            Unmatched::InvalidShortcode => "shortcode is not a plain file name".to_string(),
            Unmatched::Missing => "no redacted document found".to_string(),
            Unmatched::MoveFailed(e) => format!("could not move document: {}", e),
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub moved: Vec<PathBuf>,
    /// `(row index, why)` for every row left without a document.
    pub unmatched: Vec<(usize, Unmatched)>,
}

/// Create a fresh per-batch folder under `processed`, named after the
/// batch and collision-resolved.
pub fn create_output_folder(fs: &dyn FileSystem, processed: &Path, batch_stem: &str) -> Result<PathBuf, Error> {
    let folder = unique_path(fs, processed, batch_stem)?;
    fs.create_dir(&folder)?;
    info!("Created output folder {}", folder.display());
    Ok(folder)
}

/// Expected redacted file name for a shortcode, if it is usable as one.
fn document_name(shortcode: &str) -> Result<String, Unmatched> {
    let shortcode = shortcode.trim();
    if shortcode.is_empty() {
        return Err(Unmatched::EmptyShortcode);
    }
    let name = format!("{}.pdf", shortcode);
    let mut components = Path::new(&name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(name),
        _ => Err(Unmatched::InvalidShortcode),
    }
}

/// Move `edited/{shortcode}.pdf` into `output` for every row. Rows whose
/// document is absent or cannot be moved are recorded and skipped.
pub fn reconcile_rows(fs: &dyn FileSystem, rows: &[Row], edited: &Path, output: &Path) -> ReconcileSummary {
    let mut summary = ReconcileSummary::default();

    for row in rows {
        let name = match document_name(&row.shortcode) {
            Ok(name) => name,
            Err(why) => {
                warn!("Row {}: {}", row.index, why.reason());
                summary.unmatched.push((row.index, why));
                continue;
            }
        };

        let source = edited.join(&name);
        if !fs.exists(&source) {
            warn!("Row {}: {} not found in {}", row.index, name, edited.display());
            summary.unmatched.push((row.index, Unmatched::Missing));
            continue;
        }

        let target = output.join(&name);
        match fs.move_file(&source, &target) {
            Ok(()) => {
                debug!("Moved {} -> {}", source.display(), target.display());
                summary.moved.push(target);
            }
            Err(e) => {
                error!("Row {}: error moving {}: {}", row.index, source.display(), e);
                summary.unmatched.push((row.index, Unmatched::MoveFailed(e.to_string())));
            }
        }
    }

    info!(
        "Reconciled {} of {} rows into {}",
        summary.moved.len(),
        rows.len(),
        output.display()
    );
    summary
}

/// Move the batch spreadsheet into `archive` under a collision-free name.
pub fn archive_batch(fs: &dyn FileSystem, source: &Path, archive: &Path) -> Result<PathBuf, Error> {
    let file_name = source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| Error::InvalidName(source.display().to_string()))?;
    let target = unique_path(fs, archive, &file_name).map_err(|e| match e {
        Error::Io(source_err) => Error::Archive {
            path: source.to_path_buf(),
            source: source_err,
        },
        other => other,
    })?;
    fs.move_file(source, &target).map_err(|e| Error::Archive {
        path: source.to_path_buf(),
        source: e,
    })?;
    info!("Archived {} as {}", source.display(), target.display());
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::memory::MemoryFs;

    fn rows(codes: &[&str]) -> Vec<Row> {
        codes
            .iter()
            .enumerate()
            .map(|(i, code)| Row::new(i, format!("https://x/{}", i), *code))
            .collect()
    }

    #[test]
    fn test_all_documents_reconciled() {
        let fs = MemoryFs::with_dirs(&["/edited", "/processed"]);
        fs.touch("/edited/AAA.pdf");
        fs.touch("/edited/BBB.pdf");

        let output = create_output_folder(&fs, Path::new("/processed"), "orders").unwrap();
        assert_eq!(output, PathBuf::from("/processed/orders"));

        let summary = reconcile_rows(&fs, &rows(&["AAA", "BBB"]), Path::new("/edited"), &output);
        assert_eq!(
            summary.moved,
            vec![PathBuf::from("/processed/orders/AAA.pdf"), PathBuf::from("/processed/orders/BBB.pdf")]
        );
        assert!(summary.unmatched.is_empty());
        assert!(!fs.has_file("/edited/AAA.pdf"));
    }

    #[test]
    fn test_missing_and_failed_rows_are_recorded_not_fatal() {
        let fs = MemoryFs::with_dirs(&["/edited", "/out"]);
        fs.touch("/edited/AAA.pdf");
        fs.touch("/edited/CCC.pdf");
        fs.touch("/edited/DDD.pdf");
        fs.fail_moves_from
            .borrow_mut()
            .insert(PathBuf::from("/edited/CCC.pdf"));

        let summary = reconcile_rows(
            &fs,
            &rows(&["AAA", "BBB", "CCC", "", "../x", "DDD"]),
            Path::new("/edited"),
            Path::new("/out"),
        );

        assert_eq!(
            summary.moved,
            vec![PathBuf::from("/out/AAA.pdf"), PathBuf::from("/out/DDD.pdf")]
        );
        assert_eq!(summary.unmatched.len(), 4);
        assert_eq!(summary.unmatched[0], (1, Unmatched::Missing));
        assert!(matches!(summary.unmatched[1], (2, Unmatched::MoveFailed(_))));
        assert_eq!(summary.unmatched[2], (3, Unmatched::EmptyShortcode));
        assert_eq!(summary.unmatched[3], (4, Unmatched::InvalidShortcode));
        assert!(fs.has_file("/edited/CCC.pdf"));
    }

    #[test]
    fn test_output_folder_name_is_collision_resolved() {
        let fs = MemoryFs::with_dirs(&["/processed", "/processed/orders"]);
        let output = create_output_folder(&fs, Path::new("/processed"), "orders").unwrap();
        assert_eq!(output, PathBuf::from("/processed/orders_1"));
        assert!(fs.is_dir(&output));
    }

    #[test]
    fn test_archive_moves_and_resolves_collisions() {
        let fs = MemoryFs::with_dirs(&["/in", "/archive"]);
        fs.touch("/in/orders.xlsx");
        fs.touch("/archive/orders.xlsx");

        let archived = archive_batch(&fs, Path::new("/in/orders.xlsx"), Path::new("/archive")).unwrap();
        assert_eq!(archived, PathBuf::from("/archive/orders_1.xlsx"));
        assert!(!fs.has_file("/in/orders.xlsx"));
        assert!(fs.has_file("/archive/orders.xlsx"));
    }

    #[test]
    fn test_archive_failure_escalates() {
        let fs = MemoryFs::with_dirs(&["/in"]);
        fs.touch("/in/orders.xlsx");
        let err = archive_batch(&fs, Path::new("/in/orders.xlsx"), Path::new("/archive")).unwrap_err();
        assert!(matches!(err, Error::Archive { .. }));
        assert!(fs.has_file("/in/orders.xlsx"));
    }
}
