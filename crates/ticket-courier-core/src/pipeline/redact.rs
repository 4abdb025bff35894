use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use crate::config::RedactionConfig;
use crate::error::Error;
use crate::fs::{FileSystem, PendingDocuments};
use crate::pdf::DocumentEditor;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RedactionSummary {
    pub redacted: Vec<PathBuf>,
    pub failed: Vec<PathBuf>,
}

/// Redact every PDF currently waiting in `download` into `edited` under
/// the same name, then delete the original.
///
/// A document that cannot be redacted is logged and left in place; the
/// rest are still processed, and whatever `edited` already held under that
/// name is left alone. Failing to delete an original is only logged.
pub fn redact_pending(
    fs: &dyn FileSystem,
    editor: &dyn DocumentEditor,
    download: &Path,
    edited: &Path,
    redaction: &RedactionConfig,
) -> Result<RedactionSummary, Error> {
    let pending = PendingDocuments::scan(fs, download)?;
    let mut summary = RedactionSummary::default();

    for input in pending {
        let file_name = match input.file_name() {
            Some(name) => name.to_string_lossy().into_owned(),
            None => continue,
        };
        let output = edited.join(&file_name);
        // written under a scratch name so a failed attempt never touches
        // a document already sitting in `edited`
        let staging = edited.join(format!(".{}.partial", file_name));
        info!("Processing {}", input.display());

        let result = editor
            .cover_region(&input, &staging, redaction)
            .and_then(|pages| {
                fs.move_file(&staging, &output)?;
                Ok(pages)
            });
        match result {
            Ok(pages) => {
                if let Err(e) = fs.remove_file(&input) {
                    warn!("Could not remove original {}: {}", input.display(), e);
                }
                info!("Processed {} ({} pages)", output.display(), pages);
                summary.redacted.push(output);
            }
            Err(e) => {
                error!("Error while processing {}: {}", input.display(), e);
                if fs.exists(&staging) {
                    let _ = fs.remove_file(&staging);
                }
                summary.failed.push(input);
            }
        }
    }

    info!(
        "Redaction stage: {} redacted, {} failed",
        summary.redacted.len(),
        summary.failed.len()
    );
    Ok(summary)
}
