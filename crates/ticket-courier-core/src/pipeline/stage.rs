use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::Error;
use crate::fs::FileSystem;

/// Per-batch state machine. Stages only move forward and `Archived` is
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStage {
    Pending,
    Fetching,
    Redacting,
    Reconciling,
    Archived,
}

impl BatchStage {
    pub fn advance(self, next: BatchStage) -> Result<BatchStage, Error> {
        if next <= self {
            return Err(Error::Other(format!(
                "invalid batch transition {} -> {}",
                self, next
            )));
        }
        Ok(next)
    }
}

impl fmt::Display for BatchStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BatchStage::Pending => "pending",
            BatchStage::Fetching => "fetching",
            BatchStage::Redacting => "redacting",
            BatchStage::Reconciling => "reconciling",
            BatchStage::Archived => "archived",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageMarker {
    pub stage: BatchStage,
    pub updated_at: DateTime<Utc>,
}

/// Durable record of a batch's current stage: a hidden JSON file next to
/// the batch spreadsheet, removed once the batch is archived. A marker
/// that survives a run means that run stopped mid-batch.
pub struct StageJournal<'a> {
    fs: &'a dyn FileSystem,
    marker_path: PathBuf,
    stage: BatchStage,
}

impl<'a> StageJournal<'a> {
    pub fn marker_path(batch: &Path) -> PathBuf {
        let name = batch
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        batch.with_file_name(format!(".{}.stage.json", name))
    }

    /// Marker left behind by an earlier, interrupted run, if any.
    pub fn interrupted(fs: &dyn FileSystem, batch: &Path) -> Option<StageMarker> {
        let path = Self::marker_path(batch);
        if !fs.exists(&path) {
            return None;
        }
        match fs
            .read_to_string(&path)
            .map_err(Error::from)
            .and_then(|text| serde_json::from_str::<StageMarker>(&text).map_err(Error::from))
        {
            Ok(marker) => Some(marker),
            Err(e) => {
                warn!("Unreadable stage marker {}: {}", path.display(), e);
                None
            }
        }
    }

    pub fn open(fs: &'a dyn FileSystem, batch: &Path) -> Self {
        Self {
            fs,
            marker_path: Self::marker_path(batch),
            stage: BatchStage::Pending,
        }
    }

    pub fn stage(&self) -> BatchStage {
        self.stage
    }

    pub fn enter(&mut self, next: BatchStage) -> Result<(), Error> {
        self.stage = self.stage.advance(next)?;
        if next == BatchStage::Archived {
            if self.fs.exists(&self.marker_path) {
                self.fs.remove_file(&self.marker_path)?;
            }
            debug!("Batch archived, marker {} removed", self.marker_path.display());
            return Ok(());
        }

        let marker = StageMarker {
            stage: next,
            updated_at: Utc::now(),
        };
        let json = serde_json::to_vec_pretty(&marker)?;
        self.fs.write(&self.marker_path, &json)?;
        debug!("Batch stage -> {} ({})", next, self.marker_path.display());
        Ok(())
    }
}
