use crate::browser::Browser;
use crate::config::{AppConfig, FolderRole};
use crate::error::Error;
use crate::fs::{FileSystem, LocalFs};
use crate::pdf::{DocumentEditor, LopdfEditor};
use crate::pipeline::{
    archive_batch, collect_entries, create_output_folder, fetch_rows, reconcile_rows, redact_pending,
    write_report, BatchStage, FetchSummary, ReconcileSummary, RedactionSummary, StageJournal,
    StageMarker, Unmatched,
};
use crate::progress::PipelineReporter;
use crate::spreadsheet::{Row, SpreadsheetReader, XlsxReader};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

pub const BATCH_EXTENSION: &str = "xlsx";

/// One spreadsheet waiting in the unprocessed folder.
#[derive(Debug, Clone)]
pub struct Batch {
    pub source: PathBuf,
    pub name: String,
    pub stem: String,
    /// Stage marker left by an earlier run that stopped mid-batch.
    pub interrupted: Option<StageMarker>,
}

#[derive(Debug)]
pub struct BatchSummary {
    pub batch: String,
    pub rows: usize,
    pub fetch: FetchSummary,
    pub redaction: RedactionSummary,
    pub reconcile: ReconcileSummary,
    pub output_folder: Option<PathBuf>,
    pub archived_as: PathBuf,
    pub report: Option<PathBuf>,
    pub duration: Duration,
}

#[derive(Debug)]
pub struct RunSummary {
    pub duration: Duration,
    pub batches: Vec<BatchSummary>,
}

pub struct BatchEngine {
    config: AppConfig,
    fs: Box<dyn FileSystem>,
    reader: Box<dyn SpreadsheetReader>,
    editor: Box<dyn DocumentEditor>,
}

impl BatchEngine {
    pub fn new(config: AppConfig) -> Self {
        let reader = XlsxReader::new(config.spreadsheet.clone());
        Self {
            config,
            fs: Box::new(LocalFs),
            reader: Box::new(reader),
            editor: Box::new(LopdfEditor),
        }
    }

    pub fn with_fs(mut self, fs: Box<dyn FileSystem>) -> Self {
        self.fs = fs;
        self
    }

    pub fn with_reader(mut self, reader: Box<dyn SpreadsheetReader>) -> Self {
        self.reader = reader;
        self
    }

    pub fn with_editor(mut self, editor: Box<dyn DocumentEditor>) -> Self {
        self.editor = editor;
        self
    }

    fn folder(&self, role: FolderRole) -> &Path {
        self.config.paths.resolve(role)
    }

    /// Spreadsheets in the unprocessed folder, in listing order.
    pub fn pending_batches(&self) -> Result<Vec<Batch>, Error> {
        let unprocessed = self.folder(FolderRole::Unprocessed);
        let files = self.fs.list_files(unprocessed, BATCH_EXTENSION)?;
        Ok(files
            .into_iter()
            .map(|source| {
                let name = file_name(&source);
                let stem = source
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| name.clone());
                let interrupted = StageJournal::interrupted(self.fs.as_ref(), &source);
                Batch {
                    source,
                    name,
                    stem,
                    interrupted,
                }
            })
            .collect())
    }

    /// Process every pending batch in order. The batch list is captured
    /// once up front. The first batch-level error stops the run.
    pub fn run(&self, browser: &mut dyn Browser, reporter: &dyn PipelineReporter) -> Result<RunSummary, Error> {
        let start = Instant::now();
        let batches = self.pending_batches()?;
        info!(
            "Found {} batches in {}",
            batches.len(),
            self.folder(FolderRole::Unprocessed).display()
        );
        reporter.on_run_start(batches.len());

        let mut summaries = Vec::with_capacity(batches.len());
        for batch in &batches {
            match self.process_batch(batch, browser, reporter) {
                Ok(summary) => {
                    reporter.on_batch_complete(&summary);
                    summaries.push(summary);
                }
                Err(e) => {
                    error!(
                        "Batch {} failed after {:.2}s of run time: {}",
                        batch.name,
                        start.elapsed().as_secs_f64(),
                        e
                    );
                    return Err(e);
                }
            }
        }

        let duration = start.elapsed();
        info!("# Total time taken in execution : {:.2}s", duration.as_secs_f64());
        Ok(RunSummary {
            duration,
            batches: summaries,
        })
    }

    /// Fetching -> Redacting -> Reconciling -> Archived for one batch.
    pub fn process_batch(
        &self,
        batch: &Batch,
        browser: &mut dyn Browser,
        reporter: &dyn PipelineReporter,
    ) -> Result<BatchSummary, Error> {
        let start = Instant::now();
        let fs = self.fs.as_ref();
        if let Some(marker) = &batch.interrupted {
            warn!(
                "Batch {} was interrupted while {} at {}; processing it again",
                batch.name, marker.stage, marker.updated_at
            );
        }
        let mut journal = StageJournal::open(fs, &batch.source);

        // Fetching
        self.enter(&mut journal, BatchStage::Fetching);
        let mut rows = self.reader.read_rows(&batch.source)?;
        info!("Processing {} ({} rows)", batch.name, rows.len());
        reporter.on_batch_start(&batch.name, rows.len());
        let browser_config = &self.config.browser;
        let fetch = fetch_rows(
            browser,
            &mut rows,
            &browser_config.download_button_xpath,
            Duration::from_millis(browser_config.row_delay_ms),
            reporter,
        );

        // Redacting
        self.enter(&mut journal, BatchStage::Redacting);
        let redaction = match redact_pending(
            fs,
            self.editor.as_ref(),
            self.folder(FolderRole::Download),
            self.folder(FolderRole::Edited),
            &self.config.redaction,
        ) {
            Ok(summary) => summary,
            Err(e) => {
                error!("Error while processing pdfs: {}", e);
                RedactionSummary::default()
            }
        };
        reporter.on_redaction_complete(redaction.redacted.len(), redaction.failed.len());

        // Reconciling
        self.enter(&mut journal, BatchStage::Reconciling);
        let (output_folder, reconcile) = self.reconcile(batch, &rows);
        let entries = collect_entries(&rows, &reconcile);
        let report = match write_report(fs, self.folder(FolderRole::Error), &batch.stem, &entries) {
            Ok(path) => path,
            Err(e) => {
                error!("Could not write report for {}: {}", batch.name, e);
                None
            }
        };

        let archived_as = archive_batch(fs, &batch.source, self.folder(FolderRole::Archive))?;
        self.enter(&mut journal, BatchStage::Archived);

        let duration = start.elapsed();
        info!(
            "Batch {} done in {:.2}s: {} of {} documents delivered",
            batch.name,
            duration.as_secs_f64(),
            reconcile.moved.len(),
            rows.len()
        );

        Ok(BatchSummary {
            batch: batch.name.clone(),
            rows: rows.len(),
            fetch,
            redaction,
            reconcile,
            output_folder,
            archived_as,
            report,
            duration,
        })
    }

    /// Run only the redaction stage over the download folder.
    pub fn redact_only(&self) -> Result<RedactionSummary, Error> {
        redact_pending(
            self.fs.as_ref(),
            self.editor.as_ref(),
            self.folder(FolderRole::Download),
            self.folder(FolderRole::Edited),
            &self.config.redaction,
        )
    }

    fn reconcile(&self, batch: &Batch, fetched_rows: &[Row]) -> (Option<PathBuf>, ReconcileSummary) {
        let fs = self.fs.as_ref();
        let output = match create_output_folder(fs, self.folder(FolderRole::Processed), &batch.stem) {
            Ok(folder) => folder,
            Err(e) => {
                error!("Could not create output folder for {}: {}", batch.name, e);
                let reason = format!("output folder unavailable: {}", e);
                let unmatched = fetched_rows
                    .iter()
                    .map(|row| (row.index, Unmatched::MoveFailed(reason.clone())))
                    .collect();
                return (
                    None,
                    ReconcileSummary {
                        moved: Vec::new(),
                        unmatched,
                    },
                );
            }
        };

        let rows = match self.reader.read_rows(&batch.source) {
            Ok(rows) => rows,
            Err(e) => {
                warn!(
                    "Could not re-read {} for reconciliation ({}); using rows read earlier",
                    batch.name, e
                );
                fetched_rows.to_vec()
            }
        };

        let summary = reconcile_rows(fs, &rows, self.folder(FolderRole::Edited), &output);
        (Some(output), summary)
    }

    fn enter(&self, journal: &mut StageJournal<'_>, stage: BatchStage) {
        match journal.enter(stage) {
            Ok(()) => debug!("Entered stage {}", stage),
            Err(e) => warn!("Could not record stage {}: {}", stage, e),
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BrowserConfig, LoggingConfig, PathsConfig, RedactionConfig, SpreadsheetConfig};
    use crate::fs::memory::MemoryFs;
    use crate::progress::SilentReporter;

    fn config() -> AppConfig {
        AppConfig {
            paths: PathsConfig {
                unprocessed: "/in".into(),
                download: "/dl".into(),
                edited: "/ed".into(),
                processed: "/out".into(),
                error: "/err".into(),
                archive: "/arc".into(),
            },
            browser: BrowserConfig {
                row_delay_ms: 0,
                ..BrowserConfig::default()
            },
            spreadsheet: SpreadsheetConfig::default(),
            redaction: RedactionConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    struct FixedReader(Vec<Row>);

    impl SpreadsheetReader for FixedReader {
        fn read_rows(&self, _path: &Path) -> Result<Vec<Row>, Error> {
            Ok(self.0.clone())
        }
    }

    /// Every click "downloads" `<last URL segment>.pdf` into `/dl`.
    struct DroppingBrowser {
        fs: MemoryFs,
        current: String,
    }

    impl Browser for DroppingBrowser {
        fn load(&mut self, url: &str) -> bool {
            self.current = url.rsplit('/').next().unwrap_or_default().to_string();
            true
        }

        fn scroll_to_end(&mut self) -> bool {
            true
        }

        fn click_by_locator(&mut self, _xpath: &str) -> bool {
            self.fs.write(
                Path::new(&format!("/dl/{}.pdf", self.current)),
                b"%PDF ticket",
            )
            .is_ok()
        }
    }

    /// Copies the document unchanged, prefixing it with a marker.
    struct StampingEditor(MemoryFs);

    impl DocumentEditor for StampingEditor {
        fn cover_region(
            &self,
            input: &Path,
            output: &Path,
            _redaction: &RedactionConfig,
        ) -> Result<usize, Error> {
            let text = self.0.read_to_string(input)?;
            self.0.write(output, format!("redacted:{}", text).as_bytes())?;
            Ok(1)
        }

        fn crop_bottom(&self, _input: &Path, _output: &Path, _height: f32) -> Result<usize, Error> {
            Ok(0)
        }
    }

    fn engine_with(fs: &MemoryFs, rows: Vec<Row>) -> BatchEngine {
        BatchEngine::new(config())
            .with_fs(Box::new(fs.clone()))
            .with_reader(Box::new(FixedReader(rows)))
            .with_editor(Box::new(StampingEditor(fs.clone())))
    }

    fn memory_fs() -> MemoryFs {
        MemoryFs::with_dirs(&["/in", "/dl", "/ed", "/out", "/err", "/arc"])
    }

    #[test]
    fn test_pending_batches_lists_only_spreadsheets() {
        let fs = memory_fs();
        fs.touch("/in/b.xlsx");
        fs.touch("/in/a.XLSX");
        fs.touch("/in/notes.txt");
        fs.write(Path::new("/in/.b.xlsx.stage.json"), br#"{"stage":"redacting","updated_at":"2026-01-01T00:00:00Z"}"#)
            .unwrap();

        let engine = BatchEngine::new(config()).with_fs(Box::new(fs));
        let batches = engine.pending_batches().unwrap();
        let names: Vec<&str> = batches.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["a.XLSX", "b.xlsx"]);
        assert_eq!(batches[0].stem, "a");
        assert!(batches[0].interrupted.is_none());
        assert_eq!(batches[1].interrupted.as_ref().unwrap().stage, BatchStage::Redacting);
    }

    #[test]
    fn test_batch_reaches_archived_with_output_folder() {
        let fs = memory_fs();
        fs.touch("/in/orders.xlsx");
        let rows = vec![Row::new(0, "https://x/AAA", "AAA"), Row::new(1, "https://x/BBB", "BBB")];
        let mut browser = DroppingBrowser {
            fs: fs.clone(),
            current: String::new(),
        };

        let engine = engine_with(&fs, rows);
        let summary = engine.run(&mut browser, &SilentReporter).unwrap();

        assert_eq!(summary.batches.len(), 1);
        let batch = &summary.batches[0];
        assert_eq!(batch.fetch.fetched, 2);
        assert_eq!(batch.output_folder, Some(PathBuf::from("/out/orders")));
        assert_eq!(batch.archived_as, PathBuf::from("/arc/orders.xlsx"));
        assert!(batch.report.is_none());
        assert_eq!(batch.redaction.redacted.len(), 2);
        assert_eq!(
            fs.read_to_string(Path::new("/out/orders/AAA.pdf")).unwrap(),
            "redacted:%PDF ticket"
        );
        assert!(fs.has_file("/out/orders/BBB.pdf"));
        assert!(!fs.has_file("/dl/AAA.pdf"));
        assert!(!fs.has_file("/in/orders.xlsx"));
        assert!(!fs.has_file("/in/.orders.xlsx.stage.json"));
    }

    #[test]
    fn test_unwritable_output_folder_still_archives_and_reports() {
        let fs = MemoryFs::with_dirs(&["/in", "/dl", "/ed", "/err", "/arc"]);
        fs.touch("/in/orders.xlsx");
        let rows = vec![Row::new(0, "https://x/AAA", "AAA")];
        let mut browser = DroppingBrowser {
            fs: fs.clone(),
            current: String::new(),
        };

        let engine = engine_with(&fs, rows);
        let summary = engine.run(&mut browser, &SilentReporter).unwrap();

        let batch = &summary.batches[0];
        assert!(batch.output_folder.is_none());
        assert_eq!(batch.report, Some(PathBuf::from("/err/orders.csv")));
        assert!(fs.has_file("/arc/orders.xlsx"));
        assert!(fs.has_file("/ed/AAA.pdf"));
    }
}
