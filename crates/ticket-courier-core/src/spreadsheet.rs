use calamine::{open_workbook, Data, Reader, Xlsx};
use std::fmt;
use std::path::Path;
use tracing::debug;

use crate::config::SpreadsheetConfig;
use crate::error::Error;

/// One spreadsheet record describing a single ticket to retrieve.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    /// Zero-based position below the header row, blank rows included.
    pub index: usize,
    pub link: String,
    pub shortcode: String,
    pub outcome: RowOutcome,
}

impl Row {
    pub fn new(index: usize, link: impl Into<String>, shortcode: impl Into<String>) -> Self {
        Self {
            index,
            link: link.into(),
            shortcode: shortcode.into(),
            outcome: RowOutcome::Pending,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RowOutcome {
    Pending,
    Fetched,
    Failed(FetchFailure),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchFailure {
    MissingLink,
    Navigation,
    Scroll,
    Click,
}

impl fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            FetchFailure::MissingLink => "row has no link",
            FetchFailure::Navigation => "failed to load URL",
            FetchFailure::Scroll => "failed to scroll to end of page",
            FetchFailure::Click => "failed to click download button",
        };
        f.write_str(text)
    }
}

pub trait SpreadsheetReader {
    fn read_rows(&self, path: &Path) -> Result<Vec<Row>, Error>;
}

/// Reads the link and shortcode columns from the first worksheet of an
/// `.xlsx` workbook.
#[derive(Debug, Clone)]
pub struct XlsxReader {
    columns: SpreadsheetConfig,
}

impl XlsxReader {
    pub fn new(columns: SpreadsheetConfig) -> Self {
        Self { columns }
    }
}

impl SpreadsheetReader for XlsxReader {
    fn read_rows(&self, path: &Path) -> Result<Vec<Row>, Error> {
        let spreadsheet_error = |message: String| Error::Spreadsheet {
            path: path.to_path_buf(),
            message,
        };

        let mut workbook: Xlsx<_> =
            open_workbook(path).map_err(|e: calamine::XlsxError| spreadsheet_error(e.to_string()))?;
        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| spreadsheet_error("workbook has no worksheets".to_string()))?
            .map_err(|e| spreadsheet_error(e.to_string()))?;

        let rows = rows_from_cells(range.rows(), &self.columns).map_err(spreadsheet_error)?;
        debug!("Read {} rows from {}", rows.len(), path.display());
        Ok(rows)
    }
}

fn rows_from_cells<'a, I>(cells: I, columns: &SpreadsheetConfig) -> Result<Vec<Row>, String>
where
    I: IntoIterator<Item = &'a [Data]>,
{
    // positions are taken before blank rows are dropped so indices keep
    // pointing at the sheet's own lines
    let mut cells = cells
        .into_iter()
        .enumerate()
        .filter(|(_, row)| row.iter().any(|cell| !cell_text(cell).is_empty()));

    let (header_at, header) = match cells.next() {
        Some(header) => header,
        None => return Ok(Vec::new()),
    };
    let link_col = find_column(header, &columns.link_column)?;
    let shortcode_col = find_column(header, &columns.shortcode_column)?;

    Ok(cells
        .map(|(at, row)| {
            let get = |col: usize| row.get(col).map(cell_text).unwrap_or_default();
            Row::new(at - header_at - 1, get(link_col), get(shortcode_col))
        })
        .collect())
}

fn find_column(header: &[Data], name: &str) -> Result<usize, String> {
    header
        .iter()
        .position(|cell| cell_text(cell).eq_ignore_ascii_case(name.trim()))
        .ok_or_else(|| format!("missing required column '{}'", name))
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        Data::Int(i) => i.to_string(),
        other => other.to_string().trim().to_string(),
    }
}
