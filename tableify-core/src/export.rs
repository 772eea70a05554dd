//! Export — delimited clipboard text and spreadsheet files (xlsx or CSV).
//!
//! Both encoders read the already-assembled table; nothing here fetches or
//! reformats values, so the output matches what the shell displays.

use std::io::Write;
use std::path::{Path, PathBuf};

use rust_xlsxwriter::{Workbook, XlsxError};
use thiserror::Error;
use tracing::info;

use crate::table::{Grid, ResultTable};

/// Default spreadsheet destination, overwritten on each export.
pub const DEFAULT_SPREADSHEET_PATH: &str = "stock_data.xlsx";

const SHEET_NAME: &str = "Sheet1";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("could not write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not encode CSV: {0}")]
    Encode(#[from] csv::Error),

    #[error("could not encode workbook: {0}")]
    Workbook(#[from] XlsxError),

    #[error("could not write to text sink: {0}")]
    Sink(#[source] std::io::Error),
}

/// On-disk spreadsheet encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpreadsheetFormat {
    Xlsx,
    Csv,
}

impl SpreadsheetFormat {
    /// `.csv` destinations get CSV; everything else gets a workbook.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("csv") => Self::Csv,
            _ => Self::Xlsx,
        }
    }
}

// ─── Delimited text ─────────────────────────────────────────────────

/// Header line then one line per row, cells tab-joined, lines newline-joined.
pub fn to_delimited_text(table: &ResultTable) -> String {
    grid_to_delimited_text(&table.to_grid())
}

pub fn grid_to_delimited_text(grid: &Grid) -> String {
    std::iter::once(&grid.headers)
        .chain(grid.rows.iter())
        .map(|line| line.join("\t"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Write the delimited text to a clipboard-like sink.
pub fn write_delimited_text<W: Write>(table: &ResultTable, mut sink: W) -> Result<(), ExportError> {
    sink.write_all(to_delimited_text(table).as_bytes())
        .and_then(|_| sink.flush())
        .map_err(ExportError::Sink)
}

// ─── Spreadsheet ────────────────────────────────────────────────────

/// Encode the table in `format`: header row of display names, one row per ticker.
pub fn to_spreadsheet_bytes(
    table: &ResultTable,
    format: SpreadsheetFormat,
) -> Result<Vec<u8>, ExportError> {
    let grid = table.to_grid();
    match format {
        SpreadsheetFormat::Xlsx => grid_to_xlsx_bytes(&grid),
        SpreadsheetFormat::Csv => grid_to_csv_bytes(&grid),
    }
}

pub fn grid_to_csv_bytes(grid: &Grid) -> Result<Vec<u8>, ExportError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(&grid.headers)?;
    for row in &grid.rows {
        wtr.write_record(row)?;
    }
    wtr.into_inner()
        .map_err(|e| ExportError::Sink(e.into_error()))
}

/// Single-sheet workbook; every cell is written as the displayed string.
pub fn grid_to_xlsx_bytes(grid: &Grid) -> Result<Vec<u8>, ExportError> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name(SHEET_NAME)?;

    for (row, line) in std::iter::once(&grid.headers).chain(grid.rows.iter()).enumerate() {
        for (col, cell) in line.iter().enumerate() {
            sheet.write_string(row as u32, col as u16, cell.as_str())?;
        }
    }

    Ok(workbook.save_to_buffer()?)
}

/// Encode and write the table to `path`, replacing any existing file.
///
/// The encoding follows the extension, see [`SpreadsheetFormat::from_path`].
pub fn write_spreadsheet(table: &ResultTable, path: &Path) -> Result<(), ExportError> {
    let format = SpreadsheetFormat::from_path(path);
    let bytes = to_spreadsheet_bytes(table, format)?;
    std::fs::write(path, &bytes).map_err(|source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    info!(path = %path.display(), rows = table.rows().len(), ?format, "exported spreadsheet");
    Ok(())
}
