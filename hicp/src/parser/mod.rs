//! Spreadsheet loading.
//!
//! Sources are read through the [`Workbook`] trait so the same declared
//! [`SheetLayout`] applies to Excel files and to directories of CSV sheets:
//!
//! ```text
//! ┌──────────────┐     ┌─────────────┐     ┌──────────────┐     ┌────────────────┐
//! │ .xlsx / dir  │────▶│  Workbook   │────▶│  SheetLayout │────▶│ RawObservation │
//! │              │     │ (SheetGrid) │     │  (validated) │     │   (per cell)   │
//! └──────────────┘     └─────────────┘     └──────────────┘     └────────────────┘
//! ```

pub mod delimited;
pub mod layout;
pub mod xlsx;

use std::path::Path;

use crate::error::{LoadError, LoadResult};
use crate::models::Cell;

pub use delimited::{decode_content, detect_delimiter, detect_encoding, CsvWorkbook};
pub use layout::{load_sheet, load_source, load_summary, LoadedSource, SheetEntry, SheetLayout};
pub use xlsx::XlsxWorkbook;

static EMPTY_CELL: Cell = Cell::Empty;

/// Cells of one sheet addressed by absolute (row, column).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SheetGrid {
    pub name: String,
    rows: Vec<Vec<Cell>>,
}

impl SheetGrid {
    pub fn new(name: impl Into<String>, rows: Vec<Vec<Cell>>) -> Self {
        Self { name: name.into(), rows }
    }

    /// Out-of-range positions read as [`Cell::Empty`].
    pub fn cell(&self, row: usize, col: usize) -> &Cell {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or(&EMPTY_CELL)
    }

    pub fn row(&self, row: usize) -> Option<&[Cell]> {
        self.rows.get(row).map(|r| r.as_slice())
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }
}

/// A named collection of sheets.
pub trait Workbook {
    /// File or directory name used in messages.
    fn source_name(&self) -> &str;

    fn sheet_names(&self) -> Vec<String>;

    /// Fails with [`LoadError::SheetNotFound`] when the sheet is absent.
    fn read_sheet(&mut self, name: &str) -> LoadResult<SheetGrid>;
}

/// Workbook held in memory, for callers that already have the cells.
#[derive(Debug, Clone, Default)]
pub struct MemoryWorkbook {
    name: String,
    sheets: Vec<SheetGrid>,
}

impl MemoryWorkbook {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), sheets: Vec::new() }
    }

    /// Add a sheet from text rows; empty strings become [`Cell::Empty`].
    pub fn with_sheet(mut self, name: &str, rows: &[&[&str]]) -> Self {
        let rows = rows
            .iter()
            .map(|r| r.iter().map(|s| text_cell(s)).collect())
            .collect();
        self.sheets.push(SheetGrid::new(name, rows));
        self
    }
}

impl Workbook for MemoryWorkbook {
    fn source_name(&self) -> &str {
        &self.name
    }

    fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|s| s.name.clone()).collect()
    }

    fn read_sheet(&mut self, name: &str) -> LoadResult<SheetGrid> {
        self.sheets
            .iter()
            .find(|s| s.name == name)
            .cloned()
            .ok_or_else(|| LoadError::SheetNotFound {
                workbook: self.name.clone(),
                sheet: name.to_string(),
            })
    }
}

pub(crate) fn text_cell(s: &str) -> Cell {
    if s.trim().is_empty() {
        Cell::Empty
    } else {
        Cell::Text(s.to_string())
    }
}

/// Open a source: a directory is read as CSV sheets, anything else through calamine.
pub fn open_workbook(path: &Path) -> LoadResult<Box<dyn Workbook>> {
    if !path.exists() {
        return Err(LoadError::FileNotFound(path.to_path_buf()));
    }
    if path.is_dir() {
        Ok(Box::new(CsvWorkbook::open(path)?))
    } else {
        Ok(Box::new(XlsxWorkbook::open(path)?))
    }
}
