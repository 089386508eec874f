//! Excel/ODS workbooks through calamine.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use calamine::{open_workbook_auto, Data, Range, Reader, Sheets};

use super::{SheetGrid, Workbook};
use crate::error::{LoadError, LoadResult};
use crate::models::Cell;

/// A spreadsheet file (xls, xlsx, xlsb or ods).
pub struct XlsxWorkbook {
    name: String,
    inner: Sheets<BufReader<File>>,
}

impl XlsxWorkbook {
    pub fn open(path: &Path) -> LoadResult<Self> {
        if !path.is_file() {
            return Err(LoadError::FileNotFound(path.to_path_buf()));
        }
        let inner = open_workbook_auto(path).map_err(|e| LoadError::Workbook {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self { name, inner })
    }
}

impl Workbook for XlsxWorkbook {
    fn source_name(&self) -> &str {
        &self.name
    }

    fn sheet_names(&self) -> Vec<String> {
        self.inner.sheet_names()
    }

    fn read_sheet(&mut self, name: &str) -> LoadResult<SheetGrid> {
        if !self.inner.sheet_names().iter().any(|s| s == name) {
            return Err(LoadError::SheetNotFound {
                workbook: self.name.clone(),
                sheet: name.to_string(),
            });
        }
        let range = self
            .inner
            .worksheet_range(name)
            .map_err(|e| LoadError::Workbook {
                path: self.name.clone(),
                message: format!("sheet '{}': {}", name, e),
            })?;
        Ok(grid_from_range(name, &range))
    }
}

/// Re-anchor a used range at A1 so layout row indices stay absolute.
fn grid_from_range(name: &str, range: &Range<Data>) -> SheetGrid {
    let (first_row, first_col) = range.start().unwrap_or((0, 0));

    let mut rows: Vec<Vec<Cell>> = vec![Vec::new(); first_row as usize];
    for row in range.rows() {
        let mut cells = vec![Cell::Empty; first_col as usize];
        cells.extend(row.iter().map(cell_from_data));
        rows.push(cells);
    }
    SheetGrid::new(name, rows)
}

fn cell_from_data(data: &Data) -> Cell {
    match data {
        Data::Empty => Cell::Empty,
        Data::String(s) => super::text_cell(s),
        Data::Float(f) => Cell::Number(*f),
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Bool(b) => Cell::Text(b.to_string()),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map(|d| Cell::Date(d.date()))
            .unwrap_or(Cell::Number(dt.as_f64())),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::Text(s.clone()),
        Data::Error(e) => Cell::Text(format!("{:?}", e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_offset_is_preserved() {
        let mut range: Range<Data> = Range::new((2, 1), (3, 2));
        range.set_value((2, 1), Data::String("TIME".into()));
        range.set_value((2, 2), Data::String("2021-01".into()));
        range.set_value((3, 1), Data::String("France".into()));
        range.set_value((3, 2), Data::Float(110.5));

        let grid = grid_from_range("Sheet 1", &range);
        assert_eq!(grid.height(), 4);
        assert_eq!(grid.cell(0, 0), &Cell::Empty);
        assert_eq!(grid.cell(2, 1), &Cell::Text("TIME".into()));
        assert_eq!(grid.cell(3, 2), &Cell::Number(110.5));
    }

    #[test]
    fn test_cell_conversion() {
        assert_eq!(cell_from_data(&Data::Int(7)), Cell::Number(7.0));
        assert_eq!(cell_from_data(&Data::String("  ".into())), Cell::Empty);
        assert_eq!(cell_from_data(&Data::String(":".into())), Cell::Text(":".into()));
    }

    #[test]
    fn test_open_missing_file() {
        let err = XlsxWorkbook::open(Path::new("/nonexistent/book.xlsx")).err().unwrap();
        assert!(matches!(err, LoadError::FileNotFound(_)));
    }
}
