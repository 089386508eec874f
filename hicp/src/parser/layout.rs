//! Declared sheet layouts and the loader built on them.
//!
//! Eurostat HICP workbooks share one shape: a `Summary` sheet listing the
//! data sheets, then one data sheet per category whose header row holds
//! `TIME` followed by period columns. Each period column is followed by a
//! flag column (`p`, `e`, `d`, ...) that the loader skips.
//!
//! ```text
//!        col 0     col 1     col 2   col 3     col 4
//! row 8  TIME      2021-01   (flag)  2021-02   (flag)
//! row 9  France    108.2             108.9     p
//! ```
//!
//! Layout mismatches are reported as [`LoadError::LayoutMismatch`] instead
//! of silently reading the wrong cells.

use serde::{Deserialize, Serialize};
use std::path::Path;

use super::{open_workbook, Workbook};
use crate::error::{LoadError, LoadResult};
use crate::logs::{log_info, log_info_indent, log_success};
use crate::models::{DatasetKind, RawObservation};

/// Fixed contract describing where data lives in a source workbook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetLayout {
    /// Sheet listing the data sheets.
    #[serde(default = "default_summary_sheet")]
    pub summary_sheet: String,
    /// Summary column holding data sheet names.
    pub sheet_name_column: usize,
    /// Summary column holding the index base (`2015=100`), if any.
    #[serde(default)]
    pub base_column: Option<usize>,
    /// Summary column holding the category description.
    pub description_column: usize,
    /// Summary rows whose sheet-name cell equals one of these are skipped.
    #[serde(default = "default_skip_labels")]
    pub skip_labels: Vec<String>,
    /// Zero-based row of the `TIME` header in data sheets.
    pub header_row: usize,
    /// Expected text of the first header cell.
    #[serde(default = "default_label_header")]
    pub label_header: String,
}

fn default_summary_sheet() -> String {
    "Summary".to_string()
}

fn default_skip_labels() -> Vec<String> {
    vec!["Contents".to_string()]
}

fn default_label_header() -> String {
    "TIME".to_string()
}

impl SheetLayout {
    /// `hicp_main_categories_eu.xlsx`
    pub fn main_categories() -> Self {
        Self {
            summary_sheet: default_summary_sheet(),
            sheet_name_column: 1,
            base_column: Some(3),
            description_column: 4,
            skip_labels: default_skip_labels(),
            header_row: 8,
            label_header: default_label_header(),
        }
    }

    /// `hicp_subcategories_eu.xlsx`
    pub fn sub_categories() -> Self {
        Self::main_categories()
    }

    /// `coicop_weights_eu.xlsx`
    pub fn weights() -> Self {
        Self {
            base_column: None,
            description_column: 3,
            header_row: 7,
            ..Self::main_categories()
        }
    }

    pub fn for_dataset(kind: DatasetKind) -> Self {
        match kind {
            DatasetKind::Main => Self::main_categories(),
            DatasetKind::Details => Self::sub_categories(),
            DatasetKind::Weights => Self::weights(),
        }
    }
}

/// One row of the summary sheet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SheetEntry {
    pub sheet_name: String,
    pub base: Option<String>,
    pub description: String,
}

/// Read the summary sheet.
///
/// Row 0 is the pandas-style header row and is skipped. Rows whose sheet
/// name is a skip label or whose declared columns are blank are dropped.
pub fn load_summary(workbook: &mut dyn Workbook, layout: &SheetLayout) -> LoadResult<Vec<SheetEntry>> {
    let grid = workbook.read_sheet(&layout.summary_sheet)?;

    let mut entries = Vec::new();
    for row in 1..grid.height() {
        let Some(sheet_name) = grid.cell(row, layout.sheet_name_column).as_text() else {
            continue;
        };
        if layout.skip_labels.iter().any(|l| l == &sheet_name) {
            continue;
        }
        let Some(description) = grid.cell(row, layout.description_column).as_text() else {
            continue;
        };
        let base = match layout.base_column {
            Some(col) => match grid.cell(row, col).as_text() {
                Some(b) => Some(b),
                None => continue,
            },
            None => None,
        };
        entries.push(SheetEntry { sheet_name, base, description });
    }

    if entries.is_empty() {
        return Err(LoadError::LayoutMismatch {
            workbook: workbook.source_name().to_string(),
            sheet: layout.summary_sheet.clone(),
            message: format!(
                "no data sheets listed in columns {} / {}",
                layout.sheet_name_column, layout.description_column
            ),
        });
    }
    Ok(entries)
}

/// Read one data sheet into raw observations, one per (row, period column).
pub fn load_sheet(
    workbook: &mut dyn Workbook,
    entry: &SheetEntry,
    layout: &SheetLayout,
    source_index: usize,
) -> LoadResult<Vec<RawObservation>> {
    let grid = workbook.read_sheet(&entry.sheet_name)?;
    let mismatch = |message: String| LoadError::LayoutMismatch {
        workbook: workbook.source_name().to_string(),
        sheet: entry.sheet_name.clone(),
        message,
    };

    let header = grid
        .row(layout.header_row)
        .ok_or_else(|| mismatch(format!("header row {} is missing", layout.header_row)))?;

    let label = header.first().and_then(|c| c.as_text()).unwrap_or_default();
    if label != layout.label_header {
        return Err(mismatch(format!(
            "expected '{}' in the first header cell of row {}, found '{}'",
            layout.label_header, layout.header_row, label
        )));
    }

    let value_columns: Vec<usize> = (1..header.len())
        .step_by(2)
        .filter(|&c| !header[c].is_blank())
        .collect();
    if value_columns.is_empty() {
        return Err(mismatch("header row has no period columns".to_string()));
    }

    let mut observations = Vec::new();
    for row in (layout.header_row + 1)..grid.height() {
        let country = grid.cell(row, 0).as_text();
        let all_blank = value_columns.iter().all(|&c| grid.cell(row, c).is_blank());
        if country.is_none() && all_blank {
            continue;
        }
        let country = country.unwrap_or_default();
        for &col in &value_columns {
            observations.push(RawObservation {
                country: country.clone(),
                category: entry.description.clone(),
                period: header[col].clone(),
                value: grid.cell(row, col).clone(),
                sheet: entry.sheet_name.clone(),
                source_index,
            });
        }
    }
    Ok(observations)
}

/// Everything read from one source workbook.
#[derive(Debug, Clone)]
pub struct LoadedSource {
    pub name: String,
    pub entries: Vec<SheetEntry>,
    pub observations: Vec<RawObservation>,
}

/// Open a source, read its summary and every sheet it lists.
pub fn load_source(path: &Path, layout: &SheetLayout, source_index: usize) -> LoadResult<LoadedSource> {
    let mut workbook = open_workbook(path)?;
    let name = workbook.source_name().to_string();
    log_info(format!("📖 Reading {}", name));

    let entries = load_summary(workbook.as_mut(), layout)?;
    log_info_indent(format!("{} sheets listed in '{}'", entries.len(), layout.summary_sheet), 1);

    let mut observations = Vec::new();
    for entry in &entries {
        observations.extend(load_sheet(workbook.as_mut(), entry, layout, source_index)?);
    }
    log_success(format!("{}: {} raw cells", name, observations.len()));

    Ok(LoadedSource { name, entries, observations })
}
