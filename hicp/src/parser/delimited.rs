//! Directory-of-CSV workbooks with encoding and delimiter auto-detection.
//!
//! Each `<sheet name>.csv` file in the directory is one sheet. Eurostat CSV
//! exports arrive in UTF-8, Latin-1 or Windows-1252, with `,` or `;`.

use std::fs;
use std::path::{Path, PathBuf};

use csv::ReaderBuilder;

use super::{text_cell, SheetGrid, Workbook};
use crate::error::{LoadError, LoadResult};

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let charset = chardet::detect(bytes).0;

    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => charset,
    }
}

/// Decode bytes to string using the specified encoding
pub fn decode_content(bytes: &[u8], encoding: &str) -> String {
    match encoding.to_lowercase().as_str() {
        "iso-8859-1" | "latin-1" | "latin1" => encoding_rs::ISO_8859_15.decode(bytes).0.into_owned(),
        "windows-1252" | "cp1252" => encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned(),
        _ => String::from_utf8_lossy(bytes).into_owned(),
    }
}

/// Detect the delimiter by counting occurrences in the first line
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    let separators = [',', ';', '\t', '|'];
    let mut best_sep = ',';
    let mut best_count = 0;

    for &sep in &separators {
        let count = first_line.matches(sep).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}

/// Parse decoded CSV text into a grid without interpreting any cell.
pub fn parse_grid(name: &str, content: &str, delimiter: char) -> LoadResult<SheetGrid> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter as u8)
        .from_reader(content.as_bytes());

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(text_cell).collect());
    }
    Ok(SheetGrid::new(name, rows))
}

/// A directory where each CSV file is a sheet.
pub struct CsvWorkbook {
    dir: PathBuf,
    name: String,
}

impl CsvWorkbook {
    pub fn open(dir: &Path) -> LoadResult<Self> {
        if !dir.is_dir() {
            return Err(LoadError::FileNotFound(dir.to_path_buf()));
        }
        let name = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| dir.display().to_string());
        Ok(Self { dir: dir.to_path_buf(), name })
    }

    fn sheet_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.csv", name))
    }
}

impl Workbook for CsvWorkbook {
    fn source_name(&self) -> &str {
        &self.name
    }

    fn sheet_names(&self) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(&self.dir)
            .map(|entries| {
                entries
                    .filter_map(|e| e.ok())
                    .map(|e| e.path())
                    .filter(|p| p.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("csv")))
                    .filter_map(|p| p.file_stem().map(|s| s.to_string_lossy().into_owned()))
                    .collect()
            })
            .unwrap_or_default();
        names.sort();
        names
    }

    fn read_sheet(&mut self, name: &str) -> LoadResult<SheetGrid> {
        let path = self.sheet_path(name);
        if !path.is_file() {
            return Err(LoadError::SheetNotFound {
                workbook: self.name.clone(),
                sheet: name.to_string(),
            });
        }
        let bytes = fs::read(&path)?;
        let encoding = detect_encoding(&bytes);
        let content = decode_content(&bytes, &encoding);
        let delimiter = detect_delimiter(&content);
        parse_grid(name, &content, delimiter)
    }
}
