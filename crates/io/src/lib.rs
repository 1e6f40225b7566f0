// File I/O operations

pub mod csv;
pub mod table;
pub mod xlsx;

use std::path::Path;

use rosterlink_merge::model::{CanonicalTable, HeaderList, Table};

/// Spreadsheet family, decided by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// csv / tsv / txt, read through the csv crate.
    Delimited,
    /// xlsx / xlsm / xls / xlsb / ods, read through calamine.
    Workbook,
}

impl FileKind {
    pub fn from_path(path: &Path) -> Result<Self, String> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "csv" | "tsv" | "txt" => Ok(FileKind::Delimited),
            "xlsx" | "xlsm" | "xls" | "xlsb" | "ods" => Ok(FileKind::Workbook),
            "" => Err(format!("{}: no file extension", path.display())),
            other => Err(format!("{}: unsupported file type '.{other}'", path.display())),
        }
    }
}

/// Raw cell text of a sheet, row-major, rows counted from the top of the sheet.
pub fn read_grid(path: &Path, sheet: Option<&str>) -> Result<Vec<Vec<String>>, String> {
    match FileKind::from_path(path)? {
        FileKind::Delimited => csv::read_rows(path),
        FileKind::Workbook => xlsx::read_rows(path, sheet),
    }
}

/// Read the table whose labels sit on row `header_row` (0-based). Rows above
/// it are ignored.
pub fn read_table(path: &Path, header_row: usize, sheet: Option<&str>) -> Result<Table, String> {
    let grid = read_grid(path, sheet)?;
    table::from_grid(grid, header_row)
        .map_err(|e| format!("{}: {e}", path.display()))
}

/// Header labels on row `header_row` of `sheet` (the first sheet when
/// `None`), or `None` when the document or the row cannot be read. The
/// failure is logged, never returned.
pub fn extract_headers(path: &Path, header_row: usize, sheet: Option<&str>) -> Option<HeaderList> {
    match read_grid(path, sheet).and_then(|grid| table::headers_at(&grid, header_row)) {
        Ok(headers) => Some(headers),
        Err(e) => {
            log::warn!("cannot extract headers from {} (row {}): {e}", path.display(), header_row + 1);
            None
        }
    }
}

/// First non-empty cell of the first row, used as the roster's title.
pub fn read_title(path: &Path, sheet: Option<&str>) -> Result<Option<String>, String> {
    let grid = read_grid(path, sheet)?;
    Ok(grid
        .first()
        .and_then(|row| row.iter().find(|c| !c.trim().is_empty()))
        .map(|c| c.trim().to_string()))
}

/// Presentation choices for the merged output.
#[derive(Debug, Clone, Default)]
pub struct WriteOptions {
    /// Title written above the header row, merged across all columns.
    pub title: Option<String>,
}

/// Write the merged table; the extension of `path` selects CSV or xlsx.
pub fn write_table(path: &Path, table: &CanonicalTable, options: &WriteOptions) -> Result<(), String> {
    match FileKind::from_path(path)? {
        FileKind::Delimited => csv::export(table, path),
        FileKind::Workbook => {
            let ext = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
            if !ext.eq_ignore_ascii_case("xlsx") {
                return Err(format!("{}: only .xlsx output is supported for workbooks", path.display()));
            }
            xlsx::export(table, path, options)
        }
    }
}
