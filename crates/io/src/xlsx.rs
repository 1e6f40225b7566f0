// Excel import (xlsx, xls, xlsb, ods) and merged roster export (xlsx only)
//
// Import flattens one worksheet to display text. Export writes a single
// formatted sheet: optional merged title row, header row, data rows.

use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader, Sheets};
use chrono::{Duration, NaiveDate};
use rust_xlsxwriter::{Format, FormatAlign, FormatBorder, Workbook, Worksheet};

use rosterlink_merge::model::CanonicalTable;

use crate::WriteOptions;

/// Title row height in points.
const TITLE_ROW_HEIGHT: f64 = 30.0;

/// Read one worksheet (the first when `sheet` is `None`) as display text.
/// Row and column 0 are the sheet's A1 even when the used range starts later.
pub fn read_rows(path: &Path, sheet: Option<&str>) -> Result<Vec<Vec<String>>, String> {
    let mut workbook: Sheets<_> = open_workbook_auto(path)
        .map_err(|e| format!("Failed to open Excel file: {}", e))?;

    let sheet_name = match sheet {
        Some(name) => name.to_string(),
        None => workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| "Excel file contains no sheets".to_string())?,
    };

    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| format!("Failed to read sheet '{}': {}", sheet_name, e))?;

    let (start_row, start_col) = range
        .start()
        .map(|(r, c)| (r as usize, c as usize))
        .unwrap_or((0, 0));

    let mut grid = vec![Vec::new(); start_row];
    for row in range.rows() {
        let mut cells = vec![String::new(); start_col];
        cells.extend(row.iter().map(render_cell));
        grid.push(cells);
    }
    Ok(grid)
}

/// Display text of a cell. Integral floats drop their decimals so numeric
/// student IDs read back as `2021001`, not `2021001.0`.
pub fn render_cell(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(n) => {
            if n.fract() == 0.0 && n.abs() < 1e15 {
                format!("{}", *n as i64)
            } else {
                format!("{}", n)
            }
        }
        Data::Int(n) => format!("{}", n),
        Data::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
        Data::Error(e) => format!("#{:?}", e),
        Data::DateTime(dt) => serial_to_text(dt.as_f64()),
        Data::DateTimeIso(s) => s.clone(),
        Data::DurationIso(s) => s.clone(),
    }
}

/// Excel serial date (1900 system) as `YYYY-MM-DD`, with ` HH:MM:SS` when
/// the serial carries a time of day.
fn serial_to_text(serial: f64) -> String {
    // 9999-12-31 is the last date Excel can store
    if !(0.0..2_958_466.0).contains(&serial) {
        return format!("{}", serial);
    }
    let Some(epoch) = NaiveDate::from_ymd_opt(1899, 12, 30).and_then(|d| d.and_hms_opt(0, 0, 0)) else {
        return format!("{}", serial);
    };
    let seconds = (serial * 86_400.0).round() as i64;
    let Some(at) = epoch.checked_add_signed(Duration::seconds(seconds)) else {
        return format!("{}", serial);
    };
    if seconds % 86_400 == 0 {
        at.format("%Y-%m-%d").to_string()
    } else {
        at.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

/// Write the merged roster.
///
/// Every cell gets a thin border and centered alignment. The natural-key
/// column uses the text number format `@` so long IDs never turn into
/// scientific notation; other integral values are written as numbers.
pub fn export(table: &CanonicalTable, path: &Path, options: &WriteOptions) -> Result<(), String> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();

    let cell_format = Format::new()
        .set_border(FormatBorder::Thin)
        .set_align(FormatAlign::Center)
        .set_align(FormatAlign::VerticalCenter);
    let text_format = cell_format.clone().set_num_format("@");

    let width = table.headers().len();
    let mut row = 0u32;

    if let Some(title) = options.title.as_deref() {
        write_title(worksheet, title, width, &cell_format)?;
        row += 1;
    }

    for (col, label) in table.headers().iter().enumerate() {
        worksheet
            .write_string_with_format(row, col as u16, label, &cell_format)
            .map_err(|e| format!("Failed to write header '{}': {}", label, e))?;
    }
    row += 1;

    for values in table.rows() {
        for (col, value) in values.iter().enumerate() {
            let result = if Some(col) == table.key_column {
                worksheet.write_string_with_format(row, col as u16, value, &text_format)
            } else if let Some(n) = plain_integer(value) {
                worksheet.write_number_with_format(row, col as u16, n, &cell_format)
            } else {
                worksheet.write_string_with_format(row, col as u16, value, &cell_format)
            };
            result.map_err(|e| format!("Failed to write cell ({}, {}): {}", row + 1, col + 1, e))?;
        }
        row += 1;
    }

    workbook
        .save(path)
        .map_err(|e| format!("Failed to save XLSX file: {}", e))?;
    Ok(())
}

fn write_title(worksheet: &mut Worksheet, title: &str, width: usize, format: &Format) -> Result<(), String> {
    // merge_range rejects single-cell ranges
    if width > 1 {
        worksheet
            .merge_range(0, 0, 0, (width - 1) as u16, title, format)
            .map_err(|e| format!("Failed to write merge: {}", e))?;
    } else {
        worksheet
            .write_string_with_format(0, 0, title, format)
            .map_err(|e| format!("Failed to write title: {}", e))?;
    }
    worksheet
        .set_row_height(0, TITLE_ROW_HEIGHT)
        .map_err(|e| format!("Failed to set row 1 height: {}", e))?;
    Ok(())
}

/// Digits without a leading zero, short enough to survive an f64.
fn plain_integer(value: &str) -> Option<f64> {
    if value.is_empty() || value.len() > 15 || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if value.len() > 1 && value.starts_with('0') {
        return None;
    }
    value.parse::<f64>().ok()
}
