// Shaping a raw cell grid into a labelled table

use rosterlink_merge::model::{HeaderList, Table};

/// Label for a column whose header cell is blank, 0-based.
fn unnamed(col: usize) -> String {
    format!("Unnamed: {col}")
}

/// Number of cells up to and including the last non-blank one.
fn used_width(row: &[String]) -> usize {
    row.iter().rposition(|c| !c.trim().is_empty()).map_or(0, |i| i + 1)
}

fn table_width(grid: &[Vec<String>], header_row: usize) -> usize {
    grid[header_row..].iter().map(|r| used_width(r)).max().unwrap_or(0)
}

fn labels(row: &[String], width: usize) -> HeaderList {
    (0..width)
        .map(|col| match row.get(col).map(|c| c.trim()) {
            Some(label) if !label.is_empty() => label.to_string(),
            _ => unnamed(col),
        })
        .collect()
}

/// Header labels on `header_row`. Blank labels inside the used width become
/// `Unnamed: N`.
pub fn headers_at(grid: &[Vec<String>], header_row: usize) -> Result<HeaderList, String> {
    let row = grid
        .get(header_row)
        .ok_or_else(|| format!("header row {} is past the end ({} rows)", header_row + 1, grid.len()))?;
    if used_width(row) == 0 {
        return Err(format!("header row {} is empty", header_row + 1));
    }
    Ok(labels(row, table_width(grid, header_row)))
}

/// Build a table from the grid: labels from `header_row`, data from the rows
/// below it. Fully blank rows are skipped; every row is padded to the header
/// width.
pub fn from_grid(grid: Vec<Vec<String>>, header_row: usize) -> Result<Table, String> {
    let headers = headers_at(&grid, header_row)?;
    let width = headers.len();

    let rows = grid
        .into_iter()
        .skip(header_row + 1)
        .filter(|row| used_width(row) > 0)
        .map(|mut row| {
            row.resize(width, String::new());
            row
        })
        .collect();

    Ok(Table::new(headers, rows))
}
