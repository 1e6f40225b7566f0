use std::path::Path;

use rosterlink_io::{extract_headers, read_table, read_title, write_table, WriteOptions};
use rosterlink_merge::model::{CanonicalTable, Table};
use rust_xlsxwriter::Workbook;

fn s(v: &[&str]) -> Vec<String> {
    v.iter().map(|x| x.to_string()).collect()
}

/// Roster laid out like the usual registration sheets: title on row 1,
/// labels on row 2, numeric IDs stored as numbers.
fn write_roster(path: &Path) {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.write_string(0, 0, "2024 寒假离校登记表").unwrap();
    sheet.write_string(1, 0, "序号").unwrap();
    sheet.write_string(1, 1, "学号").unwrap();
    sheet.write_string(1, 2, "姓名").unwrap();
    sheet.write_number(2, 0, 1.0).unwrap();
    sheet.write_number(2, 1, 2021001.0).unwrap();
    sheet.write_string(2, 2, "Li").unwrap();
    sheet.write_number(4, 0, 2.0).unwrap();
    sheet.write_number(4, 1, 2021002.0).unwrap();
    sheet.write_string(4, 2, "Wang").unwrap();
    workbook.save(path).unwrap();
}

fn merged() -> CanonicalTable {
    CanonicalTable {
        table: Table::new(
            s(&["序号", "学号", "姓名"]),
            vec![s(&["1", "001", "Li"]), s(&["2", "002", "Wang"])],
        ),
        key_column: Some(1),
        sequence_column: Some(0),
    }
}

#[test]
fn test_xlsx_headers_below_title() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("roster.xlsx");
    write_roster(&path);

    assert_eq!(extract_headers(&path, 1, None), Some(s(&["序号", "学号", "姓名"])));
    assert_eq!(extract_headers(&path, 0, None), Some(s(&["2024 寒假离校登记表", "Unnamed: 1", "Unnamed: 2"])));
    assert_eq!(extract_headers(&path, 40, None), None);
}

#[test]
fn test_xlsx_table_and_title() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("roster.xlsx");
    write_roster(&path);

    let table = read_table(&path, 1, None).unwrap();
    assert_eq!(table.rows, vec![s(&["1", "2021001", "Li"]), s(&["2", "2021002", "Wang"])]);
    assert_eq!(read_title(&path, None).unwrap().as_deref(), Some("2024 寒假离校登记表"));
}

#[test]
fn test_unknown_sheet_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("roster.xlsx");
    write_roster(&path);

    assert!(read_table(&path, 1, Some("Nope")).is_err());
}

#[test]
fn test_xlsx_export_keeps_title_and_text_keys() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("Merged_result.xlsx");
    let options = WriteOptions {
        title: Some("2024 寒假离校登记表".into()),
    };
    write_table(&path, &merged(), &options).unwrap();

    assert_eq!(read_title(&path, None).unwrap().as_deref(), Some("2024 寒假离校登记表"));
    let table = read_table(&path, 1, None).unwrap();
    assert_eq!(table.headers, s(&["序号", "学号", "姓名"]));
    assert_eq!(table.rows, vec![s(&["1", "001", "Li"]), s(&["2", "002", "Wang"])]);
}

#[test]
fn test_xlsx_export_without_title() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("plain.xlsx");
    write_table(&path, &merged(), &WriteOptions::default()).unwrap();

    assert_eq!(extract_headers(&path, 0, None), Some(s(&["序号", "学号", "姓名"])));
}

#[test]
fn test_csv_export_reads_back() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("merged.csv");
    let options = WriteOptions {
        title: Some("ignored in csv".into()),
    };
    write_table(&path, &merged(), &options).unwrap();

    let table = read_table(&path, 0, None).unwrap();
    assert_eq!(table.headers, s(&["序号", "学号", "姓名"]));
    assert_eq!(table.rows[0], s(&["1", "001", "Li"]));
}

#[test]
fn test_unsupported_output_extension() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("merged.ods");
    assert!(write_table(&path, &merged(), &WriteOptions::default()).is_err());
}
