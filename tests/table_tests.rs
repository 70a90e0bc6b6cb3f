use pretty_assertions::assert_eq;
use tempfile::tempdir;

use tagfill::{CellValue, Error, FieldMapping, TableReader};

mod common;

#[test]
fn test_reads_csv_and_drops_blank_rows() {
    common::setup();
    let dir = tempdir().unwrap();
    let path = dir.path().join("rows.csv");
    std::fs::write(
        &path,
        "\u{feff}Project_Name,Power_kW,Name,Name\nSolar Park,110,a,b\n , ,,\nShort,42\n",
    )
    .unwrap();

    let table = TableReader::new().read(&path).unwrap();
    assert_eq!(table.columns, ["Project_Name", "Power_kW", "Name", "Name.1"]);
    assert_eq!(table.len(), 2);

    let first = &table.rows[0];
    assert_eq!(first.value("Power_kW"), Some(&CellValue::from("110")));
    assert_eq!(first.value("Name.1"), Some(&CellValue::from("b")));

    let short = &table.rows[1];
    assert_eq!(short.value("Name"), Some(&CellValue::Empty));
    assert_eq!(short.filled("Name"), None);
}

#[test]
fn test_blank_csv_header_keeps_its_column() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("sheet.csv");
    std::fs::write(&path, "Project_Name,,Date\nSolar Park,7,2024-01-01\n").unwrap();

    let table = TableReader::new().read(&path).unwrap();
    assert_eq!(table.columns, ["Project_Name", "Unnamed: 1", "Date"]);
    assert_eq!(table.rows[0].value("Unnamed: 1"), Some(&CellValue::from("7")));
    assert_eq!(table.rows[0].value("Date"), Some(&CellValue::from("2024-01-01")));
}

#[test]
fn test_reads_windows_1251_csv() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("legacy.csv");
    let (bytes, _, _) = encoding_rs::WINDOWS_1251.encode("Объект,Адрес\nСтанция,Москва\n");
    std::fs::write(&path, &bytes).unwrap();

    let table = TableReader::new().read(&path).unwrap();
    assert_eq!(table.columns, ["Объект", "Адрес"]);
    assert_eq!(table.rows[0].value("Адрес"), Some(&CellValue::from("Москва")));
}

#[test]
fn test_reads_json_records() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("rows.json");
    std::fs::write(
        &path,
        r#"[
            {"Project_Name": "Solar Park", "Power_kW": 110, "Ratio": 0.5, "Done": true},
            {"Project_Name": null, "Power_kW": null},
            {"Project_Name": "Wind Farm", "Extra": "x"}
        ]"#,
    )
    .unwrap();

    let table = TableReader::new().read(&path).unwrap();
    assert_eq!(
        table.columns,
        ["Project_Name", "Power_kW", "Ratio", "Done", "Extra"]
    );
    assert_eq!(table.len(), 2);
    let first = &table.rows[0];
    assert_eq!(first.value("Power_kW"), Some(&CellValue::Integer(110)));
    assert_eq!(first.value("Ratio"), Some(&CellValue::Number(0.5)));
    assert_eq!(first.value("Done"), Some(&CellValue::Bool(true)));
    assert_eq!(table.rows[1].value("Power_kW"), None);
}

#[test]
fn test_read_errors() {
    let dir = tempdir().unwrap();
    let reader = TableReader::new();

    let missing = dir.path().join("missing.csv");
    assert!(matches!(reader.read(&missing), Err(Error::NotFound { .. })));

    let text = dir.path().join("rows.txt");
    std::fs::write(&text, "a,b\n1,2\n").unwrap();
    assert!(matches!(
        reader.read(&text),
        Err(Error::UnsupportedFormat { extension, .. }) if extension == "txt"
    ));

    let header_only = dir.path().join("empty.csv");
    std::fs::write(&header_only, "A,B\n,\n").unwrap();
    assert!(matches!(reader.read(&header_only), Err(Error::Empty { .. })));

    let broken = dir.path().join("broken.json");
    std::fs::write(&broken, "{not json").unwrap();
    assert!(matches!(reader.read(&broken), Err(Error::Corrupt { .. })));
}

#[test]
fn test_mapping_persists_between_sessions() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("mapping.json");

    assert!(FieldMapping::load(&path).unwrap().is_empty());

    let mut mapping = FieldMapping::new();
    mapping.insert("Project_Name", "PROJECTNAME");
    mapping.insert("Desc", "DESCRIPTION");
    mapping.save(&path).unwrap();
    assert_eq!(FieldMapping::load(&path).unwrap(), mapping);

    // a human-edited file replaces the mapping wholesale
    std::fs::write(&path, r#"{"Title": "PROJECTNAME"}"#).unwrap();
    let edited = FieldMapping::load(&path).unwrap();
    assert_eq!(edited.len(), 1);
    assert_eq!(edited.get("Title"), Some("PROJECTNAME"));

    std::fs::write(&path, "[1, 2]").unwrap();
    assert!(matches!(FieldMapping::load(&path), Err(Error::Mapping { .. })));
}
