//! Row-oriented table ingestion from CSV, JSON and spreadsheet files.

use std::fmt;
use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::logging::TABLE;

/// One cell. `Empty` stands for an explicit null / blank cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Empty,
    Bool(bool),
    Integer(i64),
    Number(f64),
    Text(String),
}

impl CellValue {
    /// Empty cells and whitespace-only text carry no value to substitute.
    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Bool(b) => write!(f, "{b}"),
            CellValue::Integer(n) => write!(f, "{n}"),
            CellValue::Number(n) => write!(f, "{n}"),
            CellValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::Text(s)
    }
}

impl From<i64> for CellValue {
    fn from(n: i64) -> Self {
        CellValue::Integer(n)
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

impl From<bool> for CellValue {
    fn from(b: bool) -> Self {
        CellValue::Bool(b)
    }
}

/// Column name -> value for one data row, in column order.
///
/// A column can be absent from a row altogether, or present with an
/// [`CellValue::Empty`] value; [`Row::value`] tells the two apart.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Row(IndexMap<String, CellValue>);

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, column: impl Into<String>, value: impl Into<CellValue>) -> Self {
        self.insert(column, value);
        self
    }

    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<CellValue>) {
        self.0.insert(column.into(), value.into());
    }

    /// `None` when the column is absent from this row.
    pub fn value(&self, column: &str) -> Option<&CellValue> {
        self.0.get(column)
    }

    /// Present and not blank.
    pub fn filled(&self, column: &str) -> Option<&CellValue> {
        self.value(column).filter(|v| !v.is_blank())
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &CellValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn is_all_blank(&self) -> bool {
        self.0.values().all(CellValue::is_blank)
    }
}

impl<K: Into<String>, V: Into<CellValue>> FromIterator<(K, V)> for Row {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Row(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl Table {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TableFormat {
    Csv,
    Json,
    Spreadsheet,
}

impl TableFormat {
    fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "csv" => Some(TableFormat::Csv),
            "json" => Some(TableFormat::Json),
            "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => Some(TableFormat::Spreadsheet),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TableReader;

impl TableReader {
    pub fn new() -> Self {
        TableReader
    }

    /// Reads `path` into a table, dropping rows whose cells are all blank.
    pub fn read(&self, path: &Path) -> Result<Table> {
        if !path.exists() {
            return Err(Error::NotFound {
                path: path.to_path_buf(),
            });
        }
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        let format =
            TableFormat::from_extension(&extension).ok_or_else(|| Error::UnsupportedFormat {
                path: path.to_path_buf(),
                extension: extension.clone(),
            })?;

        let mut table = match format {
            TableFormat::Csv => read_csv(path)?,
            TableFormat::Json => read_json(path)?,
            TableFormat::Spreadsheet => read_spreadsheet(path)?,
        };

        let before = table.rows.len();
        table.rows.retain(|row| !row.is_all_blank());
        if table.rows.is_empty() {
            return Err(Error::Empty {
                path: path.to_path_buf(),
            });
        }

        info!(
            target: TABLE,
            path = %path.display(),
            rows = table.rows.len(),
            columns = table.columns.len(),
            dropped = before - table.rows.len(),
            "read table"
        );
        Ok(table)
    }
}

/// Names blank headers `Unnamed: <position>` and suffixes repeated names
/// with `.1`, `.2`, ...
fn dedupe_headers<I: IntoIterator<Item = String>>(headers: I) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    for (idx, header) in headers.into_iter().enumerate() {
        let base = match header.trim() {
            "" => format!("Unnamed: {idx}"),
            trimmed => trimmed.to_string(),
        };
        let mut name = base.clone();
        let mut n = 0;
        while seen.contains(&name) {
            n += 1;
            name = format!("{base}.{n}");
        }
        seen.push(name);
    }
    seen
}

fn decode_text(path: &Path, bytes: Vec<u8>) -> String {
    const BOM: &[u8] = b"\xef\xbb\xbf";
    let bytes = if bytes.starts_with(BOM) {
        bytes[BOM.len()..].to_vec()
    } else {
        bytes
    };
    match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(err) => {
            debug!(target: TABLE, path = %path.display(), "not UTF-8, decoding as windows-1251");
            let (text, _, _) = encoding_rs::WINDOWS_1251.decode(err.as_bytes());
            text.into_owned()
        }
    }
}

fn read_csv(path: &Path) -> Result<Table> {
    let bytes = std::fs::read(path).map_err(|e| Error::from_io(path, e))?;
    let text = decode_text(path, bytes);

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(text.as_bytes());
    let headers = reader
        .headers()
        .map_err(|e| Error::corrupt(path, e.to_string()))?
        .iter()
        .map(str::to_string)
        .collect::<Vec<_>>();
    let columns = dedupe_headers(headers);

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| Error::corrupt(path, e.to_string()))?;
        let row: Row = columns
            .iter()
            .enumerate()
            .map(|(idx, column)| {
                let value = match record.get(idx) {
                    Some(cell) if !cell.is_empty() => CellValue::Text(cell.to_string()),
                    _ => CellValue::Empty,
                };
                (column.clone(), value)
            })
            .collect();
        rows.push(row);
    }
    Ok(Table { columns, rows })
}

fn json_cell(value: serde_json::Value) -> CellValue {
    match value {
        serde_json::Value::Null => CellValue::Empty,
        serde_json::Value::Bool(b) => CellValue::Bool(b),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => CellValue::Integer(i),
            None => CellValue::Number(n.as_f64().unwrap_or(f64::NAN)),
        },
        serde_json::Value::String(s) => CellValue::Text(s),
        other => CellValue::Text(other.to_string()),
    }
}

/// Expects an array of flat records: `[{"column": value, ...}, ...]`.
fn read_json(path: &Path) -> Result<Table> {
    let bytes = std::fs::read(path).map_err(|e| Error::from_io(path, e))?;
    let records: Vec<serde_json::Map<String, serde_json::Value>> =
        serde_json::from_slice(&bytes).map_err(|e| Error::corrupt(path, e.to_string()))?;

    let mut columns: Vec<String> = Vec::new();
    let mut rows = Vec::with_capacity(records.len());
    for record in records {
        let mut row = Row::new();
        for (key, value) in record {
            if !columns.contains(&key) {
                columns.push(key.clone());
            }
            row.insert(key, json_cell(value));
        }
        rows.push(row);
    }
    Ok(Table { columns, rows })
}

fn spreadsheet_cell(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Empty,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Int(i) => CellValue::Integer(*i),
        Data::Float(f) => CellValue::Number(*f),
        Data::Bool(b) => CellValue::Bool(*b),
        other => CellValue::Text(other.to_string()),
    }
}

/// First worksheet; its first row is the header.
fn read_spreadsheet(path: &Path) -> Result<Table> {
    let mut workbook = open_workbook_auto(path).map_err(|e| Error::corrupt(path, e.to_string()))?;
    let Some(sheet) = workbook.sheet_names().first().cloned() else {
        return Err(Error::Empty {
            path: path.to_path_buf(),
        });
    };
    let range = workbook
        .worksheet_range(&sheet)
        .map_err(|e| Error::corrupt(path, e.to_string()))?;

    let mut sheet_rows = range.rows();
    let Some(header) = sheet_rows.next() else {
        return Err(Error::Empty {
            path: path.to_path_buf(),
        });
    };
    let columns = dedupe_headers(header.iter().map(|c| spreadsheet_cell(c).to_string()));

    let rows = sheet_rows
        .map(|cells| {
            columns
                .iter()
                .enumerate()
                .map(|(idx, column)| {
                    let value = cells.get(idx).map_or(CellValue::Empty, spreadsheet_cell);
                    (column.clone(), value)
                })
                .collect::<Row>()
        })
        .collect();
    debug!(target: TABLE, sheet = %sheet, "read worksheet");
    Ok(Table { columns, rows })
}
