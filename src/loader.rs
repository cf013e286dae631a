use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use calamine::{Data, Reader, Xlsx};
use serde_json::{Number, Value};
use std::collections::HashMap;
use std::fs;
use std::io::Cursor;
use std::path::Path;

use crate::error::ImportError;
use crate::reading::{RawRecord, value_to_text};

pub const SPREADSHEET_EXTENSION: &str = ".xlsx";

/// Key given to columns whose header cell is empty.
pub const EMPTY_HEADER: &str = "__EMPTY";

/// Checks that an uploaded file name carries the `.xlsx` extension
/// (case-insensitive).
pub fn check_extension(file_name: &str) -> Result<(), ImportError> {
    if file_name.to_lowercase().ends_with(SPREADSHEET_EXTENSION) {
        Ok(())
    } else {
        Err(ImportError::Format(file_name.to_string()))
    }
}

/// Reads the raw records of an uploaded workbook.
///
/// The extension is checked first so nothing is parsed for a wrong file.
///
/// # Arguments
/// * `file_name` - Name the file was uploaded with
/// * `bytes` - File content
///
/// # Returns
/// * `Result<Vec<RawRecord>, ImportError>` - One record per data row of the first sheet
pub fn import_spreadsheet(file_name: &str, bytes: &[u8]) -> Result<Vec<RawRecord>, ImportError> {
    check_extension(file_name)?;
    records_from_xlsx(bytes)
}

/// Load the raw records of a workbook on disk.
///
/// # Examples
/// ```no_run
/// use condo_meter::loader::load_spreadsheet;
///
/// match load_spreadsheet("leituras.xlsx") {
///     Ok(rows) => println!("Read {} rows", rows.len()),
///     Err(e) => eprintln!("Error loading workbook: {}", e),
/// }
/// ```
pub fn load_spreadsheet(filepath: impl AsRef<Path>) -> Result<Vec<RawRecord>, ImportError> {
    let path = filepath.as_ref();
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default();
    check_extension(file_name)?;
    let bytes = fs::read(path)?;
    records_from_xlsx(&bytes)
}

/// Turns the first sheet of an XLSX workbook into records keyed by the header row.
///
/// Empty cells are left out of their record and wholly empty rows are skipped.
/// Header keys come from [`header_keys`].
pub fn records_from_xlsx(bytes: &[u8]) -> Result<Vec<RawRecord>, ImportError> {
    let mut workbook: Xlsx<_> =
        Xlsx::new(Cursor::new(bytes)).map_err(|e| ImportError::Parse(e.to_string()))?;

    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| ImportError::Parse("workbook has no sheets".to_string()))?;

    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| ImportError::Parse(e.to_string()))?;

    let mut rows = range.rows();
    let headers = match rows.next() {
        Some(header_row) => header_keys(header_row),
        None => return Ok(Vec::new()),
    };

    let mut records = Vec::new();
    for row in rows {
        let mut record = RawRecord::new();
        for (header, cell) in headers.iter().zip(row.iter()) {
            if let Some(value) = cell_to_value(cell) {
                record.insert(header.clone(), value);
            }
        }
        if !record.is_empty() {
            records.push(record);
        }
    }

    Ok(records)
}

/// Names every column of the header row. Empty header cells become `__EMPTY`
/// and a repeated name gets a `_1`, `_2`, ... suffix, so the first column keeps
/// the plain name and no column is dropped.
pub fn header_keys(header_row: &[Data]) -> Vec<String> {
    let mut taken: HashMap<String, usize> = HashMap::new();
    let mut keys = Vec::with_capacity(header_row.len());

    for cell in header_row {
        let base = cell_to_value(cell)
            .map(|v| value_to_text(&v))
            .unwrap_or_else(|| EMPTY_HEADER.to_string());

        let mut key = base.clone();
        if let Some(&count) = taken.get(&base) {
            let mut next = count;
            loop {
                key = format!("{}_{}", base, next);
                next += 1;
                if !taken.contains_key(&key) {
                    break;
                }
            }
            taken.insert(base, next);
        } else {
            taken.insert(base, 1);
        }
        taken.entry(key.clone()).or_insert(1);
        keys.push(key);
    }

    keys
}

// Empty cells map to None so they never reach a record
fn cell_to_value(cell: &Data) -> Option<Value> {
    match cell {
        Data::Empty => None,
        Data::Int(i) => Some(Value::Number((*i).into())),
        Data::Float(f) => Number::from_f64(*f).map(Value::Number),
        Data::String(s) => Some(Value::String(s.clone())),
        Data::Bool(b) => Some(Value::Bool(*b)),
        Data::DateTime(dt) => Number::from_f64(dt.as_f64()).map(Value::Number),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Some(Value::String(s.clone())),
        Data::Error(e) => Some(Value::String(e.to_string())),
    }
}

/// Base64 (standard alphabet) of a logo image, as embedded in the reports.
pub fn encode_logo(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

pub fn load_logo(filepath: impl AsRef<Path>) -> std::io::Result<String> {
    let bytes = fs::read(filepath)?;
    Ok(encode_logo(&bytes))
}
