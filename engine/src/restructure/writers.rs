//! File writers for the csv, excel and json output formats.

use chrono::NaiveDateTime;
use rust_xlsxwriter::{Format, Workbook, XlsxError};
use serde_json::Value as JsonValue;
use std::path::Path;

use crate::error::{RestructureError, RestructureResult};
use crate::models::{Dataset, Value};

/// Largest integer magnitude an Excel number cell holds exactly.
const EXCEL_MAX_EXACT_INT: u64 = 1 << 53;

const EXCEL_DATETIME_FORMAT: &str = "yyyy-mm-ddThh:mm:ss";

/// Header row plus one row per record. Missing values are empty cells.
pub fn write_csv(dataset: &Dataset, path: &Path) -> RestructureResult<()> {
    fill_csv(dataset, path).map_err(|source| RestructureError::Csv {
        path: path.to_path_buf(),
        source,
    })
}

fn fill_csv(dataset: &Dataset, path: &Path) -> csv::Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(dataset.column_names())?;
    for row in 0..dataset.row_count() {
        writer.write_record(dataset.columns().iter().map(|c| c.values[row].to_text()))?;
    }
    writer.flush()?;
    Ok(())
}

/// Single-sheet workbook with a header row.
pub fn write_excel(dataset: &Dataset, path: &Path) -> RestructureResult<()> {
    fill_workbook(dataset, path).map_err(|source| RestructureError::Excel {
        path: path.to_path_buf(),
        source,
    })
}

fn fill_workbook(dataset: &Dataset, path: &Path) -> Result<(), XlsxError> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    let datetime_format = Format::new().set_num_format(EXCEL_DATETIME_FORMAT);

    for (index, column) in dataset.columns().iter().enumerate() {
        // Out-of-range indices are rejected by the writer itself
        let col = u16::try_from(index).unwrap_or(u16::MAX);
        sheet.write_string(0, col, column.name.as_str())?;

        for (offset, value) in column.values.iter().enumerate() {
            let row = u32::try_from(offset + 1).unwrap_or(u32::MAX);
            match excel_cell(value) {
                ExcelCell::Blank => {}
                ExcelCell::Number(n) => {
                    sheet.write_number(row, col, n)?;
                }
                ExcelCell::Bool(b) => {
                    sheet.write_boolean(row, col, b)?;
                }
                ExcelCell::DateTime(t) => {
                    sheet.write_datetime_with_format(row, col, t, &datetime_format)?;
                }
                ExcelCell::Text(text) => {
                    sheet.write_string(row, col, text)?;
                }
            }
        }
    }

    workbook.save(path)
}

/// How a value lands in a worksheet cell.
#[derive(Debug, PartialEq)]
enum ExcelCell<'a> {
    Blank,
    Number(f64),
    Bool(bool),
    DateTime(&'a NaiveDateTime),
    Text(String),
}

fn excel_cell(value: &Value) -> ExcelCell<'_> {
    match value {
        Value::Int(i) if i.unsigned_abs() <= EXCEL_MAX_EXACT_INT => ExcelCell::Number(*i as f64),
        Value::Int(i) => ExcelCell::Text(i.to_string()),
        Value::Float(f) if f.is_finite() => ExcelCell::Number(*f),
        Value::Bool(b) => ExcelCell::Bool(*b),
        Value::Timestamp(t) => ExcelCell::DateTime(t),
        other => {
            let text = other.to_text();
            if text.is_empty() {
                ExcelCell::Blank
            } else {
                ExcelCell::Text(text)
            }
        }
    }
}

/// Records as a JSON array with 2-space indentation.
pub fn write_json(records: &[JsonValue], path: &Path) -> RestructureResult<()> {
    let text = serde_json::to_string_pretty(records)?;
    std::fs::write(path, text).map_err(|source| RestructureError::Io {
        path: path.to_path_buf(),
        source,
    })
}
