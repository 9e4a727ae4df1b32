// ============================================================
// SPREADSHEET READER
// ============================================================
// Excel / OpenDocument workbooks into datasets via calamine

use crate::domain::dataset::{CellValue, Dataset};
use crate::domain::error::{AppError, Result};
use crate::infrastructure::csv::normalize_headers;
use calamine::{open_workbook_auto, Data, DataType, Range, Reader};
use chrono::Timelike;
use std::path::Path;

pub const SPREADSHEET_EXTENSIONS: [&str; 5] = ["xlsx", "xlsm", "xlsb", "xls", "ods"];

/// Which worksheet to load
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SheetSelector {
    First,
    Index(usize),
    Name(String),
}

impl SheetSelector {
    /// A purely numeric argument selects by zero-based index, anything else by name.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        match raw.parse::<usize>() {
            Ok(idx) => SheetSelector::Index(idx),
            Err(_) => SheetSelector::Name(raw.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ParsedSheet {
    pub dataset: Dataset,
    pub sheet: String,
}

pub fn read_workbook(path: &Path, selector: &SheetSelector) -> Result<ParsedSheet> {
    let mut workbook = open_workbook_auto(path).map_err(|e| {
        AppError::ReadError(format!("Failed to open workbook {}: {}", path.display(), e))
    })?;

    let names = workbook.sheet_names().to_vec();
    let index = match selector {
        SheetSelector::First => 0,
        SheetSelector::Index(idx) => *idx,
        SheetSelector::Name(name) => names
            .iter()
            .position(|n| n == name)
            .ok_or_else(|| {
                AppError::ReadError(format!(
                    "Sheet '{}' not found in {} (sheets: {})",
                    name,
                    path.display(),
                    names.join(", ")
                ))
            })?,
    };
    let sheet = names.get(index).cloned().ok_or_else(|| {
        AppError::ReadError(format!(
            "Workbook {} has no sheet at index {}",
            path.display(),
            index
        ))
    })?;

    let range = workbook
        .worksheet_range_at(index)
        .ok_or_else(|| AppError::ReadError(format!("No worksheet found: {}", sheet)))?
        .map_err(|e| AppError::ReadError(format!("Failed to read sheet '{}': {}", sheet, e)))?;

    let dataset = range_to_dataset(&range)
        .map_err(|e| AppError::ReadError(format!("Sheet '{}' of {}: {}", sheet, path.display(), e)))?;

    Ok(ParsedSheet { dataset, sheet })
}

/// First row is the header, the rest are records.
fn range_to_dataset(range: &Range<Data>) -> Result<Dataset> {
    let mut rows = range.rows();
    let header = rows
        .next()
        .ok_or_else(|| AppError::ReadError("sheet is empty".to_string()))?;

    let header_text: Vec<String> = header.iter().map(|cell| cell_value(cell).to_string()).collect();
    let columns = normalize_headers(header_text.iter().map(String::as_str));

    let records = rows
        .map(|row| row.iter().map(cell_value).collect::<Vec<_>>())
        .collect();

    Dataset::new(columns, records)
}

fn cell_value(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Null,
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Float(f) => CellValue::from(*f),
        Data::Bool(b) => CellValue::text(if *b { "true" } else { "false" }),
        Data::String(s) => CellValue::from_text(s),
        Data::DateTime(_) => match cell.as_datetime() {
            Some(dt) if dt.num_seconds_from_midnight() == 0 => {
                CellValue::text(dt.format("%Y-%m-%d").to_string())
            }
            Some(dt) => CellValue::text(dt.format("%Y-%m-%d %H:%M:%S").to_string()),
            None => CellValue::Null,
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::from_text(s),
        Data::Error(_) => CellValue::Null,
    }
}
