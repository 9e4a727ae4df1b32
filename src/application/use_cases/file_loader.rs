// ============================================================
// FILE LOADER USE CASE
// ============================================================
// Pick a reader from the file extension and load one dataset

use std::path::Path;

use serde::Serialize;
use tracing::info;

use crate::domain::dataset::{ColumnProfile, Dataset, FileProfile};
use crate::domain::error::{AppError, Result};
use crate::infrastructure::config::CsvSettings;
use crate::infrastructure::csv::CsvParser;
use crate::infrastructure::spreadsheet::{read_workbook, SheetSelector, SPREADSHEET_EXTENSIONS};

const CSV_EXTENSIONS: [&str; 2] = ["csv", "txt"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReaderKind {
    Csv,
    Spreadsheet,
}

impl ReaderKind {
    pub fn for_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        if CSV_EXTENSIONS.contains(&ext.as_str()) {
            Ok(ReaderKind::Csv)
        } else if SPREADSHEET_EXTENSIONS.contains(&ext.as_str()) {
            Ok(ReaderKind::Spreadsheet)
        } else {
            Err(AppError::ReadError(format!(
                "Unsupported file type '{}': {}",
                ext,
                path.display()
            )))
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReaderKind::Csv => "csv",
            ReaderKind::Spreadsheet => "spreadsheet",
        }
    }
}

/// A dataset plus how it was read
#[derive(Debug, Clone)]
pub struct LoadedFile {
    pub dataset: Dataset,
    /// Bare file name, used for filename-based classification
    pub file_name: String,
    pub reader: ReaderKind,
    pub encoding: Option<String>,
    pub sheet: Option<String>,
}

pub struct FileLoader {
    csv: CsvParser,
}

impl Default for FileLoader {
    fn default() -> Self {
        Self::new(CsvParser::default())
    }
}

impl FileLoader {
    pub fn new(csv: CsvParser) -> Self {
        Self { csv }
    }

    pub fn from_settings(settings: &CsvSettings) -> Result<Self> {
        let delimiter = u8::try_from(settings.delimiter)
            .ok()
            .filter(u8::is_ascii)
            .ok_or_else(|| {
                AppError::ConfigError(format!("Invalid CSV delimiter: {:?}", settings.delimiter))
            })?;
        let parser = CsvParser::new()
            .with_delimiter(delimiter)
            .with_delimiter_detection(settings.detect_delimiter)
            .with_encodings(&settings.primary_encoding, &settings.fallback_encoding)?;
        Ok(Self::new(parser))
    }

    /// Load a whole file into memory. Either the complete dataset or an error.
    pub fn load(&self, path: &Path, sheet: Option<&SheetSelector>) -> Result<LoadedFile> {
        let reader = ReaderKind::for_path(path)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        let loaded = match reader {
            ReaderKind::Csv => {
                let parsed = self.csv.parse_file(path)?;
                LoadedFile {
                    dataset: parsed.dataset,
                    file_name,
                    reader,
                    encoding: Some(parsed.encoding.to_string()),
                    sheet: None,
                }
            }
            ReaderKind::Spreadsheet => {
                let selector = sheet.cloned().unwrap_or(SheetSelector::First);
                let parsed = read_workbook(path, &selector)?;
                LoadedFile {
                    dataset: parsed.dataset,
                    file_name,
                    reader,
                    encoding: None,
                    sheet: Some(parsed.sheet),
                }
            }
        };

        info!(
            file = %path.display(),
            reader = loaded.reader.as_str(),
            encoding = loaded.encoding.as_deref().unwrap_or("-"),
            sheet = loaded.sheet.as_deref().unwrap_or("-"),
            rows = loaded.dataset.row_count(),
            columns = loaded.dataset.column_count(),
            "Loaded report file"
        );

        Ok(loaded)
    }

    /// Shape and per-column summary of a file without storing anything.
    pub fn inspect(&self, path: &Path, sheet: Option<&SheetSelector>) -> Result<FileProfile> {
        let loaded = self.load(path, sheet)?;
        let columns: Vec<ColumnProfile> = FileProfile::columns_of(&loaded.dataset);

        Ok(FileProfile {
            source: loaded.file_name,
            reader: loaded.reader.as_str().to_string(),
            encoding: loaded.encoding,
            sheet: loaded.sheet,
            row_count: loaded.dataset.row_count(),
            columns,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::dataset::{CellKind, CellValue};

    #[test]
    fn test_reader_kind_from_extension() {
        assert_eq!(ReaderKind::for_path(Path::new("a.CSV")).unwrap(), ReaderKind::Csv);
        assert_eq!(
            ReaderKind::for_path(Path::new("report.xlsx")).unwrap(),
            ReaderKind::Spreadsheet
        );
        assert!(ReaderKind::for_path(Path::new("report.pdf")).is_err());
        assert!(ReaderKind::for_path(Path::new("noext")).is_err());
    }

    #[test]
    fn test_load_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chemical_spend_march.csv");
        std::fs::write(&path, "Supplier,Total_Cost\nHawkins Inc,100.5\nUnivar,\n").unwrap();

        let loaded = FileLoader::default().load(&path, None).unwrap();
        assert_eq!(loaded.file_name, "chemical_spend_march.csv");
        assert_eq!(loaded.encoding.as_deref(), Some("UTF-8"));
        assert_eq!(loaded.dataset.row_count(), 2);
        assert_eq!(
            loaded.dataset.row(1).unwrap().get("Total_Cost"),
            Some(&CellValue::Null)
        );
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let err = FileLoader::default()
            .load(Path::new("/nonexistent/report.csv"), None)
            .unwrap_err();
        assert!(matches!(err, AppError::ReadError(_)));
    }

    #[test]
    fn test_inspect_profiles_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("regions.csv");
        std::fs::write(&path, "Region,Amount\nSouth,1\n,2\n").unwrap();

        let profile = FileLoader::default().inspect(&path, None).unwrap();
        assert_eq!(profile.row_count, 2);
        assert_eq!(profile.columns[0].null_count, 1);
        assert_eq!(profile.columns[1].kind, CellKind::Number);
    }

    #[test]
    fn test_from_settings_uses_delimiter() {
        let settings = CsvSettings {
            delimiter: ';',
            ..CsvSettings::default()
        };
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("semi.csv");
        std::fs::write(&path, "a;b\n1;2\n").unwrap();

        let loaded = FileLoader::from_settings(&settings).unwrap().load(&path, None).unwrap();
        assert_eq!(loaded.dataset.column_count(), 2);
    }
}
