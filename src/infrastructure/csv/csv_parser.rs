// ============================================================
// CSV PARSER
// ============================================================
// Parse CSV report exports into datasets, retrying with a fallback
// encoding when the primary one cannot decode or parse the file

use crate::domain::dataset::{CellValue, Dataset};
use crate::domain::error::{AppError, Result};
use csv::{ReaderBuilder, StringRecord, Trim};
use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, warn};

/// A parsed CSV file and the encoding that read it
#[derive(Debug, Clone)]
pub struct ParsedCsv {
    pub dataset: Dataset,
    pub encoding: &'static str,
    pub delimiter: u8,
}

/// CSV parser with encoding fallback
pub struct CsvParser {
    /// Delimiter character (default: comma)
    delimiter: u8,

    /// Pick the delimiter from the first lines instead of using `delimiter`
    detect_delimiter: bool,

    /// Maximum allowed record length in bytes
    max_record_length: usize,

    primary: &'static Encoding,
    fallback: &'static Encoding,
}

impl Default for CsvParser {
    fn default() -> Self {
        Self {
            delimiter: b',',
            detect_delimiter: false,
            max_record_length: 1024 * 1024, // 1MB
            primary: UTF_8,
            fallback: WINDOWS_1252,
        }
    }
}

impl CsvParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn with_delimiter_detection(mut self, detect: bool) -> Self {
        self.detect_delimiter = detect;
        self
    }

    /// Set primary and fallback encodings by WHATWG label ("utf-8", "latin1", ...)
    pub fn with_encodings(mut self, primary: &str, fallback: &str) -> Result<Self> {
        self.primary = encoding_for(primary)?;
        self.fallback = encoding_for(fallback)?;
        Ok(self)
    }

    /// Parse a CSV file: primary encoding first, then the fallback.
    pub fn parse_file(&self, path: &Path) -> Result<ParsedCsv> {
        let bytes = std::fs::read(path).map_err(|e| {
            AppError::ReadError(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let primary_err = match self.parse_bytes(&bytes, self.primary) {
            Ok(parsed) => return Ok(parsed),
            Err(e) => e,
        };

        warn!(
            file = %path.display(),
            encoding = self.primary.name(),
            error = %primary_err,
            "Primary encoding failed, retrying with fallback"
        );

        self.parse_bytes(&bytes, self.fallback).map_err(|fallback_err| {
            AppError::ReadError(format!(
                "Failed to read {} as {} ({}) or as {} ({})",
                path.display(),
                self.primary.name(),
                primary_err,
                self.fallback.name(),
                fallback_err
            ))
        })
    }

    fn parse_bytes(&self, bytes: &[u8], encoding: &'static Encoding) -> std::result::Result<ParsedCsv, String> {
        let content = decode(bytes, encoding)?;

        let delimiter = if self.detect_delimiter {
            let detected = Self::detect_delimiter(&content);
            debug!(delimiter = %(detected as char), "Detected CSV delimiter");
            detected
        } else {
            self.delimiter
        };

        let dataset = self
            .parse_content_with(&content, delimiter)
            .map_err(|e| e.to_string())?;

        Ok(ParsedCsv {
            dataset,
            encoding: encoding.name(),
            delimiter,
        })
    }

    /// Parse CSV content from string with the configured delimiter
    pub fn parse_content(&self, content: &str) -> Result<Dataset> {
        self.parse_content_with(content, self.delimiter)
    }

    fn parse_content_with(&self, content: &str, delimiter: u8) -> Result<Dataset> {
        let mut reader = ReaderBuilder::new()
            .delimiter(delimiter)
            .trim(Trim::All)
            .flexible(true) // short rows are padded below
            .from_reader(content.as_bytes());

        let headers = reader
            .headers()
            .map_err(|e| AppError::ReadError(format!("Failed to read CSV headers: {}", e)))?
            .clone();
        let columns = normalize_headers(headers.iter());
        if columns.is_empty() {
            return Err(AppError::ReadError("CSV file has no header row".to_string()));
        }

        let mut rows = Vec::new();
        for (index, result) in reader.records().enumerate() {
            let record = result.map_err(|e| {
                AppError::ReadError(format!("Failed to parse CSV row {}: {}", index + 1, e))
            })?;
            rows.push(self.parse_row(index, columns.len(), &record)?);
        }

        Dataset::new(columns, rows)
    }

    fn parse_row(&self, index: usize, width: usize, record: &StringRecord) -> Result<Vec<CellValue>> {
        if record.as_byte_record().as_slice().len() > self.max_record_length {
            return Err(AppError::ReadError(format!(
                "CSV row {} exceeds {} bytes",
                index + 1,
                self.max_record_length
            )));
        }
        if record.len() > width {
            return Err(AppError::ReadError(format!(
                "CSV row {} has {} fields, header has {}",
                index + 1,
                record.len(),
                width
            )));
        }

        let mut cells: Vec<CellValue> = record.iter().map(CellValue::from_raw).collect();
        cells.resize(width, CellValue::Null);
        Ok(cells)
    }

    /// Detect delimiter from content (comma, semicolon, tab, pipe)
    pub fn detect_delimiter(content: &str) -> u8 {
        let candidates = [b',', b';', b'\t', b'|'];

        let mut best_delimiter = b',';
        let mut best_score = 0.0f32;

        let sample_lines: Vec<_> = content.lines().take(10).collect();
        if sample_lines.is_empty() {
            return best_delimiter;
        }

        for &delimiter in &candidates {
            let field_counts: Vec<usize> = sample_lines
                .iter()
                .map(|line| line.bytes().filter(|&b| b == delimiter).count())
                .collect();

            // Score by consistency (low standard deviation) and frequency
            let avg = field_counts.iter().sum::<usize>() as f32 / field_counts.len() as f32;
            let variance = field_counts
                .iter()
                .map(|&x| (x as f32 - avg).powi(2))
                .sum::<f32>()
                / field_counts.len() as f32;

            let score = avg / (1.0 + variance.sqrt());

            if score > best_score {
                best_score = score;
                best_delimiter = delimiter;
            }
        }

        best_delimiter
    }
}

pub fn encoding_for(label: &str) -> Result<&'static Encoding> {
    Encoding::for_label(label.trim().as_bytes())
        .ok_or_else(|| AppError::ConfigError(format!("Unknown text encoding: {}", label)))
}

fn decode(bytes: &[u8], encoding: &'static Encoding) -> std::result::Result<String, String> {
    if encoding == UTF_8 {
        let body = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
        return std::str::from_utf8(body)
            .map(str::to_string)
            .map_err(|e| format!("invalid UTF-8: {}", e));
    }

    let (text, had_errors) = encoding.decode_without_bom_handling(bytes);
    if had_errors {
        return Err(format!("invalid {} byte sequence", encoding.name()));
    }
    Ok(text.into_owned())
}

/// Trim header names, name blank ones `Unnamed: {i}` and suffix duplicates `.1`, `.2`, ...
pub fn normalize_headers<'a>(headers: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut columns = Vec::new();

    for (idx, raw) in headers.into_iter().enumerate() {
        let trimmed = raw.trim();
        let base = if trimmed.is_empty() {
            format!("Unnamed: {}", idx)
        } else {
            trimmed.to_string()
        };

        let mut name = base.clone();
        let mut n = 1;
        while seen.contains(&name) {
            name = format!("{}.{}", base, n);
            n += 1;
        }
        seen.insert(name.clone());
        columns.push(name);
    }

    columns
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_simple_csv() {
        let content = "name,age,city\nAlice,30,NYC\nBob,25,LA";
        let parser = CsvParser::new();
        let ds = parser.parse_content(content).unwrap();

        assert_eq!(ds.row_count(), 2);
        assert_eq!(ds.column_count(), 3);
        let row = ds.row(0).unwrap();
        assert_eq!(row.get("name"), Some(&CellValue::text("Alice")));
        assert_eq!(row.get("age"), Some(&CellValue::Number(30.0)));
    }

    #[test]
    fn test_short_rows_padded_wide_rows_rejected() {
        let parser = CsvParser::new();
        let ds = parser.parse_content("a,b,c\n1,2\n").unwrap();
        assert_eq!(ds.row(0).unwrap().get("c"), Some(&CellValue::Null));

        assert!(parser.parse_content("a,b\n1,2,3\n").is_err());
    }

    #[test]
    fn test_headers_trimmed_named_and_deduplicated() {
        let ds = CsvParser::new()
            .parse_content(" Supplier ,,Amount,Amount\nx,y,1,2\n")
            .unwrap();
        assert_eq!(
            ds.columns(),
            &[
                "Supplier".to_string(),
                "Unnamed: 1".to_string(),
                "Amount".to_string(),
                "Amount.1".to_string()
            ]
        );
    }

    #[test]
    fn test_detect_delimiter() {
        assert_eq!(CsvParser::detect_delimiter("a,b,c\nd,e,f"), b',');
        assert_eq!(CsvParser::detect_delimiter("a;b;c\nd;e;f"), b';');
        assert_eq!(CsvParser::detect_delimiter("a\tb\nc\td"), b'\t');
    }

    #[test]
    fn test_falls_back_to_latin1() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        // "Café" in windows-1252
        file.write_all(b"Supplier,Total_Cost\nCaf\xE9 Supply,10\n").unwrap();

        let parsed = CsvParser::new().parse_file(file.path()).unwrap();
        assert_eq!(parsed.encoding, "windows-1252");
        assert_eq!(
            parsed.dataset.row(0).unwrap().get("Supplier"),
            Some(&CellValue::text("Café Supply"))
        );
    }

    #[test]
    fn test_utf8_bom_is_stripped() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"\xEF\xBB\xBFSupplier,Amount\nAcme,1\n").unwrap();

        let parsed = CsvParser::new().parse_file(file.path()).unwrap();
        assert_eq!(parsed.encoding, "UTF-8");
        assert!(parsed.dataset.has_column("Supplier"));
    }

    #[test]
    fn test_both_encodings_failing_reports_both() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"a,b\n1,2,3\n").unwrap();

        let err = CsvParser::new().parse_file(file.path()).unwrap_err();
        match err {
            AppError::ReadError(msg) => {
                assert!(msg.contains("UTF-8"));
                assert!(msg.contains("windows-1252"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
