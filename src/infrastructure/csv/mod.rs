// ============================================================
// CSV INFRASTRUCTURE LAYER
// ============================================================
// CSV parsing with encoding fallback and delimiter detection

mod csv_parser;

pub use csv_parser::{encoding_for, normalize_headers, CsvParser, ParsedCsv};
