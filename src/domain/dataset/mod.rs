// ============================================================
// DATASET DOMAIN LAYER
// ============================================================
// Tabular values loaded from one report file
// No I/O, no async

mod cell_value;
mod profile;
mod table;

pub use cell_value::{CellKind, CellValue};
pub use profile::{distinct_values, ColumnProfile, FileProfile, ValueCount};
pub use table::{Dataset, Row};
