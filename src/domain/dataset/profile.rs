// ============================================================
// DATASET PROFILE
// ============================================================
// Column inspection results for a loaded report file

use super::{CellKind, CellValue, Dataset};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Per-column statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnProfile {
    pub name: String,
    pub null_count: usize,
    /// Most common non-null kind, `Null` when the column is blank
    pub kind: CellKind,
    /// First non-null value, rendered as text
    pub sample: Option<String>,
}

/// Shape and column summary of one loaded file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileProfile {
    pub source: String,
    pub reader: String,
    pub encoding: Option<String>,
    pub sheet: Option<String>,
    pub row_count: usize,
    pub columns: Vec<ColumnProfile>,
}

/// One distinct value of a column and how often it occurs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueCount {
    pub value: String,
    pub count: usize,
}

impl ColumnProfile {
    pub fn from_values<'a>(name: &str, values: impl Iterator<Item = &'a CellValue>) -> Self {
        let mut null_count = 0;
        let mut numbers = 0;
        let mut texts = 0;
        let mut sample = None;

        for value in values {
            match value.kind() {
                CellKind::Null => null_count += 1,
                CellKind::Number => numbers += 1,
                CellKind::Text => texts += 1,
            }
            if sample.is_none() && !value.is_null() {
                sample = Some(value.to_string());
            }
        }

        let kind = if numbers == 0 && texts == 0 {
            CellKind::Null
        } else if numbers >= texts {
            CellKind::Number
        } else {
            CellKind::Text
        };

        Self {
            name: name.to_string(),
            null_count,
            kind,
            sample,
        }
    }
}

impl FileProfile {
    pub fn columns_of(dataset: &Dataset) -> Vec<ColumnProfile> {
        dataset
            .columns()
            .iter()
            .filter_map(|name| {
                dataset
                    .column_values(name)
                    .map(|values| ColumnProfile::from_values(name, values))
            })
            .collect()
    }
}

/// Distinct values of a column, most frequent first (ties by value).
/// Nulls are reported as an empty string.
pub fn distinct_values(dataset: &Dataset, column: &str) -> Option<Vec<ValueCount>> {
    let values = dataset.column_values(column)?;

    let mut counts: HashMap<String, usize> = HashMap::new();
    for value in values {
        *counts.entry(value.to_string()).or_insert(0) += 1;
    }

    let mut out: Vec<ValueCount> = counts
        .into_iter()
        .map(|(value, count)| ValueCount { value, count })
        .collect();
    out.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.value.cmp(&b.value)));
    Some(out)
}
