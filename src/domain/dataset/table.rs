// ============================================================
// DATASET TABLE
// ============================================================
// Ordered columns plus ordered rows of cells

use super::CellValue;
use crate::domain::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// An immutable table loaded from exactly one source file.
///
/// Every row has exactly one cell per column. Transforms consume the
/// dataset and return a new one; nothing mutates a dataset in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "DatasetParts")]
pub struct Dataset {
    columns: Vec<String>,
    rows: Vec<Vec<CellValue>>,
}

#[derive(Deserialize)]
struct DatasetParts {
    columns: Vec<String>,
    rows: Vec<Vec<CellValue>>,
}

impl TryFrom<DatasetParts> for Dataset {
    type Error = AppError;

    fn try_from(parts: DatasetParts) -> Result<Self> {
        Dataset::new(parts.columns, parts.rows)
    }
}

/// Borrowed view of one row as a column-name to value mapping
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    columns: &'a [String],
    values: &'a [CellValue],
}

impl<'a> Row<'a> {
    pub fn get(&self, column: &str) -> Option<&'a CellValue> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|idx| &self.values[idx])
    }

    pub fn values(&self) -> &'a [CellValue] {
        self.values
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'a str, &'a CellValue)> + 'a {
        let columns = self.columns;
        let values = self.values;
        columns.iter().map(String::as_str).zip(values.iter())
    }
}

impl Dataset {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<CellValue>>) -> Result<Self> {
        let mut seen = HashSet::new();
        for column in &columns {
            if column.trim().is_empty() {
                return Err(AppError::ValidationError(
                    "Column names must not be empty".to_string(),
                ));
            }
            if !seen.insert(column.as_str()) {
                return Err(AppError::ValidationError(format!(
                    "Duplicate column name: {}",
                    column
                )));
            }
        }

        for (idx, row) in rows.iter().enumerate() {
            if row.len() != columns.len() {
                return Err(AppError::ValidationError(format!(
                    "Row {} has {} cells, expected {}",
                    idx + 1,
                    row.len(),
                    columns.len()
                )));
            }
        }

        Ok(Self { columns, rows })
    }

    pub fn empty(columns: Vec<String>) -> Result<Self> {
        Self::new(columns, Vec::new())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Case-insensitive, whitespace-trimmed column lookup.
    pub fn find_column(&self, name: &str) -> Option<&str> {
        let wanted = name.trim().to_lowercase();
        self.columns
            .iter()
            .find(|c| c.trim().to_lowercase() == wanted)
            .map(String::as_str)
    }

    pub fn row(&self, idx: usize) -> Option<Row<'_>> {
        self.rows.get(idx).map(|values| Row {
            columns: &self.columns,
            values,
        })
    }

    pub fn rows(&self) -> impl Iterator<Item = Row<'_>> {
        self.rows.iter().map(move |values| Row {
            columns: &self.columns,
            values,
        })
    }

    pub fn column_values(&self, name: &str) -> Option<impl Iterator<Item = &CellValue>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(move |row| &row[idx]))
    }

    /// Columns whose every cell is null. An empty dataset has none.
    pub fn blank_columns(&self) -> Vec<String> {
        if self.rows.is_empty() {
            return Vec::new();
        }

        self.columns
            .iter()
            .enumerate()
            .filter(|(idx, _)| self.rows.iter().all(|row| row[*idx].is_null()))
            .map(|(_, name)| name.clone())
            .collect()
    }

    pub fn rename_column(mut self, from: &str, to: &str) -> Result<Self> {
        let idx = self
            .column_index(from)
            .ok_or_else(|| AppError::ValidationError(format!("Unknown column: {}", from)))?;

        if from != to && self.has_column(to) {
            return Err(AppError::ValidationError(format!(
                "Cannot rename {} to {}: column already exists",
                from, to
            )));
        }

        self.columns[idx] = to.to_string();
        Ok(self)
    }

    /// Remove a column wherever it sits. Missing columns are ignored.
    pub fn drop_column(mut self, name: &str) -> Self {
        if let Some(idx) = self.column_index(name) {
            self.columns.remove(idx);
            for row in &mut self.rows {
                row.remove(idx);
            }
        }
        self
    }

    pub fn with_column(mut self, name: &str, values: Vec<CellValue>) -> Result<Self> {
        if self.has_column(name) {
            return Err(AppError::ValidationError(format!(
                "Column already exists: {}",
                name
            )));
        }
        if values.len() != self.rows.len() {
            return Err(AppError::ValidationError(format!(
                "Column {} has {} values, expected {}",
                name,
                values.len(),
                self.rows.len()
            )));
        }

        self.columns.push(name.to_string());
        for (row, value) in self.rows.iter_mut().zip(values) {
            row.push(value);
        }
        Ok(self)
    }

    /// Replace every cell of `name` with `f(cell)`. Missing columns are ignored.
    pub fn map_column(mut self, name: &str, f: impl Fn(&CellValue) -> CellValue) -> Self {
        if let Some(idx) = self.column_index(name) {
            for row in &mut self.rows {
                row[idx] = f(&row[idx]);
            }
        }
        self
    }

    pub fn head(&self, n: usize) -> Self {
        Self {
            columns: self.columns.clone(),
            rows: self.rows.iter().take(n).cloned().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Dataset {
        Dataset::new(
            vec!["Supplier".into(), "Amount".into(), "Notes".into()],
            vec![
                vec![CellValue::text("Acme"), CellValue::Number(10.0), CellValue::Null],
                vec![CellValue::text("Brenntag"), CellValue::Number(5.5), CellValue::Null],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_rejects_ragged_rows() {
        let result = Dataset::new(
            vec!["a".into(), "b".into()],
            vec![vec![CellValue::Null]],
        );
        assert!(matches!(result, Err(AppError::ValidationError(_))));
    }

    #[test]
    fn test_rejects_duplicate_columns() {
        let result = Dataset::empty(vec!["a".into(), "a".into()]);
        assert!(result.is_err());
    }

    #[test]
    fn test_row_view_maps_names_to_values() {
        let ds = sample();
        let row = ds.row(1).unwrap();
        assert_eq!(row.get("Supplier"), Some(&CellValue::text("Brenntag")));
        assert_eq!(row.get("Missing"), None);
        assert_eq!(row.iter().count(), 3);
    }

    #[test]
    fn test_drop_column_keeps_rows() {
        let ds = sample().drop_column("Amount");
        assert_eq!(ds.columns(), &["Supplier".to_string(), "Notes".to_string()]);
        assert_eq!(ds.row_count(), 2);
        assert_eq!(ds.row(0).unwrap().values().len(), 2);

        let unchanged = ds.clone().drop_column("Nope");
        assert_eq!(unchanged, ds);
    }

    #[test]
    fn test_rename_refuses_existing_target() {
        let result = sample().rename_column("Amount", "Supplier");
        assert!(result.is_err());

        let renamed = sample().rename_column("Amount", "Total_Cost").unwrap();
        assert!(renamed.has_column("Total_Cost"));
        assert!(!renamed.has_column("Amount"));
    }

    #[test]
    fn test_blank_columns() {
        assert_eq!(sample().blank_columns(), vec!["Notes".to_string()]);
        let empty = Dataset::empty(vec!["x".into()]).unwrap();
        assert!(empty.blank_columns().is_empty());
    }

    #[test]
    fn test_find_column_ignores_case_and_padding() {
        let ds = sample();
        assert_eq!(ds.find_column(" supplier "), Some("Supplier"));
        assert_eq!(ds.find_column("vendor"), None);
    }

    #[test]
    fn test_deserialize_validates_shape() {
        let bad = r#"{"columns":["a","b"],"rows":[[1]]}"#;
        assert!(serde_json::from_str::<Dataset>(bad).is_err());

        let json = serde_json::to_string(&sample()).unwrap();
        let back: Dataset = serde_json::from_str(&json).unwrap();
        assert_eq!(back, sample());
    }
}
