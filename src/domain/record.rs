use crate::domain::report::ReportType;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Metadata row describing one stored dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetRecord {
    pub id: String,
    pub name: String,
    /// File name of the stored document inside the datasets directory
    pub filename: String,
    pub original_filename: String,
    pub report_type: ReportType,
    pub uploaded_at: chrono::DateTime<chrono::Utc>,
    pub record_count: usize,
    pub column_count: usize,
    /// Document location relative to the data directory, e.g. `datasets/<id>.json`.
    /// Informational only: the store always resolves documents from its own layout.
    pub storage_path: String,
    /// SHA-256 of the stored document, hex encoded
    pub checksum: String,
    pub description: Option<String>,
}

/// Caller-supplied metadata for a dataset about to be saved
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewDatasetRecord {
    #[validate(length(min = 1, max = 256))]
    pub name: String,
    #[validate(length(min = 1, max = 512))]
    pub original_filename: String,
    pub report_type: ReportType,
    #[validate(length(max = 4096))]
    pub description: Option<String>,
}

impl NewDatasetRecord {
    pub fn new(name: impl Into<String>, original_filename: impl Into<String>, report_type: ReportType) -> Self {
        Self {
            name: name.into(),
            original_filename: original_filename.into(),
            report_type,
            description: None,
        }
    }

    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description.filter(|d| !d.trim().is_empty());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_record_requires_original_filename() {
        let meta = NewDatasetRecord::new("March", "", ReportType::Unknown);
        assert!(meta.validate().is_err());

        let meta = NewDatasetRecord::new("March", "march.csv", ReportType::Unknown);
        assert!(meta.validate().is_ok());
    }

    #[test]
    fn test_blank_description_is_dropped() {
        let meta = NewDatasetRecord::new("a", "a.csv", ReportType::Unknown)
            .with_description(Some("   ".into()));
        assert!(meta.description.is_none());
    }
}
