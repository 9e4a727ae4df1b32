use crate::domain::dataset::Dataset;
use crate::domain::error::AppError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Known procurement report layouts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportType {
    PoLineDetail,
    NonPoInvoice,
    ChemicalSpendBySupplier,
    Unknown,
}

impl ReportType {
    pub const KNOWN: [ReportType; 3] = [
        ReportType::PoLineDetail,
        ReportType::NonPoInvoice,
        ReportType::ChemicalSpendBySupplier,
    ];

    pub fn slug(&self) -> &'static str {
        match self {
            ReportType::PoLineDetail => "po_line_detail",
            ReportType::NonPoInvoice => "non_po_invoice",
            ReportType::ChemicalSpendBySupplier => "chemical_spend_by_supplier",
            ReportType::Unknown => "unknown",
        }
    }

    /// Human-readable label, also the value stored in the metadata table
    pub fn label(&self) -> &'static str {
        match self {
            ReportType::PoLineDetail => "PO Line Detail",
            ReportType::NonPoInvoice => "Non-PO Invoice Chemical GL",
            ReportType::ChemicalSpendBySupplier => "Chemical Spend by Supplier",
            ReportType::Unknown => "Unknown",
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, ReportType::Unknown)
    }
}

impl fmt::Display for ReportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for ReportType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        [
            ReportType::PoLineDetail,
            ReportType::NonPoInvoice,
            ReportType::ChemicalSpendBySupplier,
            ReportType::Unknown,
        ]
        .into_iter()
        .find(|t| t.slug() == wanted || t.label().to_lowercase() == wanted)
        .ok_or_else(|| {
            AppError::ValidationError(format!(
                "Invalid report type: {}. Expected one of: po_line_detail, non_po_invoice, chemical_spend_by_supplier, unknown",
                s
            ))
        })
    }
}

/// How a signature matched a dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchKind {
    Columns,
    Filename,
    ColumnsAndFilename,
    None,
}

/// Static rule identifying a report type from its columns and/or file name
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportSignature {
    pub name: String,
    pub report_type: ReportType,
    pub required_columns: Vec<String>,
    /// Lowercase substrings looked for in the lowercased file name
    pub filename_patterns: Vec<String>,
}

impl ReportSignature {
    pub fn new(name: &str, report_type: ReportType) -> Self {
        Self {
            name: name.to_string(),
            report_type,
            required_columns: Vec::new(),
            filename_patterns: Vec::new(),
        }
    }

    pub fn with_columns(mut self, columns: &[&str]) -> Self {
        self.required_columns = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn with_filename_patterns(mut self, patterns: &[&str]) -> Self {
        self.filename_patterns = patterns.iter().map(|p| p.to_lowercase()).collect();
        self
    }

    /// Column set of `dataset` is a superset of the required columns.
    /// A signature without required columns never matches on columns.
    pub fn matches_columns(&self, dataset: &Dataset) -> bool {
        !self.required_columns.is_empty()
            && self
                .required_columns
                .iter()
                .all(|required| dataset.find_column(required).is_some())
    }

    pub fn matches_filename(&self, filename: &str) -> bool {
        if filename.trim().is_empty() {
            return false;
        }
        let lower = filename.to_lowercase();
        self.filename_patterns
            .iter()
            .any(|pattern| lower.contains(pattern.as_str()))
    }

    pub fn evaluate(&self, dataset: &Dataset, filename: &str) -> MatchKind {
        match (self.matches_columns(dataset), self.matches_filename(filename)) {
            (true, true) => MatchKind::ColumnsAndFilename,
            (true, false) => MatchKind::Columns,
            (false, true) => MatchKind::Filename,
            (false, false) => MatchKind::None,
        }
    }
}

/// Outcome of evaluating a dataset against the signature registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub report_type: ReportType,
    /// Name of the winning signature, `None` when unknown or forced
    pub signature: Option<String>,
    pub matched_by: MatchKind,
}

impl Classification {
    pub fn unknown() -> Self {
        Self {
            report_type: ReportType::Unknown,
            signature: None,
            matched_by: MatchKind::None,
        }
    }

    /// Classification chosen by the caller instead of the registry
    pub fn forced(report_type: ReportType) -> Self {
        Self {
            report_type,
            signature: None,
            matched_by: MatchKind::None,
        }
    }

    pub fn is_known(&self) -> bool {
        self.report_type.is_known()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::dataset::CellValue;

    #[test]
    fn test_report_type_parses_slug_and_label() {
        assert_eq!(
            "chemical_spend_by_supplier".parse::<ReportType>().unwrap(),
            ReportType::ChemicalSpendBySupplier
        );
        assert_eq!(
            "PO Line Detail".parse::<ReportType>().unwrap(),
            ReportType::PoLineDetail
        );
        assert!("weekly".parse::<ReportType>().is_err());
    }

    #[test]
    fn test_signature_needs_every_required_column() {
        let sig = ReportSignature::new("test", ReportType::NonPoInvoice)
            .with_columns(&["Invoice: Number", "Net Amount"]);
        let full = Dataset::empty(vec![
            "invoice: number".into(),
            "Net Amount".into(),
            "Extra".into(),
        ])
        .unwrap();
        let partial = Dataset::empty(vec!["Net Amount".into()]).unwrap();

        assert!(sig.matches_columns(&full));
        assert!(!sig.matches_columns(&partial));
    }

    #[test]
    fn test_signature_without_columns_never_matches_on_columns() {
        let sig = ReportSignature::new("names only", ReportType::PoLineDetail)
            .with_filename_patterns(&["PO_Line"]);
        let ds = Dataset::new(vec!["a".into()], vec![vec![CellValue::Null]]).unwrap();

        assert!(!sig.matches_columns(&ds));
        assert_eq!(sig.evaluate(&ds, "march_po_line_export.csv"), MatchKind::Filename);
        assert_eq!(sig.evaluate(&ds, ""), MatchKind::None);
    }
}
