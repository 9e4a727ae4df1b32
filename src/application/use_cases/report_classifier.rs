// ============================================================
// REPORT CLASSIFIER USE CASE
// ============================================================
// Match a dataset against ordered report signatures

use tracing::{debug, warn};

use crate::domain::dataset::Dataset;
use crate::domain::report::{Classification, MatchKind, ReportSignature, ReportType};

/// Ordered set of signatures. Earlier signatures win.
#[derive(Debug, Clone, Default)]
pub struct SignatureRegistry {
    signatures: Vec<ReportSignature>,
}

impl SignatureRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The signatures for every known report layout, Chemical Spend first.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(
            ReportSignature::new("chemical_spend_netsuite", ReportType::ChemicalSpendBySupplier)
                .with_columns(&["Vendor Name", "Bill #", "Description", "Amount"])
                .with_filename_patterns(&[
                    "chemical_spend",
                    "chem_spend",
                    "chemsupplier",
                    "chemical-supplier",
                    "chemical spend",
                ]),
        );
        registry.register(
            ReportSignature::new("chemical_spend_canonical", ReportType::ChemicalSpendBySupplier)
                .with_columns(&["Supplier", "Chemical", "Total_Cost"]),
        );
        registry.register(
            ReportSignature::new("non_po_invoice", ReportType::NonPoInvoice)
                .with_columns(&["Invoice: Number", "Supplier: Name", "Net Amount"])
                .with_filename_patterns(&["non_po", "non-po", "nonpo"]),
        );
        registry.register(
            ReportSignature::new("po_line_detail", ReportType::PoLineDetail)
                .with_columns(&[
                    "Order Identifier",
                    "Purchase Order: Supplier",
                    "Item Description",
                    "Confirmed Unit Price",
                ])
                .with_filename_patterns(&["po_line_detail", "po line detail", "po-line-detail"]),
        );
        registry
    }

    pub fn register(&mut self, signature: ReportSignature) {
        self.signatures.push(signature);
    }

    pub fn register_first(&mut self, signature: ReportSignature) {
        self.signatures.insert(0, signature);
    }

    /// Move every signature of `report_type` ahead of the others, keeping relative order.
    pub fn prioritize(&mut self, report_type: ReportType) {
        let (mut front, back): (Vec<_>, Vec<_>) = self
            .signatures
            .drain(..)
            .partition(|s| s.report_type == report_type);
        front.extend(back);
        self.signatures = front;
    }

    pub fn signatures(&self) -> &[ReportSignature] {
        &self.signatures
    }
}

/// A signature that matched, with how it matched
#[derive(Debug, Clone)]
pub struct SignatureMatch<'a> {
    pub signature: &'a ReportSignature,
    pub matched_by: MatchKind,
}

pub struct ReportClassifier {
    registry: SignatureRegistry,
}

impl Default for ReportClassifier {
    fn default() -> Self {
        Self::new(SignatureRegistry::builtin())
    }
}

impl ReportClassifier {
    pub fn new(registry: SignatureRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &SignatureRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut SignatureRegistry {
        &mut self.registry
    }

    /// Every matching signature in evaluation order.
    pub fn matches<'a>(&'a self, dataset: &Dataset, filename: &str) -> Vec<SignatureMatch<'a>> {
        self.registry
            .signatures()
            .iter()
            .filter_map(|signature| match signature.evaluate(dataset, filename) {
                MatchKind::None => None,
                matched_by => Some(SignatureMatch {
                    signature,
                    matched_by,
                }),
            })
            .collect()
    }

    /// First matching signature wins; no match is `Unknown`, never an error.
    pub fn classify(&self, dataset: &Dataset, filename: &str) -> Classification {
        let matches = self.matches(dataset, filename);

        let Some(winner) = matches.first() else {
            debug!(file = filename, "No report signature matched");
            return Classification::unknown();
        };

        let competing: Vec<&str> = matches
            .iter()
            .map(|m| m.signature.report_type)
            .filter(|t| *t != winner.signature.report_type)
            .map(|t| t.slug())
            .collect();
        if !competing.is_empty() {
            warn!(
                file = filename,
                chosen = winner.signature.report_type.slug(),
                competing = ?competing,
                "Several report types match, using the first registered"
            );
        }

        debug!(
            file = filename,
            signature = %winner.signature.name,
            matched_by = ?winner.matched_by,
            "Report classified"
        );

        Classification {
            report_type: winner.signature.report_type,
            signature: Some(winner.signature.name.clone()),
            matched_by: winner.matched_by,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns(names: &[&str]) -> Dataset {
        Dataset::empty(names.iter().map(|n| n.to_string()).collect()).unwrap()
    }

    #[test]
    fn test_classifies_with_extra_columns() {
        let ds = columns(&[
            "Invoice: Number",
            "Supplier: Name",
            "Net Amount",
            "Dimension4 Description",
        ]);
        let c = ReportClassifier::default().classify(&ds, "export.csv");
        assert_eq!(c.report_type, ReportType::NonPoInvoice);
        assert_eq!(c.matched_by, MatchKind::Columns);
        assert!(c.is_known());
    }

    #[test]
    fn test_column_names_trimmed_and_case_insensitive() {
        let ds = columns(&[
            " order identifier",
            "PURCHASE ORDER: SUPPLIER",
            "Item Description ",
            "Confirmed Unit Price",
        ]);
        let c = ReportClassifier::default().classify(&ds, "");
        assert_eq!(c.report_type, ReportType::PoLineDetail);
    }

    #[test]
    fn test_filename_match() {
        let ds = columns(&["Anything"]);
        let c = ReportClassifier::default().classify(&ds, "March_NON-PO_export.xlsx");
        assert_eq!(c.report_type, ReportType::NonPoInvoice);
        assert_eq!(c.matched_by, MatchKind::Filename);
        assert_eq!(c.signature.as_deref(), Some("non_po_invoice"));
    }

    #[test]
    fn test_unknown_when_nothing_matches() {
        let ds = columns(&["Date", "Amount"]);
        let c = ReportClassifier::default().classify(&ds, "weekly.csv");
        assert_eq!(c, Classification::unknown());
        assert!(!c.is_known());
    }

    #[test]
    fn test_canonical_chemical_spend_columns() {
        let ds = columns(&["Date Created", "Supplier", "Chemical", "Total_Cost"]);
        let c = ReportClassifier::default().classify(&ds, "upload.csv");
        assert_eq!(c.report_type, ReportType::ChemicalSpendBySupplier);
    }

    #[test]
    fn test_netsuite_chemical_spend_columns() {
        let ds = columns(&["Date Created", "Vendor Name", "Bill #", "Description", "Amount", "Memo"]);
        let c = ReportClassifier::default().classify(&ds, "export.csv");
        assert_eq!(c.report_type, ReportType::ChemicalSpendBySupplier);
        assert_eq!(c.matched_by, MatchKind::Columns);
        assert_eq!(c.signature.as_deref(), Some("chemical_spend_netsuite"));
    }

    #[test]
    fn test_chemical_spend_variant_matched_by_filename() {
        let ds = columns(&["Vendor", "Item Description", "Cost"]);
        let c = ReportClassifier::default().classify(&ds, "chemical_spend_march.csv");
        assert_eq!(c.report_type, ReportType::ChemicalSpendBySupplier);
        assert_eq!(c.matched_by, MatchKind::Filename);
    }

    #[test]
    fn test_registration_order_breaks_ties() {
        // columns say Non-PO, file name says chemical spend
        let ds = columns(&["Invoice: Number", "Supplier: Name", "Net Amount"]);
        let mut classifier = ReportClassifier::default();

        let c = classifier.classify(&ds, "chemical_spend_q1.csv");
        assert_eq!(c.report_type, ReportType::ChemicalSpendBySupplier);
        assert_eq!(classifier.matches(&ds, "chemical_spend_q1.csv").len(), 2);

        classifier.registry_mut().prioritize(ReportType::NonPoInvoice);
        let c = classifier.classify(&ds, "chemical_spend_q1.csv");
        assert_eq!(c.report_type, ReportType::NonPoInvoice);
    }

    #[test]
    fn test_register_first() {
        let mut registry = SignatureRegistry::builtin();
        registry.register_first(
            ReportSignature::new("custom", ReportType::PoLineDetail).with_columns(&["Supplier"]),
        );
        let classifier = ReportClassifier::new(registry);
        let ds = columns(&["Supplier", "Chemical", "Total_Cost"]);
        assert_eq!(
            classifier.classify(&ds, "").signature.as_deref(),
            Some("custom")
        );
    }
}
