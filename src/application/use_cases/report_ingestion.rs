// ============================================================
// REPORT INGESTION USE CASE
// ============================================================
// Load -> classify -> normalize -> save, for one input file

use std::path::Path;
use std::sync::Arc;

use chrono::Local;
use serde::Serialize;
use tracing::{info, warn};

use crate::application::use_cases::dataset_store::DatasetStore;
use crate::application::use_cases::file_loader::FileLoader;
use crate::application::use_cases::report_classifier::ReportClassifier;
use crate::application::use_cases::report_normalizer::{NormalizationReport, ReportNormalizer};
use crate::domain::error::Result;
use crate::domain::record::{DatasetRecord, NewDatasetRecord};
use crate::domain::report::{Classification, ReportType};
use crate::infrastructure::spreadsheet::SheetSelector;

/// Caller choices for one ingest
#[derive(Debug, Clone, Default)]
pub struct IngestRequest {
    pub display_name: Option<String>,
    pub description: Option<String>,
    /// Skip classification and treat the file as this type
    pub forced_type: Option<ReportType>,
    pub sheet: Option<SheetSelector>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestOutcome {
    pub record: DatasetRecord,
    pub classification: Classification,
    pub report: NormalizationReport,
    /// Ids of older datasets of the same type removed after this one was saved
    pub replaced: Vec<String>,
}

pub struct ReportIngestion {
    loader: Arc<FileLoader>,
    classifier: Arc<ReportClassifier>,
    normalizer: Arc<ReportNormalizer>,
    store: Arc<DatasetStore>,
    replace_previous: Vec<ReportType>,
}

impl ReportIngestion {
    pub fn new(
        loader: Arc<FileLoader>,
        classifier: Arc<ReportClassifier>,
        normalizer: Arc<ReportNormalizer>,
        store: Arc<DatasetStore>,
    ) -> Self {
        Self {
            loader,
            classifier,
            normalizer,
            store,
            replace_previous: Vec::new(),
        }
    }

    /// Report types whose older datasets are removed when a new one is ingested.
    pub fn with_replace_previous(mut self, types: Vec<ReportType>) -> Self {
        self.replace_previous = types;
        self
    }

    pub fn loader(&self) -> &FileLoader {
        &self.loader
    }

    pub fn classifier(&self) -> &ReportClassifier {
        &self.classifier
    }

    pub fn normalizer(&self) -> &ReportNormalizer {
        &self.normalizer
    }

    pub fn store(&self) -> &Arc<DatasetStore> {
        &self.store
    }

    /// Ingest one file. Any failure before the save leaves the store untouched.
    pub async fn ingest(&self, path: &Path, request: IngestRequest) -> Result<IngestOutcome> {
        let loaded = self.loader.load(path, request.sheet.as_ref())?;

        let classification = match request.forced_type {
            Some(report_type) => Classification::forced(report_type),
            None => self.classifier.classify(&loaded.dataset, &loaded.file_name),
        };
        let report_type = classification.report_type;

        let normalized = self.normalizer.normalize(loaded.dataset, report_type)?;

        let name = request
            .display_name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| default_display_name(path, report_type));
        let metadata =
            NewDatasetRecord::new(name, loaded.file_name, report_type).with_description(request.description);

        let record = self.store.save(&normalized.dataset, metadata).await?;

        let replaced = if report_type.is_known() && self.replace_previous.contains(&report_type) {
            match self.store.delete_by_type(report_type, Some(&record.id)).await {
                Ok(ids) => ids,
                Err(e) => {
                    warn!(
                        id = %record.id,
                        report_type = report_type.slug(),
                        error = %e,
                        "Saved new dataset but failed to remove older ones"
                    );
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        info!(
            id = %record.id,
            report_type = report_type.slug(),
            rows = record.record_count,
            replaced = replaced.len(),
            "Report ingested"
        );

        Ok(IngestOutcome {
            record,
            classification,
            report: normalized.report,
            replaced,
        })
    }
}

/// `"<file stem> (<YYYYMMDD>) - <label>"`
pub fn default_display_name(path: &Path, report_type: ReportType) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "report".to_string());
    format!(
        "{} ({}) - {}",
        stem,
        Local::now().format("%Y%m%d"),
        report_type.label()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::dataset::CellValue;
    use crate::domain::error::AppError;
    use tempfile::TempDir;

    async fn pipeline(dir: &TempDir) -> ReportIngestion {
        let store = DatasetStore::open(&dir.path().join("data"), "reports.db")
            .await
            .unwrap();
        ReportIngestion::new(
            Arc::new(FileLoader::default()),
            Arc::new(ReportClassifier::default()),
            Arc::new(ReportNormalizer::default()),
            Arc::new(store),
        )
    }

    fn write(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[tokio::test]
    async fn test_canonical_chemical_spend_scenario() {
        let dir = tempfile::tempdir().unwrap();
        let ingestion = pipeline(&dir).await;
        let path = write(
            &dir,
            "upload.csv",
            "Date Created,Supplier,Chemical,Total_Cost\n\
             2024-03-01,Hawkins Inc,Sodium Hypochlorite,100.50\n\
             2024-03-02,Univar,Ferric Chloride,\"(25.00)\"\n\
             2024-03-03,Brenntag,Caustic Soda,\n",
        );

        let outcome = ingestion.ingest(&path, IngestRequest::default()).await.unwrap();
        assert_eq!(
            outcome.classification.report_type,
            ReportType::ChemicalSpendBySupplier
        );
        assert_eq!(outcome.record.record_count, 3);
        assert_eq!(outcome.report.dropped, vec!["Date Created".to_string()]);

        let (dataset, record) = ingestion.store().get(&outcome.record.id).await.unwrap().unwrap();
        assert!(!dataset.has_column("Date Created"));
        assert_eq!(dataset.row_count(), 3);
        assert_eq!(record.original_filename, "upload.csv");
        assert!(record.name.starts_with("upload ("));
        assert!(record.name.ends_with(") - Chemical Spend by Supplier"));
    }

    #[tokio::test]
    async fn test_chemical_spend_variant_columns_ingested() {
        let dir = tempfile::tempdir().unwrap();
        let ingestion = pipeline(&dir).await;
        let path = write(
            &dir,
            "chemical_spend_march.csv",
            "Vendor,Item Description,Cost\n\
             Hawkins Inc,Chemical - Sodium Hypochlorite - 12.5%,\"$1,250.00\"\n\
             Univar,caustic soda,80\n",
        );

        let outcome = ingestion.ingest(&path, IngestRequest::default()).await.unwrap();
        assert_eq!(
            outcome.classification.report_type,
            ReportType::ChemicalSpendBySupplier
        );

        let (dataset, _) = ingestion.store().get(&outcome.record.id).await.unwrap().unwrap();
        let first = dataset.row(0).unwrap();
        assert_eq!(first.get("Supplier"), Some(&CellValue::text("Hawkins Inc")));
        assert_eq!(first.get("Total_Cost"), Some(&CellValue::Number(1250.0)));
        assert_eq!(first.get("Chemical"), Some(&CellValue::text("Sodium Hypochlorite")));

        let again = ingestion
            .normalizer()
            .normalize(dataset.clone(), ReportType::ChemicalSpendBySupplier)
            .unwrap();
        assert_eq!(again.dataset, dataset);
    }

    #[tokio::test]
    async fn test_unknown_report_saved_unnormalized() {
        let dir = tempfile::tempdir().unwrap();
        let ingestion = pipeline(&dir).await;
        let path = write(&dir, "weekly.csv", "Date Created,Amount\n2024-01-01,5\n");

        let outcome = ingestion.ingest(&path, IngestRequest::default()).await.unwrap();
        assert_eq!(outcome.record.report_type, ReportType::Unknown);
        assert!(outcome.report.is_noop());

        let (dataset, _) = ingestion.store().get(&outcome.record.id).await.unwrap().unwrap();
        assert_eq!(dataset.columns(), &["Date Created".to_string(), "Amount".to_string()]);
    }

    #[tokio::test]
    async fn test_forced_type_missing_columns_stores_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let ingestion = pipeline(&dir).await;
        let path = write(&dir, "weekly.csv", "Amount\n5\n");

        let request = IngestRequest {
            forced_type: Some(ReportType::PoLineDetail),
            ..IngestRequest::default()
        };
        let err = ingestion.ingest(&path, request).await.unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
        assert!(ingestion.store().list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unreadable_file_leaves_store_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let ingestion = pipeline(&dir).await;
        let good = write(&dir, "a.csv", "Supplier,Chemical,Total_Cost\nX,Y,1\n");
        ingestion.ingest(&good, IngestRequest::default()).await.unwrap();

        let bad = write(&dir, "broken.xlsx", "not a workbook");
        let err = ingestion.ingest(&bad, IngestRequest::default()).await.unwrap_err();
        assert!(matches!(err, AppError::ReadError(_)));
        assert_eq!(ingestion.store().list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_workbook_sheet_selection() {
        let dir = tempfile::tempdir().unwrap();
        let ingestion = pipeline(&dir).await;

        let path = dir.path().join("q1.xlsx");
        let mut workbook = rust_xlsxwriter::Workbook::new();
        let cover = workbook.add_worksheet();
        cover.set_name("Cover").unwrap();
        cover.write_string(0, 0, "Quarterly export").unwrap();
        cover.write_string(1, 0, "prepared by finance").unwrap();
        let detail = workbook.add_worksheet();
        detail.set_name("Detail").unwrap();
        for (col, header) in ["Supplier", "Chemical", "Total_Cost"].iter().enumerate() {
            detail.write_string(0, col as u16, *header).unwrap();
        }
        detail.write_string(1, 0, "Hawkins Inc").unwrap();
        detail.write_string(1, 1, "Bleach").unwrap();
        detail.write_number(1, 2, 40.0).unwrap();
        workbook.save(&path).unwrap();

        let unknown = ingestion.ingest(&path, IngestRequest::default()).await.unwrap();
        assert_eq!(unknown.record.report_type, ReportType::Unknown);

        let request = IngestRequest {
            sheet: Some(SheetSelector::Name("Detail".into())),
            ..IngestRequest::default()
        };
        let outcome = ingestion.ingest(&path, request).await.unwrap();
        assert_eq!(outcome.record.report_type, ReportType::ChemicalSpendBySupplier);
        assert_eq!(outcome.record.record_count, 1);
    }

    #[tokio::test]
    async fn test_replace_previous_after_save() {
        let dir = tempfile::tempdir().unwrap();
        let ingestion = pipeline(&dir)
            .await
            .with_replace_previous(vec![ReportType::ChemicalSpendBySupplier]);
        let first = write(&dir, "jan.csv", "Supplier,Chemical,Total_Cost\nX,Y,1\n");
        let second = write(&dir, "feb.csv", "Supplier,Chemical,Total_Cost\nX,Y,2\n");
        let other = write(
            &dir,
            "misc.csv",
            "Invoice: Number,Supplier: Name,Net Amount\nINV-1,Acme,10\n",
        );

        let a = ingestion.ingest(&first, IngestRequest::default()).await.unwrap();
        let c = ingestion.ingest(&other, IngestRequest::default()).await.unwrap();
        let b = ingestion.ingest(&second, IngestRequest::default()).await.unwrap();

        assert_eq!(b.replaced, vec![a.record.id.clone()]);
        let ids: Vec<String> = ingestion
            .store()
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec![c.record.id, b.record.id]);
    }

    #[tokio::test]
    async fn test_request_name_and_description() {
        let dir = tempfile::tempdir().unwrap();
        let ingestion = pipeline(&dir).await;
        let path = write(&dir, "a.csv", "Supplier,Chemical,Total_Cost\nX,Y,1\n");

        let request = IngestRequest {
            display_name: Some("Q1 chemicals".into()),
            description: Some("from finance".into()),
            ..IngestRequest::default()
        };
        let outcome = ingestion.ingest(&path, request).await.unwrap();
        assert_eq!(outcome.record.name, "Q1 chemicals");
        assert_eq!(outcome.record.description.as_deref(), Some("from finance"));
    }

    #[test]
    fn test_default_display_name() {
        let name = default_display_name(Path::new("/tmp/po_line_detail_mar.xlsx"), ReportType::PoLineDetail);
        assert!(name.starts_with("po_line_detail_mar ("));
        assert!(name.ends_with(") - PO Line Detail"));
    }
}
