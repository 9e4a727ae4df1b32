pub mod use_cases;

pub use use_cases::dataset_store::{DatasetStore, ReconcileReport};
pub use use_cases::file_loader::{FileLoader, LoadedFile};
pub use use_cases::report_classifier::{ReportClassifier, SignatureRegistry};
pub use use_cases::report_ingestion::{IngestOutcome, IngestRequest, ReportIngestion};
pub use use_cases::report_normalizer::{NormalizationReport, ReportNormalizer};
pub use use_cases::spend_summary::{summarize, SpendSummary};
