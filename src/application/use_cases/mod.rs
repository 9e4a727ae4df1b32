pub mod dataset_store;
pub mod file_loader;
pub mod report_classifier;
pub mod report_ingestion;
pub mod report_normalizer;
pub mod spend_summary;
