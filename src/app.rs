use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::application::use_cases::dataset_store::DatasetStore;
use crate::application::use_cases::file_loader::FileLoader;
use crate::application::use_cases::report_classifier::ReportClassifier;
use crate::application::use_cases::report_ingestion::ReportIngestion;
use crate::application::use_cases::report_normalizer::ReportNormalizer;
use crate::domain::error::{AppError, Result};
use crate::infrastructure::config::AppConfig;
use crate::interfaces::cli::{self, Cli, Command};

/// Everything a command needs, built once per process.
pub struct AppContext {
    pub config: AppConfig,
    loader: Arc<FileLoader>,
    classifier: Arc<ReportClassifier>,
    ingestion: Option<ReportIngestion>,
}

impl AppContext {
    /// Build the context. The store (and its data directory) is only
    /// opened when `open_store` is set.
    pub async fn bootstrap(config: AppConfig, open_store: bool) -> Result<Self> {
        let loader = Arc::new(FileLoader::from_settings(&config.csv)?);
        let classifier = Arc::new(ReportClassifier::default());

        let ingestion = if open_store {
            let store = DatasetStore::open(&config.data_dir, &config.database_file)
                .await
                .map_err(|e| {
                    error!(
                        error = %e,
                        data_dir = %config.data_dir.display(),
                        "Failed to open dataset store"
                    );
                    e
                })?;
            info!(
                data_dir = %config.data_dir.display(),
                db = %config.database_path().display(),
                "Dataset store ready"
            );
            Some(
                ReportIngestion::new(
                    Arc::clone(&loader),
                    Arc::clone(&classifier),
                    Arc::new(ReportNormalizer::default()),
                    Arc::new(store),
                )
                .with_replace_previous(config.ingestion.replace_previous.clone()),
            )
        } else {
            None
        };

        Ok(Self {
            config,
            loader,
            classifier,
            ingestion,
        })
    }

    pub fn loader(&self) -> &FileLoader {
        &self.loader
    }

    pub fn classifier(&self) -> &ReportClassifier {
        &self.classifier
    }

    pub fn ingestion(&self) -> Result<&ReportIngestion> {
        self.ingestion
            .as_ref()
            .ok_or_else(|| AppError::Internal("Dataset store is not open".to_string()))
    }
}

/// `RUST_LOG` wins over the configured filter. Logs go to stderr.
pub fn init_tracing(filter: &str) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init();
}

async fn run_command(command: Command) -> Result<String> {
    let config = AppConfig::load()?;
    init_tracing(&config.log_filter);

    let ctx = AppContext::bootstrap(config, command.needs_store()).await?;
    cli::execute(&ctx, command).await
}

pub async fn run() -> ExitCode {
    // Usage errors, --help and --version exit here
    let cli = Cli::parse();

    match run_command(cli.command).await {
        Ok(output) => {
            println!("{}", output.trim_end());
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Command failed");
            eprintln!("error: {}", e);
            ExitCode::from(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bootstrap_rejects_bad_csv_settings() {
        let mut config = AppConfig::default();
        config.csv.delimiter = '€';
        let err = AppContext::bootstrap(config, false).await.err().unwrap();
        assert!(matches!(err, AppError::ConfigError(_)));
    }

    #[tokio::test]
    async fn test_bootstrap_opens_store() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig {
            data_dir: dir.path().to_path_buf(),
            ..AppConfig::default()
        };
        let ctx = AppContext::bootstrap(config, true).await.unwrap();
        assert!(ctx.ingestion().unwrap().store().list().await.unwrap().is_empty());
        assert!(dir.path().join("reports_database.db").exists());
    }
}
