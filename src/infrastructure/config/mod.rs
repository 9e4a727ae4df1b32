// ============================================================
// APPLICATION CONFIG
// ============================================================
// Layered settings: defaults, optional TOML file, then environment

use crate::domain::error::{AppError, Result};
use crate::domain::report::ReportType;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "report_ingest.toml";
pub const CONFIG_PATH_VAR: &str = "REPORT_INGEST_CONFIG";
pub const ENV_PREFIX: &str = "REPORT_INGEST_";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub database_file: String,
    pub log_filter: String,
    pub csv: CsvSettings,
    pub ingestion: IngestionSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CsvSettings {
    pub primary_encoding: String,
    pub fallback_encoding: String,
    pub delimiter: char,
    pub detect_delimiter: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionSettings {
    /// Report types where a new upload replaces every older dataset of the type
    pub replace_previous: Vec<ReportType>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("saved_data"),
            database_file: "reports_database.db".to_string(),
            log_filter: "info".to_string(),
            csv: CsvSettings::default(),
            ingestion: IngestionSettings::default(),
        }
    }
}

impl Default for CsvSettings {
    fn default() -> Self {
        Self {
            primary_encoding: "utf-8".to_string(),
            fallback_encoding: "latin1".to_string(),
            delimiter: ',',
            detect_delimiter: false,
        }
    }
}

impl Default for IngestionSettings {
    fn default() -> Self {
        Self {
            replace_previous: vec![ReportType::ChemicalSpendBySupplier],
        }
    }
}

impl AppConfig {
    /// Load `.env`, then merge defaults, the config file and `REPORT_INGEST_*` variables.
    pub fn load() -> Result<Self> {
        let _ = dotenvy::dotenv();

        let file = std::env::var(CONFIG_PATH_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(CONFIG_FILE));

        Self::from_figment(Self::figment(&file))
    }

    pub fn figment(file: &Path) -> Figment {
        Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file(file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: AppConfig = figment
            .extract()
            .map_err(|e| AppError::ConfigError(format!("Failed to load configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.database_file.trim().is_empty() {
            return Err(AppError::ConfigError(
                "database_file must not be empty".to_string(),
            ));
        }
        for label in [&self.csv.primary_encoding, &self.csv.fallback_encoding] {
            if encoding_rs::Encoding::for_label(label.trim().as_bytes()).is_none() {
                return Err(AppError::ConfigError(format!(
                    "Unknown text encoding: {}",
                    label
                )));
            }
        }
        if !self.csv.delimiter.is_ascii() {
            return Err(AppError::ConfigError(format!(
                "CSV delimiter must be a single ASCII character, got {:?}",
                self.csv.delimiter
            )));
        }
        Ok(())
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(&self.database_file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Figment {
        Figment::from(Serialized::defaults(AppConfig::default()))
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_figment(base()).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("saved_data"));
        assert_eq!(config.database_path(), PathBuf::from("saved_data/reports_database.db"));
        assert_eq!(config.csv.delimiter, ',');
        assert_eq!(
            config.ingestion.replace_previous,
            vec![ReportType::ChemicalSpendBySupplier]
        );
    }

    #[test]
    fn test_toml_overrides_defaults() {
        let figment = base().merge(Toml::string(
            r#"
            data_dir = "/tmp/reports"
            [csv]
            delimiter = ";"
            [ingestion]
            replace_previous = []
            "#,
        ));
        let config = AppConfig::from_figment(figment).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/tmp/reports"));
        assert_eq!(config.csv.delimiter, ';');
        assert_eq!(config.csv.primary_encoding, "utf-8");
        assert!(config.ingestion.replace_previous.is_empty());
    }

    #[test]
    fn test_unknown_encoding_is_rejected() {
        let figment = base().merge(Toml::string(
            r#"
            [csv]
            fallback_encoding = "klingon"
            "#,
        ));
        let err = AppConfig::from_figment(figment).unwrap_err();
        assert!(matches!(err, AppError::ConfigError(_)));
    }
}
