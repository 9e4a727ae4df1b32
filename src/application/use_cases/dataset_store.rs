// ============================================================
// DATASET STORE USE CASE
// ============================================================
// Persist datasets as JSON documents with SQLite metadata rows.
// A document and its row are written and removed together, under an
// in-process mutex and a lock file shared with other processes.

use std::path::Path;

use chrono::SubsecRound;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::domain::dataset::Dataset;
use crate::domain::error::{AppError, Result};
use crate::domain::record::{DatasetRecord, NewDatasetRecord};
use crate::domain::report::ReportType;
use crate::infrastructure::artifact_store::{
    atomic_write_bytes, move_file, remove_file_if_exists, sha256_hex_bytes, DatasetLayout,
    DirLock, DocumentFile,
};
use crate::infrastructure::db::{init_reports_db, ReportRepository};

pub const FORMAT_VERSION: u32 = 1;

/// Serialized form of one stored dataset
#[derive(Debug, Serialize, Deserialize)]
struct StoredDocument {
    format_version: u32,
    record: DocumentRecord,
    dataset: Dataset,
}

/// Metadata embedded in the document itself
#[derive(Debug, Clone, Serialize, Deserialize)]
struct DocumentRecord {
    id: String,
    name: String,
    original_filename: String,
    report_type: ReportType,
    uploaded_at: chrono::DateTime<chrono::Utc>,
    description: Option<String>,
}

/// Leftovers removed by [`DatasetStore::reconcile`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub temp_files_removed: usize,
    pub tombstones_removed: usize,
    pub orphan_documents_removed: usize,
    pub orphan_records_removed: usize,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        *self == ReconcileReport::default()
    }
}

pub struct DatasetStore {
    layout: DatasetLayout,
    repository: ReportRepository,
    write_lock: Mutex<()>,
}

impl DatasetStore {
    /// Open the store under `data_dir`, creating directories and schema as needed,
    /// then clean up anything an interrupted write or delete left behind.
    pub async fn open(data_dir: &Path, database_file: &str) -> Result<Self> {
        let layout = DatasetLayout::new(data_dir);
        layout.ensure()?;

        let pool = init_reports_db(&data_dir.join(database_file)).await?;
        let store = Self {
            layout,
            repository: ReportRepository::new(pool),
            write_lock: Mutex::new(()),
        };

        let report = store.reconcile().await?;
        if !report.is_clean() {
            warn!(
                temp_files = report.temp_files_removed,
                tombstones = report.tombstones_removed,
                orphan_documents = report.orphan_documents_removed,
                orphan_records = report.orphan_records_removed,
                "Dataset store had leftovers from an earlier run"
            );
        }
        if tracing::enabled!(tracing::Level::DEBUG) {
            let datasets = store.repository.count().await?;
            debug!(datasets, "Dataset store opened");
        }

        Ok(store)
    }

    /// Exclusive access to the data directory. The in-process mutex must be held first.
    async fn lock_dir(&self) -> Result<DirLock> {
        DirLock::acquire_async(self.layout.lock_path()).await
    }

    pub fn layout(&self) -> &DatasetLayout {
        &self.layout
    }

    pub fn repository(&self) -> &ReportRepository {
        &self.repository
    }

    /// Persist a dataset and its metadata; returns the stored record.
    ///
    /// The document is written first, then the row is inserted in a
    /// transaction. If the row cannot be committed the document is removed.
    pub async fn save(&self, dataset: &Dataset, metadata: NewDatasetRecord) -> Result<DatasetRecord> {
        metadata.validate()?;
        let _guard = self.write_lock.lock().await;
        let _dir = self.lock_dir().await?;

        let (bytes, record) = self.prepare(dataset, metadata)?;
        let id = record.id.clone();
        let path = self.layout.document_path(&id);
        atomic_write_bytes(&path, &bytes)?;

        if let Err(e) = self.insert_record(&record).await {
            if let Err(cleanup) = remove_file_if_exists(&path) {
                warn!(id = %id, error = %cleanup, "Failed to remove document after failed insert");
            }
            return Err(e);
        }

        info!(
            id = %record.id,
            report_type = record.report_type.slug(),
            rows = record.record_count,
            columns = record.column_count,
            "Dataset saved"
        );
        Ok(record)
    }

    /// Serialize a new document and build the row that will describe it.
    fn prepare(&self, dataset: &Dataset, metadata: NewDatasetRecord) -> Result<(Vec<u8>, DatasetRecord)> {
        let id = Uuid::new_v4().to_string();
        let uploaded_at = chrono::Utc::now().trunc_subsecs(6);
        let document = StoredDocument {
            format_version: FORMAT_VERSION,
            record: DocumentRecord {
                id: id.clone(),
                name: metadata.name.clone(),
                original_filename: metadata.original_filename.clone(),
                report_type: metadata.report_type,
                uploaded_at,
                description: metadata.description.clone(),
            },
            dataset: dataset.clone(),
        };
        let bytes = serde_json::to_vec(&document)
            .map_err(|e| AppError::StorageError(format!("Failed to serialize dataset {}: {}", id, e)))?;

        let record = DatasetRecord {
            id: id.clone(),
            name: metadata.name,
            filename: self.layout.document_file_name(&id),
            original_filename: metadata.original_filename,
            report_type: metadata.report_type,
            uploaded_at,
            record_count: dataset.row_count(),
            column_count: dataset.column_count(),
            storage_path: self.layout.relative_document_path(&id),
            checksum: sha256_hex_bytes(&bytes),
            description: metadata.description,
        };
        Ok((bytes, record))
    }

    async fn insert_record(&self, record: &DatasetRecord) -> Result<()> {
        let mut tx = self.repository.begin().await?;
        ReportRepository::insert(&mut tx, record).await?;
        tx.commit()
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to commit dataset record: {}", e)))
    }

    /// All records, oldest upload first.
    pub async fn list(&self) -> Result<Vec<DatasetRecord>> {
        self.repository.list().await
    }

    pub async fn record(&self, id: &str) -> Result<Option<DatasetRecord>> {
        self.repository.find(id).await
    }

    /// Load a stored dataset. `None` when no record has this id; a record
    /// whose document is missing or altered is a storage error.
    pub async fn get(&self, id: &str) -> Result<Option<(Dataset, DatasetRecord)>> {
        let Some(record) = self.repository.find(id).await? else {
            return Ok(None);
        };

        let path = self.layout.document_path(&record.id);
        let bytes = tokio::fs::read(&path).await.map_err(|e| {
            AppError::StorageError(format!(
                "Document for dataset {} is unreadable at {}: {}",
                id,
                path.display(),
                e
            ))
        })?;

        let checksum = sha256_hex_bytes(&bytes);
        if checksum != record.checksum {
            return Err(AppError::StorageError(format!(
                "Checksum mismatch for dataset {}: expected {}, found {}",
                id, record.checksum, checksum
            )));
        }

        let document: StoredDocument = serde_json::from_slice(&bytes).map_err(|e| {
            AppError::StorageError(format!("Failed to decode dataset {}: {}", id, e))
        })?;
        if document.format_version != FORMAT_VERSION || document.record.id != record.id {
            return Err(AppError::StorageError(format!(
                "Document for dataset {} has unexpected header (version {}, id {})",
                id, document.format_version, document.record.id
            )));
        }

        debug!(id = %id, rows = document.dataset.row_count(), "Dataset loaded");
        Ok(Some((document.dataset, record)))
    }

    /// Remove a dataset's row and document. `false` when the id is unknown.
    pub async fn delete(&self, id: &str) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        let _dir = self.lock_dir().await?;
        self.delete_locked(id).await
    }

    /// Two-phase delete: row removal and move-to-tombstone share one
    /// transaction; the tombstone is removed only after commit.
    async fn delete_locked(&self, id: &str) -> Result<bool> {
        let Some(record) = self.repository.find(id).await? else {
            return Ok(false);
        };

        let mut tx = self.repository.begin().await?;
        if !ReportRepository::delete(&mut tx, id).await? {
            let _ = tx.rollback().await;
            return Ok(false);
        }

        let document = self.layout.document_path(&record.id);
        let tombstone = self.layout.tombstone_path(id);
        let moved = if document.exists() {
            if let Err(e) = move_file(&document, &tombstone) {
                let _ = tx.rollback().await;
                return Err(e);
            }
            true
        } else {
            warn!(id = %id, path = %document.display(), "Deleting dataset whose document is already gone");
            false
        };

        if let Err(e) = tx.commit().await {
            if moved {
                if let Err(restore) = move_file(&tombstone, &document) {
                    warn!(id = %id, error = %restore, "Failed to restore document after failed delete");
                }
            }
            return Err(AppError::DatabaseError(format!(
                "Failed to commit delete of dataset {}: {}",
                id, e
            )));
        }

        if moved {
            if let Err(e) = remove_file_if_exists(&tombstone) {
                warn!(id = %id, error = %e, "Tombstone left behind, will be removed on next open");
            }
        }

        info!(id = %id, "Dataset deleted");
        Ok(true)
    }

    /// Delete every dataset; returns how many were removed.
    pub async fn clear(&self) -> Result<usize> {
        let _guard = self.write_lock.lock().await;
        let _dir = self.lock_dir().await?;
        let mut removed = 0;
        for record in self.repository.list().await? {
            if self.delete_locked(&record.id).await? {
                removed += 1;
            }
        }
        info!(removed, "Dataset store cleared");
        Ok(removed)
    }

    /// Delete every dataset of `report_type` except `keep`; returns the removed ids.
    pub async fn delete_by_type(&self, report_type: ReportType, keep: Option<&str>) -> Result<Vec<String>> {
        let _guard = self.write_lock.lock().await;
        let _dir = self.lock_dir().await?;
        let mut removed = Vec::new();
        for record in self.repository.list_by_type(report_type).await? {
            if Some(record.id.as_str()) == keep {
                continue;
            }
            if self.delete_locked(&record.id).await? {
                removed.push(record.id);
            }
        }
        Ok(removed)
    }

    /// Remove temp files, tombstones, documents without a row and rows without a document.
    pub async fn reconcile(&self) -> Result<ReconcileReport> {
        let _guard = self.write_lock.lock().await;
        let _dir = self.lock_dir().await?;
        let mut report = ReconcileReport::default();

        for file in self.layout.scan()? {
            match file {
                DocumentFile::Temp(path) => {
                    if remove_file_if_exists(&path)? {
                        report.temp_files_removed += 1;
                    }
                }
                DocumentFile::Tombstone(path) => {
                    if remove_file_if_exists(&path)? {
                        report.tombstones_removed += 1;
                    }
                }
                DocumentFile::Document { id, path } => {
                    if self.repository.find(&id).await?.is_none() {
                        debug!(id = %id, "Removing orphan dataset document");
                        if remove_file_if_exists(&path)? {
                            report.orphan_documents_removed += 1;
                        }
                    }
                }
                DocumentFile::Other(_) => {}
            }
        }

        for record in self.repository.list().await? {
            if self.layout.document_path(&record.id).exists() {
                continue;
            }
            debug!(id = %record.id, "Removing dataset record without document");
            let mut tx = self.repository.begin().await?;
            let removed = ReportRepository::delete(&mut tx, &record.id).await?;
            tx.commit().await.map_err(|e| {
                AppError::DatabaseError(format!("Failed to commit orphan record removal: {}", e))
            })?;
            if removed {
                report.orphan_records_removed += 1;
            }
        }

        Ok(report)
    }
}
