use crate::domain::error::{AppError, Result};
use crate::domain::record::DatasetRecord;
use crate::domain::report::ReportType;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnection, SqlitePool};
use sqlx::{Sqlite, Transaction};

const RECORD_COLUMNS: &str = "id, name, filename, original_filename, report_type, uploaded_at, \
     record_count, column_count, storage_path, checksum, description";

/// Metadata rows of stored datasets.
///
/// Reads go straight to the pool. Writes take a connection so the caller
/// can run them inside its own transaction.
#[derive(Clone)]
pub struct ReportRepository {
    pool: SqlitePool,
}

impl ReportRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>> {
        self.pool
            .begin()
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to begin transaction: {}", e)))
    }

    pub async fn insert(conn: &mut SqliteConnection, record: &DatasetRecord) -> Result<()> {
        sqlx::query(
            "INSERT INTO datasets (id, name, filename, original_filename, report_type, uploaded_at,
                record_count, column_count, storage_path, checksum, description)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.id)
        .bind(&record.name)
        .bind(&record.filename)
        .bind(&record.original_filename)
        .bind(record.report_type.label())
        .bind(format_timestamp(&record.uploaded_at))
        .bind(record.record_count as i64)
        .bind(record.column_count as i64)
        .bind(&record.storage_path)
        .bind(&record.checksum)
        .bind(&record.description)
        .execute(conn)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to insert dataset record: {}", e)))?;

        Ok(())
    }

    /// Returns whether a row was removed.
    pub async fn delete(conn: &mut SqliteConnection, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM datasets WHERE id = ?")
            .bind(id)
            .execute(conn)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to delete dataset record: {}", e)))?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn find(&self, id: &str) -> Result<Option<DatasetRecord>> {
        let entity = sqlx::query_as::<_, DatasetEntity>(&format!(
            "SELECT {} FROM datasets WHERE id = ?",
            RECORD_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to fetch dataset record: {}", e)))?;

        entity.map(DatasetRecord::try_from).transpose()
    }

    /// Oldest first; rows uploaded in the same instant keep insertion order.
    pub async fn list(&self) -> Result<Vec<DatasetRecord>> {
        let entities = sqlx::query_as::<_, DatasetEntity>(&format!(
            "SELECT {} FROM datasets ORDER BY uploaded_at ASC, rowid ASC",
            RECORD_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to list dataset records: {}", e)))?;

        entities.into_iter().map(DatasetRecord::try_from).collect()
    }

    pub async fn list_by_type(&self, report_type: ReportType) -> Result<Vec<DatasetRecord>> {
        let entities = sqlx::query_as::<_, DatasetEntity>(&format!(
            "SELECT {} FROM datasets WHERE report_type = ? ORDER BY uploaded_at ASC, rowid ASC",
            RECORD_COLUMNS
        ))
        .bind(report_type.label())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to list dataset records: {}", e)))?;

        entities.into_iter().map(DatasetRecord::try_from).collect()
    }

    pub async fn count(&self) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM datasets")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to count dataset records: {}", e)))
    }
}

/// RFC 3339 with microseconds in UTC, so text order is time order.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

// Internal entity for database mapping
#[derive(sqlx::FromRow)]
struct DatasetEntity {
    id: String,
    name: String,
    filename: String,
    original_filename: String,
    report_type: String,
    uploaded_at: String,
    record_count: i64,
    column_count: i64,
    storage_path: String,
    checksum: String,
    description: Option<String>,
}

impl TryFrom<DatasetEntity> for DatasetRecord {
    type Error = AppError;

    fn try_from(e: DatasetEntity) -> Result<Self> {
        let report_type = e.report_type.parse::<ReportType>().map_err(|_| {
            AppError::DatabaseError(format!(
                "Dataset {} has unknown report type '{}'",
                e.id, e.report_type
            ))
        })?;
        let uploaded_at = DateTime::parse_from_rfc3339(&e.uploaded_at)
            .map_err(|err| {
                AppError::DatabaseError(format!(
                    "Dataset {} has invalid upload time '{}': {}",
                    e.id, e.uploaded_at, err
                ))
            })?
            .with_timezone(&Utc);

        Ok(Self {
            id: e.id,
            name: e.name,
            filename: e.filename,
            original_filename: e.original_filename,
            report_type,
            uploaded_at,
            record_count: e.record_count.max(0) as usize,
            column_count: e.column_count.max(0) as usize,
            storage_path: e.storage_path,
            checksum: e.checksum,
            description: e.description,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::db::connection::init_reports_db;

    fn record(id: &str, report_type: ReportType, uploaded_at: DateTime<Utc>) -> DatasetRecord {
        DatasetRecord {
            id: id.to_string(),
            name: format!("Dataset {}", id),
            filename: format!("{}.json", id),
            original_filename: "input.csv".to_string(),
            report_type,
            uploaded_at,
            record_count: 3,
            column_count: 2,
            storage_path: format!("datasets/{}.json", id),
            checksum: "00".to_string(),
            description: None,
        }
    }

    #[tokio::test]
    async fn test_insert_find_list_delete() {
        let dir = tempfile::tempdir().unwrap();
        let repo = ReportRepository::new(init_reports_db(&dir.path().join("r.db")).await.unwrap());

        let now = Utc::now();
        let first = record("b", ReportType::NonPoInvoice, now);
        let second = record("a", ReportType::ChemicalSpendBySupplier, now);

        let mut tx = repo.begin().await.unwrap();
        ReportRepository::insert(&mut tx, &first).await.unwrap();
        ReportRepository::insert(&mut tx, &second).await.unwrap();
        tx.commit().await.unwrap();

        let found = repo.find("a").await.unwrap().unwrap();
        assert_eq!(found.report_type, ReportType::ChemicalSpendBySupplier);
        assert_eq!(found.record_count, 3);

        // same timestamp: insertion order wins
        let ids: Vec<String> = repo.list().await.unwrap().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["b".to_string(), "a".to_string()]);

        let by_type = repo.list_by_type(ReportType::NonPoInvoice).await.unwrap();
        assert_eq!(by_type.len(), 1);

        let mut conn = repo.pool().acquire().await.unwrap();
        assert!(ReportRepository::delete(&mut conn, "a").await.unwrap());
        assert!(!ReportRepository::delete(&mut conn, "a").await.unwrap());
        assert!(repo.find("a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rollback_discards_insert() {
        let dir = tempfile::tempdir().unwrap();
        let repo = ReportRepository::new(init_reports_db(&dir.path().join("r.db")).await.unwrap());

        let mut tx = repo.begin().await.unwrap();
        ReportRepository::insert(&mut tx, &record("x", ReportType::Unknown, Utc::now()))
            .await
            .unwrap();
        tx.rollback().await.unwrap();

        assert_eq!(repo.count().await.unwrap(), 0);
    }
}
