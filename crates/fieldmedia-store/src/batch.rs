//! Batch record repository.

use chrono::{DateTime, Utc};
use fieldmedia_core::models::{Batch, BatchStatus, IngestOptions};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::{StoreError, StoreResult};

#[derive(Clone)]
pub struct BatchRepository {
    pool: SqlitePool,
}

impl BatchRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, batch: &Batch) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO batches (id, total, options, progress, status, asset_ids, errors, \
             created_at, completed_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(batch.id.to_string())
        .bind(batch.total)
        .bind(to_json(&batch.options)?)
        .bind(batch.progress)
        .bind(batch.status.as_str())
        .bind(to_json(&batch.asset_ids)?)
        .bind(to_json(&batch.errors)?)
        .bind(batch.created_at)
        .bind(batch.completed_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get(&self, id: Uuid) -> StoreResult<Batch> {
        let row = sqlx::query(
            "SELECT id, total, options, progress, status, asset_ids, errors, created_at, \
             completed_at FROM batches WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;
        match row {
            Some(row) => row_to_batch(&row),
            None => Err(StoreError::NotFound {
                entity: "batch",
                id: id.to_string(),
            }),
        }
    }

    /// Persist intermediate progress. Progress never moves backward; the
    /// caller computes the new value from its completion count.
    pub async fn update_progress(
        &self,
        id: Uuid,
        progress: i64,
        asset_ids: &[Uuid],
        errors: &[String],
    ) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE batches SET progress = MAX(progress, ?), status = ?, asset_ids = ?, \
             errors = ? WHERE id = ?",
        )
        .bind(progress)
        .bind(BatchStatus::Processing.as_str())
        .bind(to_json(&asset_ids)?)
        .bind(to_json(&errors)?)
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity: "batch",
                id: id.to_string(),
            });
        }
        Ok(())
    }

    pub async fn complete(
        &self,
        id: Uuid,
        status: BatchStatus,
        asset_ids: &[Uuid],
        errors: &[String],
        at: DateTime<Utc>,
    ) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE batches SET progress = 100, status = ?, asset_ids = ?, errors = ?, \
             completed_at = ? WHERE id = ?",
        )
        .bind(status.as_str())
        .bind(to_json(&asset_ids)?)
        .bind(to_json(&errors)?)
        .bind(at)
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity: "batch",
                id: id.to_string(),
            });
        }
        Ok(())
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> StoreResult<String> {
    serde_json::to_string(value).map_err(|e| StoreError::Corrupt(e.to_string()))
}

fn row_to_batch(row: &SqliteRow) -> StoreResult<Batch> {
    let id: String = row.get("id");
    let status_raw: String = row.get("status");
    let status = BatchStatus::parse(&status_raw)
        .ok_or_else(|| StoreError::Corrupt(format!("status: {status_raw}")))?;
    let options: String = row.get("options");
    let asset_ids: String = row.get("asset_ids");
    let errors: String = row.get("errors");
    Ok(Batch {
        id: Uuid::parse_str(&id).map_err(|e| StoreError::Corrupt(format!("id: {e}")))?,
        total: row.get("total"),
        options: serde_json::from_str::<IngestOptions>(&options)
            .map_err(|e| StoreError::Corrupt(format!("options: {e}")))?,
        progress: row.get("progress"),
        status,
        asset_ids: serde_json::from_str::<Vec<Uuid>>(&asset_ids)
            .map_err(|e| StoreError::Corrupt(format!("asset_ids: {e}")))?,
        errors: serde_json::from_str::<Vec<String>>(&errors)
            .map_err(|e| StoreError::Corrupt(format!("errors: {e}")))?,
        created_at: row.get("created_at"),
        completed_at: row.get("completed_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MediaStore;

    #[tokio::test]
    async fn batch_lifecycle() {
        let store = MediaStore::open_in_memory().await.unwrap();
        let repo = store.batches();
        let batch = Batch::new(3, IngestOptions::default());
        repo.insert(&batch).await.unwrap();

        let loaded = repo.get(batch.id).await.unwrap();
        assert_eq!(loaded.total, 3);
        assert_eq!(loaded.status, BatchStatus::Pending);
        assert_eq!(loaded.progress, 0);

        let first = Uuid::new_v4();
        repo.update_progress(batch.id, 33, &[first], &[])
            .await
            .unwrap();
        let loaded = repo.get(batch.id).await.unwrap();
        assert_eq!(loaded.progress, 33);
        assert_eq!(loaded.status, BatchStatus::Processing);
        assert_eq!(loaded.asset_ids, vec![first]);

        // Progress is monotone.
        repo.update_progress(batch.id, 10, &[first], &[])
            .await
            .unwrap();
        assert_eq!(repo.get(batch.id).await.unwrap().progress, 33);

        let errors = vec!["file 2: unsupported media type".to_string()];
        repo.complete(batch.id, BatchStatus::Failed, &[first], &errors, Utc::now())
            .await
            .unwrap();
        let loaded = repo.get(batch.id).await.unwrap();
        assert_eq!(loaded.progress, 100);
        assert_eq!(loaded.status, BatchStatus::Failed);
        assert_eq!(loaded.errors, errors);
        assert!(loaded.completed_at.is_some());
    }

    #[tokio::test]
    async fn missing_batch_is_not_found() {
        let store = MediaStore::open_in_memory().await.unwrap();
        let err = store.batches().get(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }
}
