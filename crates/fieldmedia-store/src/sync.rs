//! Sync queue repository: durable outbox for the replicator.

use chrono::{DateTime, Utc};
use fieldmedia_core::models::{SyncOperation, SyncOperationKind, SyncPriority};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::{StoreError, StoreResult};

#[derive(Clone)]
pub struct SyncQueueRepository {
    pool: SqlitePool,
}

impl SyncQueueRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn enqueue(&self, op: &SyncOperation) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO sync_queue (id, kind, asset_id, priority, attempts, max_attempts, \
             last_attempt_at, last_error, terminally_failed, payload, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(op.id.to_string())
        .bind(op.kind.as_str())
        .bind(op.asset_id.to_string())
        .bind(op.priority.rank())
        .bind(op.attempts)
        .bind(op.max_attempts)
        .bind(op.last_attempt_at)
        .bind(op.last_error.clone())
        .bind(op.terminally_failed)
        .bind(op.payload.to_string())
        .bind(op.created_at)
        .execute(&self.pool)
        .await?;
        tracing::debug!(operation = %op.id, kind = op.kind.as_str(), "sync operation queued");
        Ok(())
    }

    /// Next operations to attempt, at most `limit`, ordered by priority rank
    /// then enqueue time. Terminally failed and attempt-exhausted operations
    /// are never returned.
    pub async fn next_batch(&self, limit: i64) -> StoreResult<Vec<SyncOperation>> {
        let rows = sqlx::query(
            "SELECT id, kind, asset_id, priority, attempts, max_attempts, last_attempt_at, \
             last_error, terminally_failed, payload, created_at FROM sync_queue \
             WHERE terminally_failed = 0 AND attempts < max_attempts \
             ORDER BY priority ASC, created_at ASC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_operation).collect()
    }

    /// Record a failed attempt: bumps `attempts`, stamps the attempt time,
    /// and stores the error.
    pub async fn record_failure(
        &self,
        id: Uuid,
        error: &str,
        at: DateTime<Utc>,
    ) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE sync_queue SET attempts = attempts + 1, last_attempt_at = ?, \
             last_error = ? WHERE id = ?",
        )
        .bind(at)
        .bind(error)
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity: "sync operation",
                id: id.to_string(),
            });
        }
        Ok(())
    }

    /// Mark an operation as out of attempts. It stays in the queue, visible
    /// to `error_count` and `failed`, until acknowledged.
    pub async fn mark_terminally_failed(&self, id: Uuid) -> StoreResult<()> {
        let result = sqlx::query("UPDATE sync_queue SET terminally_failed = 1 WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity: "sync operation",
                id: id.to_string(),
            });
        }
        Ok(())
    }

    /// Operations that ran out of attempts and await acknowledgement.
    pub async fn failed(&self) -> StoreResult<Vec<SyncOperation>> {
        let rows = sqlx::query(
            "SELECT id, kind, asset_id, priority, attempts, max_attempts, last_attempt_at, \
             last_error, terminally_failed, payload, created_at FROM sync_queue \
             WHERE terminally_failed = 1 ORDER BY created_at ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_operation).collect()
    }

    /// Drop an acknowledged terminal failure from the queue.
    pub async fn acknowledge_failed(&self, id: Uuid) -> StoreResult<()> {
        let result =
            sqlx::query("DELETE FROM sync_queue WHERE id = ? AND terminally_failed = 1")
                .bind(id.to_string())
                .execute(&self.pool)
                .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity: "sync operation",
                id: id.to_string(),
            });
        }
        Ok(())
    }

    /// Remove a completed operation.
    pub async fn remove(&self, id: Uuid) -> StoreResult<()> {
        sqlx::query("DELETE FROM sync_queue WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Remove every queued operation for an asset, regardless of state.
    pub async fn remove_for_asset(&self, asset_id: Uuid) -> StoreResult<()> {
        sqlx::query("DELETE FROM sync_queue WHERE asset_id = ?")
            .bind(asset_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Operations still waiting to replicate.
    pub async fn pending_count(&self) -> StoreResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sync_queue WHERE terminally_failed = 0 \
             AND attempts < max_attempts",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    /// Operations currently carrying an error (retrying or terminal).
    pub async fn error_count(&self) -> StoreResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM sync_queue WHERE last_error IS NOT NULL")
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }
}

fn row_to_operation(row: &SqliteRow) -> StoreResult<SyncOperation> {
    let id: String = row.get("id");
    let asset_id: String = row.get("asset_id");
    let kind_raw: String = row.get("kind");
    let kind = SyncOperationKind::parse(&kind_raw)
        .ok_or_else(|| StoreError::Corrupt(format!("kind: {kind_raw}")))?;
    let rank: i64 = row.get("priority");
    let priority = SyncPriority::from_rank(rank)
        .ok_or_else(|| StoreError::Corrupt(format!("priority: {rank}")))?;
    let payload: String = row.get("payload");
    Ok(SyncOperation {
        id: Uuid::parse_str(&id).map_err(|e| StoreError::Corrupt(format!("id: {e}")))?,
        kind,
        asset_id: Uuid::parse_str(&asset_id)
            .map_err(|e| StoreError::Corrupt(format!("asset_id: {e}")))?,
        priority,
        attempts: row.get("attempts"),
        max_attempts: row.get("max_attempts"),
        last_attempt_at: row.get("last_attempt_at"),
        last_error: row.get("last_error"),
        terminally_failed: row.get("terminally_failed"),
        payload: serde_json::from_str(&payload)
            .map_err(|e| StoreError::Corrupt(format!("payload: {e}")))?,
        created_at: row.get("created_at"),
    })
}
