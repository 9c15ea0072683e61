//! Batch model: one bounded-concurrency ingestion run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::settings::IngestOptions;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Pending => "pending",
            BatchStatus::Processing => "processing",
            BatchStatus::Completed => "completed",
            BatchStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(BatchStatus::Pending),
            "processing" => Some(BatchStatus::Processing),
            "completed" => Some(BatchStatus::Completed),
            "failed" => Some(BatchStatus::Failed),
            _ => None,
        }
    }
}

/// One group ingestion run over multiple files sharing options.
///
/// `progress` is 0–100 and monotonically non-decreasing; `status` becomes
/// `Completed` only if `errors` is empty, otherwise `Failed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Batch {
    pub id: Uuid,
    pub total: i64,
    pub options: IngestOptions,
    pub progress: i64,
    pub status: BatchStatus,
    /// Ids of successfully produced assets (completion order).
    pub asset_ids: Vec<Uuid>,
    /// Per-item failures, labeled with the 1-based source index.
    pub errors: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Batch {
    pub fn new(total: i64, options: IngestOptions) -> Self {
        Self {
            id: Uuid::new_v4(),
            total,
            options,
            progress: 0,
            status: BatchStatus::Pending,
            asset_ids: Vec::new(),
            errors: Vec::new(),
            created_at: Utc::now(),
            completed_at: None,
        }
    }
}

/// Progress after `completed` of `total` items: `round(completed/total * 100)`.
pub fn batch_progress(completed: i64, total: i64) -> i64 {
    if total <= 0 {
        return 100;
    }
    ((completed as f64 / total as f64) * 100.0).round() as i64
}
