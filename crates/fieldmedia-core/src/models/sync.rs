//! Sync operation model: one queued replication intent.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncOperationKind {
    Upload,
    Update,
    Delete,
}

impl SyncOperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncOperationKind::Upload => "upload",
            SyncOperationKind::Update => "update",
            SyncOperationKind::Delete => "delete",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "upload" => Some(SyncOperationKind::Upload),
            "update" => Some(SyncOperationKind::Update),
            "delete" => Some(SyncOperationKind::Delete),
            _ => None,
        }
    }
}

/// Drain priority; lower rank drains first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncPriority {
    Critical,
    High,
    Normal,
    Low,
}

impl SyncPriority {
    /// Rank used for the `ORDER BY` in the queue (0 = drains first).
    pub fn rank(&self) -> i64 {
        match self {
            SyncPriority::Critical => 0,
            SyncPriority::High => 1,
            SyncPriority::Normal => 2,
            SyncPriority::Low => 3,
        }
    }

    pub fn from_rank(rank: i64) -> Option<Self> {
        match rank {
            0 => Some(SyncPriority::Critical),
            1 => Some(SyncPriority::High),
            2 => Some(SyncPriority::Normal),
            3 => Some(SyncPriority::Low),
            _ => None,
        }
    }
}

/// One queued intent to replicate a local change to the remote media service.
///
/// Invariant: `attempts <= max_attempts`. Once `attempts == max_attempts`
/// with a persisting error the operation is terminally failed: it is reported
/// exactly once and retained in the queue until acknowledged, never silently
/// retried or dropped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncOperation {
    pub id: Uuid,
    pub kind: SyncOperationKind,
    pub asset_id: Uuid,
    pub priority: SyncPriority,
    pub attempts: i64,
    pub max_attempts: i64,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub terminally_failed: bool,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl SyncOperation {
    pub fn new(
        kind: SyncOperationKind,
        asset_id: Uuid,
        priority: SyncPriority,
        max_attempts: i64,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            asset_id,
            priority,
            attempts: 0,
            max_attempts,
            last_attempt_at: None,
            last_error: None,
            terminally_failed: false,
            payload,
            created_at: Utc::now(),
        }
    }

    /// Whether the operation may still be attempted.
    pub fn has_attempts_left(&self) -> bool {
        !self.terminally_failed && self.attempts < self.max_attempts
    }
}
