//! Aggregate usage, compression, and sync statistics.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Count and total original bytes for one category or MIME type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeBreakdown {
    pub count: i64,
    pub size: i64,
}

/// Aggregates over the (optionally owner-scoped) asset set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MediaStatistics {
    pub total_assets: i64,
    pub total_size: i64,
    pub total_compressed_size: i64,
    /// `total_size - total_compressed_size`.
    pub compression_savings: i64,
    pub by_category: BTreeMap<String, TypeBreakdown>,
    pub by_mime_type: BTreeMap<String, TypeBreakdown>,
    /// Operations still waiting in the sync queue (not terminally failed).
    pub pending_sync: i64,
    /// Operations currently carrying an error.
    pub sync_errors: i64,
    /// Bytes counted against the quota (original + compressed).
    pub storage_used: i64,
    pub storage_quota: i64,
}
