//! Asset metadata repository.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use fieldmedia_core::models::{
    Asset, AssetCategory, AssetStatus, Association, AssociationKind, Dimensions, GeoPoint,
    MediaKind, MediaStatistics, SearchFilters, TypeBreakdown,
};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, SqlitePool};
use uuid::Uuid;

use crate::{StoreError, StoreResult};

#[derive(Clone)]
pub struct AssetRepository {
    pool: SqlitePool,
}

const ASSET_COLUMNS: &str = "id, file_name, original_name, mime_type, kind, size, \
     compressed_size, compression_ratio, width, height, duration_secs, category, tags, \
     latitude, longitude, address, association_kind, association_id, status, \
     derivative_errors, metadata, captured_at, uploaded_at, synced_at, created_at, \
     updated_at, created_by, is_public, access_list";

impl AssetRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, asset: &Asset) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO assets (id, file_name, original_name, mime_type, kind, size, \
             compressed_size, compression_ratio, width, height, duration_secs, category, \
             tags, latitude, longitude, address, association_kind, association_id, status, \
             derivative_errors, metadata, captured_at, uploaded_at, synced_at, created_at, \
             updated_at, created_by, is_public, access_list) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(asset.id.to_string())
        .bind(&asset.file_name)
        .bind(&asset.original_name)
        .bind(&asset.mime_type)
        .bind(asset.kind.as_str())
        .bind(asset.size)
        .bind(asset.compressed_size)
        .bind(asset.compression_ratio)
        .bind(asset.dimensions.map(|d| d.width as i64))
        .bind(asset.dimensions.map(|d| d.height as i64))
        .bind(asset.duration_secs)
        .bind(asset.category.as_str())
        .bind(to_json(&asset.tags)?)
        .bind(asset.location.as_ref().map(|l| l.latitude))
        .bind(asset.location.as_ref().map(|l| l.longitude))
        .bind(asset.location.as_ref().and_then(|l| l.address.clone()))
        .bind(asset.association.as_ref().map(|a| a.kind.as_str()))
        .bind(asset.association.as_ref().map(|a| a.id.clone()))
        .bind(asset.status.as_str())
        .bind(to_json(&asset.derivative_errors)?)
        .bind(asset.metadata.as_ref().map(|m| m.to_string()))
        .bind(asset.captured_at)
        .bind(asset.uploaded_at)
        .bind(asset.synced_at)
        .bind(asset.created_at)
        .bind(asset.updated_at)
        .bind(&asset.created_by)
        .bind(asset.is_public)
        .bind(to_json(&asset.access_list)?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get(&self, id: Uuid) -> StoreResult<Asset> {
        let query = format!("SELECT {ASSET_COLUMNS} FROM assets WHERE id = ?");
        let row = sqlx::query(&query)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => row_to_asset(&row),
            None => Err(StoreError::NotFound {
                entity: "asset",
                id: id.to_string(),
            }),
        }
    }

    /// Full-row update; `updated_at` is taken from the value passed in.
    pub async fn update(&self, asset: &Asset) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE assets SET file_name = ?, original_name = ?, mime_type = ?, kind = ?, \
             size = ?, compressed_size = ?, compression_ratio = ?, width = ?, height = ?, \
             duration_secs = ?, category = ?, tags = ?, latitude = ?, longitude = ?, \
             address = ?, association_kind = ?, association_id = ?, status = ?, \
             derivative_errors = ?, metadata = ?, captured_at = ?, uploaded_at = ?, \
             synced_at = ?, created_at = ?, updated_at = ?, created_by = ?, is_public = ?, \
             access_list = ? WHERE id = ?",
        )
        .bind(&asset.file_name)
        .bind(&asset.original_name)
        .bind(&asset.mime_type)
        .bind(asset.kind.as_str())
        .bind(asset.size)
        .bind(asset.compressed_size)
        .bind(asset.compression_ratio)
        .bind(asset.dimensions.map(|d| d.width as i64))
        .bind(asset.dimensions.map(|d| d.height as i64))
        .bind(asset.duration_secs)
        .bind(asset.category.as_str())
        .bind(to_json(&asset.tags)?)
        .bind(asset.location.as_ref().map(|l| l.latitude))
        .bind(asset.location.as_ref().map(|l| l.longitude))
        .bind(asset.location.as_ref().and_then(|l| l.address.clone()))
        .bind(asset.association.as_ref().map(|a| a.kind.as_str()))
        .bind(asset.association.as_ref().map(|a| a.id.clone()))
        .bind(asset.status.as_str())
        .bind(to_json(&asset.derivative_errors)?)
        .bind(asset.metadata.as_ref().map(|m| m.to_string()))
        .bind(asset.captured_at)
        .bind(asset.uploaded_at)
        .bind(asset.synced_at)
        .bind(asset.created_at)
        .bind(asset.updated_at)
        .bind(&asset.created_by)
        .bind(asset.is_public)
        .bind(to_json(&asset.access_list)?)
        .bind(asset.id.to_string())
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity: "asset",
                id: asset.id.to_string(),
            });
        }
        Ok(())
    }

    /// Move the asset along the lifecycle graph. Rejects transitions the
    /// graph does not allow.
    pub async fn update_status(&self, id: Uuid, status: AssetStatus) -> StoreResult<()> {
        let current = self.status_of(id).await?;
        if !current.can_transition(status) {
            return Err(StoreError::InvalidTransition {
                from: current.as_str(),
                to: status.as_str(),
            });
        }
        let result = sqlx::query("UPDATE assets SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(Utc::now())
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity: "asset",
                id: id.to_string(),
            });
        }
        Ok(())
    }

    /// Record a successful replication. Re-marking an already synced asset
    /// refreshes `synced_at`; any other illegal transition is rejected.
    pub async fn mark_synced(&self, id: Uuid, at: DateTime<Utc>) -> StoreResult<()> {
        let current = self.status_of(id).await?;
        if current != AssetStatus::Synced && !current.can_transition(AssetStatus::Synced) {
            return Err(StoreError::InvalidTransition {
                from: current.as_str(),
                to: AssetStatus::Synced.as_str(),
            });
        }
        let result = sqlx::query(
            "UPDATE assets SET status = ?, synced_at = ?, updated_at = ? WHERE id = ?",
        )
        .bind(AssetStatus::Synced.as_str())
        .bind(at)
        .bind(Utc::now())
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity: "asset",
                id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn status_of(&self, id: Uuid) -> StoreResult<AssetStatus> {
        let raw: Option<String> = sqlx::query_scalar("SELECT status FROM assets WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        let raw = raw.ok_or_else(|| StoreError::NotFound {
            entity: "asset",
            id: id.to_string(),
        })?;
        AssetStatus::parse(&raw).ok_or_else(|| StoreError::Corrupt(format!("status: {raw}")))
    }

    pub async fn delete(&self, id: Uuid) -> StoreResult<()> {
        sqlx::query("DELETE FROM assets WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Conjunctive filter search, most recent capture first. Tag overlap and
    /// geofence predicates are applied in memory after the indexed scan.
    pub async fn search(&self, filters: &SearchFilters) -> StoreResult<Vec<Asset>> {
        let mut builder = QueryBuilder::new(format!(
            "SELECT {ASSET_COLUMNS} FROM assets WHERE status != 'deleted'"
        ));
        if let Some(category) = filters.category {
            builder.push(" AND category = ").push_bind(category.as_str());
        }
        if let Some(ref prefix) = filters.mime_prefix {
            builder
                .push(" AND mime_type LIKE ")
                .push_bind(format!("{}%", escape_like(prefix)))
                .push(" ESCAPE '\\'");
        }
        if let Some(after) = filters.captured_after {
            builder.push(" AND captured_at >= ").push_bind(after);
        }
        if let Some(before) = filters.captured_before {
            builder.push(" AND captured_at <= ").push_bind(before);
        }
        if let Some(kind) = filters.association_kind {
            builder
                .push(" AND association_kind = ")
                .push_bind(kind.as_str());
        }
        if let Some(ref assoc_id) = filters.association_id {
            builder
                .push(" AND association_id = ")
                .push_bind(assoc_id.clone());
        }
        if let Some(status) = filters.status {
            builder.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(ref created_by) = filters.created_by {
            builder
                .push(" AND created_by = ")
                .push_bind(created_by.clone());
        }
        // Id breaks capture-time ties so repeated searches order identically.
        builder.push(" ORDER BY captured_at DESC, id ASC");

        let rows = builder.build().fetch_all(&self.pool).await?;
        let mut assets = Vec::with_capacity(rows.len());
        for row in &rows {
            let asset = row_to_asset(row)?;
            if filters.matches_post(&asset) {
                assets.push(asset);
            }
        }
        Ok(assets)
    }

    /// Bytes counted against the storage quota: original plus compressed
    /// sizes of all non-deleted assets.
    pub async fn usage_total(&self) -> StoreResult<i64> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(size + COALESCE(compressed_size, 0)), 0) \
             FROM assets WHERE status != 'deleted'",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(total)
    }

    /// Aggregate statistics, optionally scoped to one owner. Sync counters
    /// are filled in by the caller from the queue repository.
    pub async fn statistics(&self, owner: Option<&str>) -> StoreResult<MediaStatistics> {
        let mut stats = MediaStatistics::default();
        let owner_clause = match owner {
            Some(_) => " AND created_by = ?",
            None => "",
        };

        let totals_sql = format!(
            "SELECT COUNT(*), COALESCE(SUM(size), 0), \
             COALESCE(SUM(COALESCE(compressed_size, 0)), 0), \
             COALESCE(SUM(size + COALESCE(compressed_size, 0)), 0) \
             FROM assets WHERE status != 'deleted'{owner_clause}"
        );
        let mut totals = sqlx::query(&totals_sql);
        if let Some(owner) = owner {
            totals = totals.bind(owner);
        }
        let row = totals.fetch_one(&self.pool).await?;
        stats.total_assets = row.get(0);
        stats.total_size = row.get(1);
        stats.total_compressed_size = row.get(2);
        stats.storage_used = row.get(3);
        stats.compression_savings = stats.total_size - stats.total_compressed_size;

        let by_category_sql = format!(
            "SELECT category, COUNT(*), COALESCE(SUM(size), 0) \
             FROM assets WHERE status != 'deleted'{owner_clause} GROUP BY category"
        );
        let mut by_category = sqlx::query(&by_category_sql);
        if let Some(owner) = owner {
            by_category = by_category.bind(owner);
        }
        for row in by_category.fetch_all(&self.pool).await? {
            let name: String = row.get(0);
            stats.by_category.insert(
                name,
                TypeBreakdown {
                    count: row.get(1),
                    size: row.get(2),
                },
            );
        }

        let by_mime_sql = format!(
            "SELECT mime_type, COUNT(*), COALESCE(SUM(size), 0) \
             FROM assets WHERE status != 'deleted'{owner_clause} GROUP BY mime_type"
        );
        let mut by_mime = sqlx::query(&by_mime_sql);
        if let Some(owner) = owner {
            by_mime = by_mime.bind(owner);
        }
        for row in by_mime.fetch_all(&self.pool).await? {
            let name: String = row.get(0);
            stats.by_mime_type.insert(
                name,
                TypeBreakdown {
                    count: row.get(1),
                    size: row.get(2),
                },
            );
        }

        Ok(stats)
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> StoreResult<String> {
    serde_json::to_string(value).map_err(|e| StoreError::Corrupt(e.to_string()))
}

fn from_json<T: serde::de::DeserializeOwned>(column: &str, raw: &str) -> StoreResult<T> {
    serde_json::from_str(raw).map_err(|e| StoreError::Corrupt(format!("{column}: {e}")))
}

fn parse_uuid(column: &str, raw: &str) -> StoreResult<Uuid> {
    Uuid::parse_str(raw).map_err(|e| StoreError::Corrupt(format!("{column}: {e}")))
}

pub(crate) fn escape_like(input: &str) -> String {
    input
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

fn row_to_asset(row: &SqliteRow) -> StoreResult<Asset> {
    let id: String = row.get("id");
    let kind_raw: String = row.get("kind");
    let kind = MediaKind::parse(&kind_raw)
        .ok_or_else(|| StoreError::Corrupt(format!("kind: {kind_raw}")))?;
    let category_raw: String = row.get("category");
    let category = AssetCategory::parse(&category_raw)
        .ok_or_else(|| StoreError::Corrupt(format!("category: {category_raw}")))?;
    let status_raw: String = row.get("status");
    let status = AssetStatus::parse(&status_raw)
        .ok_or_else(|| StoreError::Corrupt(format!("status: {status_raw}")))?;

    let width: Option<i64> = row.get("width");
    let height: Option<i64> = row.get("height");
    let dimensions = match (width, height) {
        (Some(w), Some(h)) => Some(Dimensions {
            width: w as u32,
            height: h as u32,
        }),
        _ => None,
    };

    let latitude: Option<f64> = row.get("latitude");
    let longitude: Option<f64> = row.get("longitude");
    let location = match (latitude, longitude) {
        (Some(latitude), Some(longitude)) => Some(GeoPoint {
            latitude,
            longitude,
            address: row.get("address"),
        }),
        _ => None,
    };

    let association_kind: Option<String> = row.get("association_kind");
    let association_id: Option<String> = row.get("association_id");
    let association = match (association_kind, association_id) {
        (Some(kind_raw), Some(id)) => {
            let kind = AssociationKind::parse(&kind_raw)
                .ok_or_else(|| StoreError::Corrupt(format!("association_kind: {kind_raw}")))?;
            Some(Association { kind, id })
        }
        _ => None,
    };

    let tags: String = row.get("tags");
    let derivative_errors: String = row.get("derivative_errors");
    let access_list: String = row.get("access_list");
    let metadata: Option<String> = row.get("metadata");
    let metadata = match metadata {
        Some(raw) => Some(from_json::<serde_json::Value>("metadata", &raw)?),
        None => None,
    };

    Ok(Asset {
        id: parse_uuid("id", &id)?,
        file_name: row.get("file_name"),
        original_name: row.get("original_name"),
        mime_type: row.get("mime_type"),
        kind,
        size: row.get("size"),
        compressed_size: row.get("compressed_size"),
        compression_ratio: row.get("compression_ratio"),
        dimensions,
        duration_secs: row.get("duration_secs"),
        category,
        tags: from_json::<Vec<String>>("tags", &tags)?,
        location,
        association,
        status,
        derivative_errors: from_json::<BTreeMap<String, String>>(
            "derivative_errors",
            &derivative_errors,
        )?,
        metadata,
        captured_at: row.get("captured_at"),
        uploaded_at: row.get("uploaded_at"),
        synced_at: row.get("synced_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        created_by: row.get("created_by"),
        is_public: row.get("is_public"),
        access_list: from_json::<Vec<String>>("access_list", &access_list)?,
    })
}
