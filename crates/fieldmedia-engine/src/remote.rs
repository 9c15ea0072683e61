//! Seam to the remote media backend.

use async_trait::async_trait;
use bytes::Bytes;
use fieldmedia_core::models::Asset;
use uuid::Uuid;

/// The remote side of synchronization. Implementations own transport,
/// authentication, and endpoint details; the replicator only cares whether a
/// call succeeded.
#[async_trait]
pub trait RemoteMediaService: Send + Sync {
    /// Push a new asset and its original bytes.
    async fn upload(&self, asset: &Asset, data: Bytes) -> anyhow::Result<()>;

    /// Push updated metadata for an already-uploaded asset.
    async fn update(&self, asset: &Asset) -> anyhow::Result<()>;

    /// Delete the asset remotely.
    async fn delete(&self, asset_id: Uuid) -> anyhow::Result<()>;
}
