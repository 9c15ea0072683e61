//! Filesystem content store for binary asset variants.
//!
//! Keys are flat (`"<asset_id>_<variant>"`) and validated against path
//! traversal before touching the filesystem.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use fieldmedia_core::models::ContentVariant;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::{StoreError, StoreResult};

#[derive(Clone)]
pub struct ContentStore {
    base_path: PathBuf,
}

impl ContentStore {
    /// Create the store, making the root directory if needed.
    pub async fn new(base_path: impl Into<PathBuf>) -> StoreResult<Self> {
        let base_path = base_path.into();
        fs::create_dir_all(&base_path).await?;
        Ok(Self { base_path })
    }

    fn key_to_path(&self, key: &str) -> StoreResult<PathBuf> {
        if key.is_empty()
            || key.contains("..")
            || key.contains('/')
            || key.contains('\\')
            || key.starts_with('.')
        {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(self.base_path.join(key))
    }

    pub async fn put(&self, key: &str, data: &[u8]) -> StoreResult<()> {
        let path = self.key_to_path(key)?;
        let mut file = fs::File::create(&path).await?;
        file.write_all(data).await?;
        file.sync_all().await?;
        tracing::debug!(key, size = data.len(), "content written");
        Ok(())
    }

    pub async fn get(&self, key: &str) -> StoreResult<Bytes> {
        let path = self.key_to_path(key)?;
        match fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StoreError::NotFound {
                entity: "content",
                id: key.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn exists(&self, key: &str) -> StoreResult<bool> {
        let path = self.key_to_path(key)?;
        Ok(fs::try_exists(&path).await?)
    }

    /// Delete a single variant; absent files are fine.
    pub async fn delete(&self, key: &str) -> StoreResult<()> {
        let path = self.key_to_path(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete every stored variant of an asset.
    pub async fn delete_all_for_asset(&self, asset_id: Uuid) -> StoreResult<()> {
        for variant in ContentVariant::ALL {
            self.delete(&variant.key(asset_id)).await?;
        }
        tracing::debug!(asset = %asset_id, "content variants removed");
        Ok(())
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }
}
