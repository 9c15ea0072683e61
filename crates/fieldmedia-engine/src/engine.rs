//! The `MediaEngine` facade: ingestion, queries, settings, and lifecycle
//! control over the replicator.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;

use anyhow::Context;
use bytes::Bytes;
use chrono::Utc;
use fieldmedia_core::models::{
    Asset, AssetMetadataUpdate, AssetStatus, Batch, CompressionSettings, CompressionSettingsUpdate,
    ContentVariant, IngestOptions, MediaFile, MediaStatistics, SearchFilters, SyncOperation,
    SyncOperationKind, SyncPriority, compression_ratio,
};
use fieldmedia_core::{EngineConfig, EventBus, MediaEvent};
use fieldmedia_processing::{AdmissionController, DerivativePipeline};
use fieldmedia_store::{ContentStore, MediaStore, StoreError};
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

use crate::batch;
use crate::error::{EngineError, EngineResult};
use crate::remote::RemoteMediaService;
use crate::replicator;

pub(crate) struct EngineInner {
    pub(crate) store: MediaStore,
    pub(crate) content: ContentStore,
    pub(crate) remote: Arc<dyn RemoteMediaService>,
    pub(crate) config: EngineConfig,
    pub(crate) settings: RwLock<CompressionSettings>,
    pub(crate) quota: AtomicI64,
    pub(crate) events: EventBus,
    pub(crate) connected: AtomicBool,
}

/// Offline-first media engine. Cheap to clone; all clones share state.
#[derive(Clone)]
pub struct MediaEngine {
    inner: Arc<EngineInner>,
    flush_tx: mpsc::Sender<()>,
    shutdown_tx: mpsc::Sender<()>,
}

impl MediaEngine {
    /// Build the engine and start its replicator. The engine starts
    /// disconnected; call [`set_connected`](Self::set_connected) once the
    /// remote is reachable.
    pub fn new(
        store: MediaStore,
        content: ContentStore,
        remote: Arc<dyn RemoteMediaService>,
        config: EngineConfig,
    ) -> Self {
        let quota = AtomicI64::new(config.storage_quota_bytes);
        let inner = Arc::new(EngineInner {
            store,
            content,
            remote,
            config,
            settings: RwLock::new(CompressionSettings::default()),
            quota,
            events: EventBus::new(),
            connected: AtomicBool::new(false),
        });

        let (flush_tx, flush_rx) = mpsc::channel(8);
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let _replicator = replicator::spawn(inner.clone(), flush_rx, shutdown_rx);

        Self {
            inner,
            flush_tx,
            shutdown_tx,
        }
    }

    /// Ingest a single file: admission, persistence, derivatives, sync
    /// enqueue. Returns the Ready asset.
    pub async fn ingest(&self, file: MediaFile, options: IngestOptions) -> EngineResult<Asset> {
        self.inner.ingest(file, options).await
    }

    /// Start a batch ingestion and return its id immediately. Items run
    /// under the configured concurrency bound; progress is observable via
    /// [`get_batch`](Self::get_batch) and `BatchProgress` events.
    pub async fn ingest_batch(
        &self,
        files: Vec<MediaFile>,
        options: IngestOptions,
    ) -> EngineResult<Uuid> {
        let batch = Batch::new(files.len() as i64, options.clone());
        self.inner.store.batches().insert(&batch).await?;
        tracing::info!(batch = %batch.id, total = batch.total, "batch ingestion started");
        tokio::spawn(batch::run_batch(
            self.inner.clone(),
            batch.id,
            files,
            options,
        ));
        Ok(batch.id)
    }

    pub async fn get_asset(&self, id: Uuid) -> EngineResult<Asset> {
        map_asset_not_found(self.inner.store.assets().get(id).await, id)
    }

    /// Fetch one stored binary variant of an asset.
    pub async fn get_content(&self, id: Uuid, variant: ContentVariant) -> EngineResult<Bytes> {
        match self.inner.content.get(&variant.key(id)).await {
            Ok(data) => Ok(data),
            Err(StoreError::NotFound { .. }) => Err(EngineError::AssetNotFound(id)),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn search(&self, filters: &SearchFilters) -> EngineResult<Vec<Asset>> {
        Ok(self.inner.store.assets().search(filters).await?)
    }

    /// Aggregate statistics, optionally scoped to one owner. Queue counters
    /// and the quota always reflect the whole engine.
    pub async fn get_statistics(&self, owner: Option<&str>) -> EngineResult<MediaStatistics> {
        let mut stats = self.inner.store.assets().statistics(owner).await?;
        let queue = self.inner.store.sync_queue();
        stats.pending_sync = queue.pending_count().await?;
        stats.sync_errors = queue.error_count().await?;
        stats.storage_quota = self.inner.quota.load(Ordering::Relaxed);
        Ok(stats)
    }

    /// Mark the asset deleted locally and enqueue the remote delete at high
    /// priority. Blobs stay on disk until the remote delete applies.
    pub async fn delete_asset(&self, id: Uuid) -> EngineResult<()> {
        let asset = self.get_asset(id).await?;
        if asset.status == AssetStatus::Deleted {
            return Ok(());
        }
        self.inner
            .store
            .assets()
            .update_status(id, AssetStatus::Deleted)
            .await?;
        // A pending upload or update for a deleted asset is moot.
        self.inner.store.sync_queue().remove_for_asset(id).await?;
        let op = SyncOperation::new(
            SyncOperationKind::Delete,
            id,
            SyncPriority::High,
            self.inner.config.sync_max_attempts,
            serde_json::json!({ "asset_id": id }),
        );
        self.inner.store.sync_queue().enqueue(&op).await?;
        tracing::info!(asset = %id, "asset deleted locally, remote delete queued");
        self.inner.events.emit(MediaEvent::AssetDeleted { asset_id: id });
        Ok(())
    }

    /// Apply a partial metadata update and enqueue remote propagation.
    pub async fn update_asset_metadata(
        &self,
        id: Uuid,
        update: AssetMetadataUpdate,
    ) -> EngineResult<Asset> {
        let mut asset = self.get_asset(id).await?;
        if let Some(category) = update.category {
            asset.category = category;
        }
        if let Some(tags) = update.tags {
            asset.tags = tags;
        }
        if let Some(location) = update.location {
            asset.location = Some(location);
        }
        if let Some(association) = update.association {
            asset.association = Some(association);
        }
        if let Some(is_public) = update.is_public {
            asset.is_public = is_public;
        }
        if let Some(access_list) = update.access_list {
            asset.access_list = access_list;
        }
        if let Some(captured_at) = update.captured_at {
            asset.captured_at = captured_at;
        }
        asset.updated_at = Utc::now();
        self.inner.store.assets().update(&asset).await?;

        let op = SyncOperation::new(
            SyncOperationKind::Update,
            id,
            SyncPriority::Normal,
            self.inner.config.sync_max_attempts,
            serde_json::json!({ "asset_id": id }),
        );
        self.inner.store.sync_queue().enqueue(&op).await?;
        self.inner.events.emit(MediaEvent::AssetUpdated(asset.clone()));
        Ok(asset)
    }

    pub async fn get_batch(&self, id: Uuid) -> EngineResult<Batch> {
        match self.inner.store.batches().get(id).await {
            Ok(batch) => Ok(batch),
            Err(StoreError::NotFound { .. }) => Err(EngineError::BatchNotFound(id)),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get_compression_settings(&self) -> CompressionSettings {
        self.inner.settings.read().await.clone()
    }

    pub async fn update_compression_settings(
        &self,
        update: CompressionSettingsUpdate,
    ) -> CompressionSettings {
        let mut settings = self.inner.settings.write().await;
        settings.apply(update);
        let snapshot = settings.clone();
        drop(settings);
        self.inner
            .events
            .emit(MediaEvent::SettingsUpdated(snapshot.clone()));
        snapshot
    }

    /// Change the storage quota at runtime. Takes effect on the next
    /// admission check; existing assets are never evicted.
    pub fn set_storage_quota(&self, bytes: i64) {
        self.inner.quota.store(bytes, Ordering::Relaxed);
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<MediaEvent> {
        self.inner.events.subscribe()
    }

    /// Terminally failed operations awaiting acknowledgement.
    pub async fn failed_sync_operations(&self) -> EngineResult<Vec<SyncOperation>> {
        Ok(self.inner.store.sync_queue().failed().await?)
    }

    /// Drop an acknowledged terminal failure from the queue.
    pub async fn acknowledge_sync_failure(&self, operation_id: Uuid) -> EngineResult<()> {
        Ok(self
            .inner
            .store
            .sync_queue()
            .acknowledge_failed(operation_id)
            .await?)
    }

    /// Ask the replicator for an immediate pass. A full signal queue means a
    /// pass is already coming.
    pub fn flush_now(&self) {
        let _ = self.flush_tx.try_send(());
    }

    pub fn set_connected(&self, connected: bool) {
        self.inner.connected.store(connected, Ordering::Relaxed);
        if connected {
            self.flush_now();
        }
    }

    /// Connectivity regained: resume replication and flush immediately.
    pub fn notify_reconnected(&self) {
        self.set_connected(true);
    }

    /// Stop the replicator. In-flight operations finish their current pass.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.try_send(());
    }
}

impl EngineInner {
    pub(crate) async fn ingest(
        self: &Arc<Self>,
        file: MediaFile,
        options: IngestOptions,
    ) -> EngineResult<Asset> {
        let settings = self.settings.read().await.clone();
        let usage = self.store.assets().usage_total().await?;
        let mut config = self.config.clone();
        config.storage_quota_bytes = self.quota.load(Ordering::Relaxed);

        if let Err(e) = AdmissionController::check(&file, usage, &config, &settings) {
            tracing::warn!(file = %file.file_name, error = %e, "ingestion rejected");
            self.events.emit(MediaEvent::IngestionFailed {
                file_name: file.file_name.clone(),
                reason: e.to_string(),
            });
            return Err(e.into());
        }

        let now = Utc::now();
        let id = Uuid::new_v4();
        let extension = file
            .file_name
            .rsplit_once('.')
            .map(|(_, ext)| format!(".{ext}"))
            .unwrap_or_default();
        let mut asset = Asset {
            id,
            file_name: format!("{id}{extension}"),
            original_name: file.file_name.clone(),
            mime_type: file.mime_type.clone(),
            kind: file.kind(),
            size: file.data.len() as i64,
            compressed_size: None,
            compression_ratio: None,
            dimensions: file.dimensions,
            duration_secs: file.duration_secs,
            category: options.category,
            tags: options.tags.clone(),
            location: options.location.clone(),
            association: options.association.clone(),
            status: AssetStatus::Processing,
            derivative_errors: BTreeMap::new(),
            metadata: None,
            captured_at: options.captured_at.unwrap_or(now),
            uploaded_at: now,
            synced_at: None,
            created_at: now,
            updated_at: now,
            created_by: options.created_by.clone(),
            is_public: options.is_public,
            access_list: Vec::new(),
        };
        self.store.assets().insert(&asset).await?;

        let pipeline_file = file.clone();
        let pipeline_options = options.clone();
        let pipeline_settings = settings.clone();
        let mut output = tokio::task::spawn_blocking(move || {
            DerivativePipeline::run(&pipeline_file, &pipeline_options, &pipeline_settings)
        })
        .await
        .context("derivative pipeline task failed")?;

        self.content
            .put(&ContentVariant::Original.key(id), &file.data)
            .await?;
        if let Some(compressed) = output.compressed.take() {
            // The admission check only covered the original. The usage total
            // already includes this asset's row, so the compressed variant
            // must fit in what remains of the quota or be dropped.
            let requested = compressed.data.len() as i64;
            let used = self.store.assets().usage_total().await?;
            let quota = config.storage_quota_bytes;
            if used + requested > quota {
                tracing::warn!(
                    asset = %id,
                    used,
                    requested,
                    quota,
                    "compressed variant dropped to stay within the storage quota"
                );
                output.errors.insert(
                    "compressed".to_string(),
                    format!(
                        "storage quota exceeded: {used} used + {requested} requested > {quota} quota"
                    ),
                );
            } else {
                self.content
                    .put(&ContentVariant::Compressed.key(id), &compressed.data)
                    .await?;
                asset.compressed_size = Some(requested);
                asset.compression_ratio = Some(compression_ratio(asset.size, requested));
            }
        }
        if let Some(ref thumbnail) = output.thumbnail {
            self.content
                .put(&ContentVariant::Thumbnail.key(id), thumbnail)
                .await?;
        }
        if let Some(ref preview) = output.preview {
            self.content
                .put(&ContentVariant::Preview.key(id), preview)
                .await?;
        }

        if output.dimensions.is_some() {
            asset.dimensions = output.dimensions;
        }
        if output.duration_secs.is_some() {
            asset.duration_secs = output.duration_secs;
        }
        asset.metadata = output.metadata;
        asset.derivative_errors = output.errors;
        asset.status = AssetStatus::Ready;
        asset.updated_at = Utc::now();
        self.store.assets().update(&asset).await?;

        let op = SyncOperation::new(
            SyncOperationKind::Upload,
            id,
            SyncPriority::Normal,
            self.config.sync_max_attempts,
            serde_json::json!({ "asset_id": id }),
        );
        self.store.sync_queue().enqueue(&op).await?;

        tracing::info!(
            asset = %id,
            size = asset.size,
            compressed = asset.compressed_size.unwrap_or(0),
            "asset ingested"
        );
        self.events.emit(MediaEvent::AssetIngested(asset.clone()));
        Ok(asset)
    }
}

fn map_asset_not_found(result: Result<Asset, StoreError>, id: Uuid) -> EngineResult<Asset> {
    match result {
        Ok(asset) => Ok(asset),
        Err(StoreError::NotFound { .. }) => Err(EngineError::AssetNotFound(id)),
        Err(e) => Err(e.into()),
    }
}
