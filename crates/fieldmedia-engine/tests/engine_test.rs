//! End-to-end engine tests against an in-process mock remote.

use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use fieldmedia_engine::models::{
    Asset, AssetCategory, AssetStatus, BatchStatus, ContentVariant, IngestOptions, MediaFile,
    SearchFilters,
};
use fieldmedia_engine::{
    AdmissionError, ContentStore, EngineConfig, EngineError, MediaEngine, MediaEvent, MediaStore,
    RemoteMediaService,
};
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use tokio::sync::broadcast;
use uuid::Uuid;

#[derive(Default)]
struct MockRemote {
    uploads: AtomicUsize,
    updates: AtomicUsize,
    deletes: AtomicUsize,
    /// Remaining upload calls to fail; `usize::MAX` fails forever.
    fail_uploads: AtomicUsize,
}

#[async_trait]
impl RemoteMediaService for MockRemote {
    async fn upload(&self, _asset: &Asset, _data: Bytes) -> anyhow::Result<()> {
        let remaining = self.fail_uploads.load(Ordering::SeqCst);
        if remaining > 0 {
            if remaining != usize::MAX {
                self.fail_uploads.fetch_sub(1, Ordering::SeqCst);
            }
            anyhow::bail!("remote unavailable");
        }
        self.uploads.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn update(&self, _asset: &Asset) -> anyhow::Result<()> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn delete(&self, _asset_id: Uuid) -> anyhow::Result<()> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

async fn engine_with(remote: Arc<MockRemote>) -> (tempfile::TempDir, MediaEngine) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
    let dir = tempfile::tempdir().unwrap();
    let store = MediaStore::open(dir.path().join("media.db")).await.unwrap();
    let content = ContentStore::new(dir.path().join("content")).await.unwrap();
    let engine = MediaEngine::new(store, content, remote, EngineConfig::default());
    (dir, engine)
}

fn noise_jpeg(width: u32, height: u32) -> MediaFile {
    let mut seed: u32 = 0xdeadbeef;
    let img = RgbaImage::from_fn(width, height, |_, _| {
        seed = seed.wrapping_mul(1664525).wrapping_add(1013904223);
        let b = seed.to_le_bytes();
        Rgba([b[0], b[1], b[2], 255])
    });
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(DynamicImage::ImageRgba8(img).to_rgb8())
        .write_to(&mut buf, ImageFormat::Jpeg)
        .unwrap();
    MediaFile::new("site-photo.jpg", "image/jpeg", Bytes::from(buf.into_inner()))
}

fn solid_png(width: u32, height: u32, name: &str) -> MediaFile {
    let img = RgbaImage::from_pixel(width, height, Rgba([30, 60, 90, 255]));
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(img)
        .write_to(&mut buf, ImageFormat::Png)
        .unwrap();
    MediaFile::new(name, "image/png", Bytes::from(buf.into_inner()))
}

async fn wait_for_event<F>(rx: &mut broadcast::Receiver<MediaEvent>, matcher: F) -> MediaEvent
where
    F: Fn(&MediaEvent) -> bool,
{
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            let event = rx.recv().await.unwrap();
            if matcher(&event) {
                return event;
            }
        }
    })
    .await
    .expect("event not observed in time")
}

#[tokio::test]
async fn ingest_produces_derivatives_and_ready_asset() {
    let remote = Arc::new(MockRemote::default());
    let (_dir, engine) = engine_with(remote).await;

    let file = noise_jpeg(1024, 768);
    let options = IngestOptions {
        category: AssetCategory::WorkOrderPhoto,
        tags: vec!["roof".into()],
        created_by: "tech-1".into(),
        ..Default::default()
    };
    let asset = engine.ingest(file, options).await.unwrap();

    assert_eq!(asset.status, AssetStatus::Ready);
    assert_eq!(asset.category, AssetCategory::WorkOrderPhoto);
    let dims = asset.dimensions.unwrap();
    assert_eq!((dims.width, dims.height), (1024, 768));
    assert!(asset.compression_ratio.unwrap() >= 0);
    assert!(asset.compressed_size.is_some());
    assert!(asset.derivative_errors.is_empty());
    let metadata = asset.metadata.unwrap();
    assert_eq!(metadata["width"], 1024);

    for variant in [
        ContentVariant::Original,
        ContentVariant::Compressed,
        ContentVariant::Thumbnail,
        ContentVariant::Preview,
    ] {
        let data = engine.get_content(asset.id, variant).await.unwrap();
        assert!(!data.is_empty());
    }

    // Thumbnail is the configured square.
    let thumb = engine
        .get_content(asset.id, ContentVariant::Thumbnail)
        .await
        .unwrap();
    let decoded = image::load_from_memory(&thumb).unwrap();
    assert_eq!(image::GenericImageView::dimensions(&decoded), (200, 200));

    let stats = engine.get_statistics(None).await.unwrap();
    assert_eq!(stats.total_assets, 1);
    assert_eq!(stats.pending_sync, 1);
}

#[tokio::test]
async fn quota_exhaustion_rejects_before_persisting() {
    let remote = Arc::new(MockRemote::default());
    let (_dir, engine) = engine_with(remote).await;

    // Measure one file's footprint, then leave room for three of them.
    engine
        .ingest(solid_png(64, 64, "probe.png"), IngestOptions::default())
        .await
        .unwrap();
    let footprint = engine.get_statistics(None).await.unwrap().storage_used;
    assert!(footprint > 0);
    engine.set_storage_quota(footprint * 3 + 10);

    let mut rx = engine.subscribe();
    let mut accepted = 1;
    let mut rejected = 0;
    for i in 0..4 {
        let name = format!("photo-{i}.png");
        match engine
            .ingest(solid_png(64, 64, &name), IngestOptions::default())
            .await
        {
            Ok(_) => accepted += 1,
            Err(err) => {
                assert!(matches!(
                    err,
                    EngineError::Admission(AdmissionError::QuotaExceeded { .. })
                ));
                rejected += 1;
            }
        }
    }
    assert_eq!(accepted, 3);
    assert_eq!(rejected, 2);

    let event = wait_for_event(&mut rx, |e| matches!(e, MediaEvent::IngestionFailed { .. })).await;
    match event {
        MediaEvent::IngestionFailed { reason, .. } => assert!(reason.contains("quota")),
        _ => unreachable!(),
    }

    // Nothing from the rejected files was persisted.
    let stats = engine.get_statistics(None).await.unwrap();
    assert_eq!(stats.total_assets, 3);
    assert!(stats.storage_used <= footprint * 3 + 10);
}

#[tokio::test]
async fn compressed_variant_is_dropped_when_quota_is_tight() {
    // Learn the file's original and compressed sizes on an unconstrained
    // engine first.
    let remote = Arc::new(MockRemote::default());
    let (_dir, engine) = engine_with(remote).await;
    let probe = engine
        .ingest(noise_jpeg(256, 256), IngestOptions::default())
        .await
        .unwrap();
    let original = probe.size;
    let compressed = probe.compressed_size.unwrap();
    assert!(compressed > 1);

    // Room for the original but not for the compressed variant on top.
    let remote = Arc::new(MockRemote::default());
    let (_dir, engine) = engine_with(remote).await;
    engine.set_storage_quota(original + compressed / 2);

    let asset = engine
        .ingest(noise_jpeg(256, 256), IngestOptions::default())
        .await
        .unwrap();
    assert_eq!(asset.status, AssetStatus::Ready);
    assert!(asset.compressed_size.is_none());
    assert!(asset.compression_ratio.is_none());
    assert!(asset.derivative_errors["compressed"].contains("quota"));

    assert!(engine
        .get_content(asset.id, ContentVariant::Original)
        .await
        .is_ok());
    assert!(matches!(
        engine
            .get_content(asset.id, ContentVariant::Compressed)
            .await,
        Err(EngineError::AssetNotFound(_))
    ));

    let stats = engine.get_statistics(None).await.unwrap();
    assert!(stats.storage_used <= stats.storage_quota);
}

#[tokio::test]
async fn batch_completes_with_labeled_errors() {
    let remote = Arc::new(MockRemote::default());
    let (_dir, engine) = engine_with(remote).await;
    let mut rx = engine.subscribe();

    let files = vec![
        solid_png(32, 32, "a.png"),
        solid_png(32, 32, "b.png"),
        solid_png(32, 32, "c.png"),
        MediaFile::new("broken.png", "image/png", Bytes::from_static(b"not an image")),
    ];
    let batch_id = engine
        .ingest_batch(files, IngestOptions::default())
        .await
        .unwrap();

    let event = wait_for_event(&mut rx, |e| matches!(e, MediaEvent::BatchCompleted(_))).await;
    let completed = match event {
        MediaEvent::BatchCompleted(batch) => batch,
        _ => unreachable!(),
    };
    assert_eq!(completed.id, batch_id);
    assert_eq!(completed.progress, 100);
    assert_eq!(completed.status, BatchStatus::Failed);
    assert_eq!(completed.asset_ids.len(), 3);
    assert_eq!(completed.errors.len(), 1);
    assert!(completed.errors[0].starts_with("file 4:"));

    let reloaded = engine.get_batch(batch_id).await.unwrap();
    assert_eq!(reloaded.status, BatchStatus::Failed);
    assert_eq!(reloaded.asset_ids.len(), 3);

    // Every produced asset is queryable, and repeated identical searches
    // return identical, stably ordered results.
    let found = engine.search(&SearchFilters::default()).await.unwrap();
    assert_eq!(found.len(), 3);
    let again = engine.search(&SearchFilters::default()).await.unwrap();
    let ids: Vec<Uuid> = found.iter().map(|a| a.id).collect();
    let ids_again: Vec<Uuid> = again.iter().map(|a| a.id).collect();
    assert_eq!(ids, ids_again);
}

#[tokio::test]
async fn retries_terminate_with_single_failure_event() {
    let remote = Arc::new(MockRemote {
        fail_uploads: AtomicUsize::new(usize::MAX),
        ..Default::default()
    });
    let (_dir, engine) = engine_with(remote.clone()).await;

    let asset = engine
        .ingest(solid_png(32, 32, "doomed.png"), IngestOptions::default())
        .await
        .unwrap();

    let mut rx = engine.subscribe();
    engine.set_connected(true);
    engine.flush_now();
    engine.flush_now();

    let event = wait_for_event(&mut rx, |e| matches!(e, MediaEvent::SyncFailed { .. })).await;
    let operation_id = match event {
        MediaEvent::SyncFailed {
            operation_id,
            asset_id,
            reason,
        } => {
            assert_eq!(asset_id, asset.id);
            assert!(reason.contains("remote unavailable"));
            operation_id
        }
        _ => unreachable!(),
    };

    // Further passes neither retry nor re-report the terminal operation.
    engine.flush_now();
    tokio::time::sleep(Duration::from_millis(300)).await;
    while let Ok(extra) = rx.try_recv() {
        assert!(
            !matches!(extra, MediaEvent::SyncFailed { .. }),
            "terminal failure reported twice"
        );
    }

    let failed = engine.failed_sync_operations().await.unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].id, operation_id);
    assert_eq!(failed[0].attempts, 3);
    assert!(failed[0].terminally_failed);

    engine.acknowledge_sync_failure(operation_id).await.unwrap();
    assert!(engine.failed_sync_operations().await.unwrap().is_empty());
    assert_eq!(remote.uploads.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn delete_round_trip_removes_remote_then_local() {
    let remote = Arc::new(MockRemote::default());
    let (_dir, engine) = engine_with(remote.clone()).await;

    let asset = engine
        .ingest(solid_png(32, 32, "gone.png"), IngestOptions::default())
        .await
        .unwrap();

    let mut rx = engine.subscribe();
    engine.set_connected(true);
    wait_for_event(&mut rx, |e| matches!(e, MediaEvent::AssetSynced { .. })).await;
    assert_eq!(remote.uploads.load(Ordering::SeqCst), 1);
    assert_eq!(
        engine.get_asset(asset.id).await.unwrap().status,
        AssetStatus::Synced
    );

    engine.delete_asset(asset.id).await.unwrap();
    assert_eq!(
        engine.get_asset(asset.id).await.unwrap().status,
        AssetStatus::Deleted
    );
    // Blobs survive until the remote delete is confirmed.
    assert!(engine
        .get_content(asset.id, ContentVariant::Original)
        .await
        .is_ok());

    engine.flush_now();
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            match engine.get_asset(asset.id).await {
                Err(EngineError::AssetNotFound(_)) => break,
                _ => tokio::time::sleep(Duration::from_millis(50)).await,
            }
        }
    })
    .await
    .expect("asset row not removed after remote delete");

    assert_eq!(remote.deletes.load(Ordering::SeqCst), 1);
    assert!(matches!(
        engine.get_content(asset.id, ContentVariant::Original).await,
        Err(EngineError::AssetNotFound(_))
    ));
}

#[tokio::test]
async fn metadata_update_queues_remote_propagation() {
    let remote = Arc::new(MockRemote::default());
    let (_dir, engine) = engine_with(remote.clone()).await;

    let asset = engine
        .ingest(solid_png(32, 32, "note.png"), IngestOptions::default())
        .await
        .unwrap();

    let updated = engine
        .update_asset_metadata(
            asset.id,
            fieldmedia_engine::models::AssetMetadataUpdate {
                category: Some(AssetCategory::Receipt),
                tags: Some(vec!["expense".into()]),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.category, AssetCategory::Receipt);
    assert_eq!(updated.tags, vec!["expense".to_string()]);

    let stats = engine.get_statistics(None).await.unwrap();
    // Upload plus update are both pending.
    assert_eq!(stats.pending_sync, 2);

    let mut rx = engine.subscribe();
    engine.set_connected(true);
    wait_for_event(&mut rx, |e| matches!(e, MediaEvent::AssetSynced { .. })).await;
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            if engine.get_statistics(None).await.unwrap().pending_sync == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    })
    .await
    .expect("sync queue did not drain");
    assert_eq!(remote.uploads.load(Ordering::SeqCst), 1);
    assert_eq!(remote.updates.load(Ordering::SeqCst), 1);
}
