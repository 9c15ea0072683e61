//! Sync queue replicator: periodic and on-demand drains against the remote
//! media service.
//!
//! One task owns the drain loop, so passes never overlap: the timer tick and
//! the flush signal both funnel into the same serialized routine.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use fieldmedia_core::models::{ContentVariant, SyncOperation, SyncOperationKind};
use fieldmedia_core::MediaEvent;
use fieldmedia_store::StoreError;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::engine::EngineInner;

pub(crate) fn spawn(
    inner: Arc<EngineInner>,
    mut flush_rx: mpsc::Receiver<()>,
    mut shutdown_rx: mpsc::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(Duration::from_secs(inner.config.sync_interval_secs));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tracing::debug!("replicator started");
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    drain_if_connected(&inner).await;
                }
                signal = flush_rx.recv() => {
                    if signal.is_none() {
                        break;
                    }
                    drain_if_connected(&inner).await;
                }
                _ = shutdown_rx.recv() => {
                    tracing::debug!("replicator stopping");
                    break;
                }
            }
        }
    })
}

async fn drain_if_connected(inner: &Arc<EngineInner>) {
    if !inner.connected.load(Ordering::Relaxed) {
        return;
    }
    if let Err(e) = drain_once(inner).await {
        tracing::error!(error = %e, "replication pass failed");
    }
}

/// One pass: take up to the drain limit in priority order and apply each.
async fn drain_once(inner: &Arc<EngineInner>) -> Result<(), StoreError> {
    let queue = inner.store.sync_queue();
    let ops = queue.next_batch(inner.config.sync_drain_limit).await?;
    if ops.is_empty() {
        return Ok(());
    }
    tracing::debug!(count = ops.len(), "replication pass");

    for op in ops {
        match apply(inner, &op).await {
            Ok(()) => {
                queue.remove(op.id).await?;
                tracing::info!(
                    operation = %op.id,
                    asset = %op.asset_id,
                    kind = op.kind.as_str(),
                    "sync operation applied"
                );
            }
            Err(e) => {
                let reason = e.to_string();
                tracing::warn!(
                    operation = %op.id,
                    asset = %op.asset_id,
                    attempt = op.attempts + 1,
                    error = %reason,
                    "sync attempt failed"
                );
                queue.record_failure(op.id, &reason, Utc::now()).await?;
                if op.attempts + 1 >= op.max_attempts {
                    queue.mark_terminally_failed(op.id).await?;
                    // Reported once; the operation stays queued until
                    // acknowledged.
                    inner.events.emit(MediaEvent::SyncFailed {
                        operation_id: op.id,
                        asset_id: op.asset_id,
                        reason,
                    });
                }
            }
        }
    }
    Ok(())
}

async fn apply(inner: &Arc<EngineInner>, op: &SyncOperation) -> anyhow::Result<()> {
    match op.kind {
        SyncOperationKind::Upload => {
            let asset = inner.store.assets().get(op.asset_id).await?;
            let data = inner
                .content
                .get(&ContentVariant::Original.key(op.asset_id))
                .await?;
            inner.remote.upload(&asset, data).await?;
            inner
                .store
                .assets()
                .mark_synced(op.asset_id, Utc::now())
                .await?;
            inner.events.emit(MediaEvent::AssetSynced {
                asset_id: op.asset_id,
            });
        }
        SyncOperationKind::Update => {
            let asset = inner.store.assets().get(op.asset_id).await?;
            inner.remote.update(&asset).await?;
            inner
                .store
                .assets()
                .mark_synced(op.asset_id, Utc::now())
                .await?;
            inner.events.emit(MediaEvent::AssetSynced {
                asset_id: op.asset_id,
            });
        }
        SyncOperationKind::Delete => {
            inner.remote.delete(op.asset_id).await?;
            // Blobs and the row only go once the remote confirmed.
            inner.content.delete_all_for_asset(op.asset_id).await?;
            inner.store.assets().delete(op.asset_id).await?;
        }
    }
    Ok(())
}
