//! Batch orchestrator: bounded-concurrency ingestion of a file group.

use std::future::Future;
use std::sync::Arc;

use fieldmedia_core::models::{batch_progress, BatchStatus, IngestOptions, MediaFile};
use fieldmedia_core::MediaEvent;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use uuid::Uuid;

use crate::engine::EngineInner;

/// Run the futures produced by `make` with at most `limit` in flight.
/// Results stream out in completion order, tagged with the item index.
pub(crate) fn run_bounded<T, R, F, Fut>(
    limit: usize,
    items: Vec<T>,
    make: F,
) -> mpsc::Receiver<(usize, R)>
where
    T: Send + 'static,
    R: Send + 'static,
    F: Fn(usize, T) -> Fut,
    Fut: Future<Output = R> + Send + 'static,
{
    let (tx, rx) = mpsc::channel(limit.max(1));
    let semaphore = Arc::new(Semaphore::new(limit.max(1)));
    let mut set = JoinSet::new();
    for (index, item) in items.into_iter().enumerate() {
        let fut = make(index, item);
        let semaphore = semaphore.clone();
        set.spawn(async move {
            let _permit = semaphore.acquire_owned().await.ok();
            (index, fut.await)
        });
    }
    tokio::spawn(async move {
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(result) => {
                    if tx.send(result).await.is_err() {
                        break;
                    }
                }
                Err(e) => tracing::error!(error = %e, "batch item task aborted"),
            }
        }
    });
    rx
}

/// Process one batch to completion. Spawned by `ingest_batch`; never fails
/// the caller, all item errors land in the batch record.
pub(crate) async fn run_batch(
    inner: Arc<EngineInner>,
    batch_id: Uuid,
    files: Vec<MediaFile>,
    options: IngestOptions,
) {
    let total = files.len() as i64;

    let make = {
        let inner = inner.clone();
        move |_index: usize, file: MediaFile| {
            let inner = inner.clone();
            let options = options.clone();
            async move {
                inner
                    .ingest(file, options)
                    .await
                    .map(|asset| asset.id)
                    .map_err(|e| e.to_string())
            }
        }
    };

    let mut completed: i64 = 0;
    let mut asset_ids: Vec<Uuid> = Vec::new();
    let mut errors: Vec<String> = Vec::new();
    let batches = inner.store.batches();

    let mut results = run_bounded(inner.config.batch_concurrency, files, make);
    while let Some((index, result)) = results.recv().await {
        completed += 1;
        match result {
            Ok(asset_id) => asset_ids.push(asset_id),
            Err(reason) => errors.push(format!("file {}: {}", index + 1, reason)),
        }
        let progress = batch_progress(completed, total);
        // A failed progress write is logged and retried implicitly by the
        // next item's write or by completion.
        if let Err(e) = batches
            .update_progress(batch_id, progress, &asset_ids, &errors)
            .await
        {
            tracing::error!(batch = %batch_id, error = %e, "progress persist failed");
        }
        inner
            .events
            .emit(MediaEvent::BatchProgress { batch_id, progress });
    }

    let status = if errors.is_empty() {
        BatchStatus::Completed
    } else {
        BatchStatus::Failed
    };
    if let Err(e) = batches
        .complete(batch_id, status, &asset_ids, &errors, chrono::Utc::now())
        .await
    {
        tracing::error!(batch = %batch_id, error = %e, "batch completion persist failed");
        return;
    }

    match batches.get(batch_id).await {
        Ok(batch) => {
            tracing::info!(
                batch = %batch_id,
                succeeded = batch.asset_ids.len(),
                failed = batch.errors.len(),
                "batch finished"
            );
            inner.events.emit(MediaEvent::BatchCompleted(batch));
        }
        Err(e) => tracing::error!(batch = %batch_id, error = %e, "batch reload failed"),
    }
}
