//! Typed lifecycle events.
//!
//! Events are published on a `tokio::sync::broadcast` channel wrapped in
//! [`EventBus`]; each event carries a statically known payload rather than a
//! name/payload pair. Emission never blocks and never fails the operation
//! that produced the event: with no live subscribers the event is dropped.

use tokio::sync::broadcast;
use uuid::Uuid;

use crate::models::{Asset, Batch, CompressionSettings};

/// Lifecycle events emitted by the engine.
#[derive(Debug, Clone)]
pub enum MediaEvent {
    AssetIngested(Asset),
    IngestionFailed {
        file_name: String,
        reason: String,
    },
    BatchProgress {
        batch_id: Uuid,
        progress: i64,
    },
    BatchCompleted(Batch),
    AssetDeleted {
        asset_id: Uuid,
    },
    AssetUpdated(Asset),
    AssetSynced {
        asset_id: Uuid,
    },
    SyncFailed {
        operation_id: Uuid,
        asset_id: Uuid,
        reason: String,
    },
    SettingsUpdated(CompressionSettings),
}

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Broadcast bus for [`MediaEvent`]s.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<MediaEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Subscribe to all subsequent events.
    pub fn subscribe(&self) -> broadcast::Receiver<MediaEvent> {
        self.tx.subscribe()
    }

    /// Publish an event. A send error only means there are no subscribers.
    pub fn emit(&self, event: MediaEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("event dropped: no subscribers");
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_events() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        let id = Uuid::new_v4();
        bus.emit(MediaEvent::AssetDeleted { asset_id: id });

        match rx.recv().await.unwrap() {
            MediaEvent::AssetDeleted { asset_id } => assert_eq!(asset_id, id),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn emit_without_subscribers_is_fine() {
        let bus = EventBus::new();
        bus.emit(MediaEvent::BatchProgress {
            batch_id: Uuid::new_v4(),
            progress: 50,
        });
    }
}
