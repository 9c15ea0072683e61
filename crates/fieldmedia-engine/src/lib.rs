//! FieldMedia engine: offline-first media ingestion, derivative generation,
//! and synchronization for field-service applications.
//!
//! The [`MediaEngine`] is the single public entry point. It owns the SQLite
//! store, the filesystem content store, the derivative pipeline, a
//! semaphore-bounded batch orchestrator, and a background replicator that
//! drains the sync queue against a [`RemoteMediaService`] while connected.

mod batch;
mod engine;
mod error;
mod remote;
mod replicator;

pub use engine::MediaEngine;
pub use error::{EngineError, EngineResult};
pub use remote::RemoteMediaService;

pub use fieldmedia_core::models;
pub use fieldmedia_core::{
    AdmissionError, DerivativeError, EngineConfig, EventBus, MediaEvent,
};
pub use fieldmedia_store::{ContentStore, MediaStore, StoreError};
