//! Engine-level errors.

use fieldmedia_core::AdmissionError;
use fieldmedia_store::StoreError;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Admission(#[from] AdmissionError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("asset {0} not found")]
    AssetNotFound(Uuid),

    #[error("batch {0} not found")]
    BatchNotFound(Uuid),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type EngineResult<T> = Result<T, EngineError>;
