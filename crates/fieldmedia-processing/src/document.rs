//! Document derivative strategy. Stored as-is: compression and page preview
//! need a renderer this build does not carry, so both fail explicitly.

use bytes::Bytes;
use fieldmedia_core::models::{CompressionSettings, MediaFile};
use fieldmedia_core::DerivativeError;

use crate::pipeline::{CompressedOutput, DerivativeStrategy};

pub struct DocumentStrategy;

impl DerivativeStrategy for DocumentStrategy {
    fn compress(
        &self,
        _file: &MediaFile,
        _settings: &CompressionSettings,
    ) -> Result<CompressedOutput, DerivativeError> {
        Err(DerivativeError::Unimplemented(
            "document compression".to_string(),
        ))
    }

    fn thumbnail(
        &self,
        _file: &MediaFile,
        _settings: &CompressionSettings,
    ) -> Result<Bytes, DerivativeError> {
        Err(DerivativeError::Unimplemented(
            "document thumbnail".to_string(),
        ))
    }

    fn preview(
        &self,
        _file: &MediaFile,
        _settings: &CompressionSettings,
    ) -> Result<Bytes, DerivativeError> {
        Err(DerivativeError::Unimplemented(
            "document preview".to_string(),
        ))
    }

    fn extract_metadata(&self, file: &MediaFile) -> serde_json::Value {
        serde_json::json!({ "byte_size": file.data.len() })
    }
}
