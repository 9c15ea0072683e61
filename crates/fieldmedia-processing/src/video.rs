//! Video derivative strategy.
//!
//! No codec integration: videos already within the bitrate budget pass
//! through unchanged; anything that would need transcoding or frame capture
//! fails explicitly so the gap is visible in `derivative_errors`.

use bytes::Bytes;
use fieldmedia_core::models::{CompressionSettings, MediaFile};
use fieldmedia_core::DerivativeError;

use crate::pipeline::{CompressedOutput, DerivativeStrategy};

pub struct VideoStrategy;

impl DerivativeStrategy for VideoStrategy {
    fn compress(
        &self,
        file: &MediaFile,
        settings: &CompressionSettings,
    ) -> Result<CompressedOutput, DerivativeError> {
        let duration = file.duration_secs.filter(|d| *d > 0.0).ok_or_else(|| {
            DerivativeError::UnknownDuration(file.file_name.clone())
        })?;
        let bits = file.data.len() as f64 * 8.0;
        if bits <= settings.video_bitrate_budget_bps as f64 * duration {
            return Ok(CompressedOutput {
                data: file.data.clone(),
                mime_type: file.mime_type.clone(),
            });
        }
        Err(DerivativeError::Unimplemented(
            "video compression".to_string(),
        ))
    }

    fn thumbnail(
        &self,
        _file: &MediaFile,
        _settings: &CompressionSettings,
    ) -> Result<Bytes, DerivativeError> {
        Err(DerivativeError::Unimplemented(
            "video frame capture".to_string(),
        ))
    }

    fn preview(
        &self,
        _file: &MediaFile,
        _settings: &CompressionSettings,
    ) -> Result<Bytes, DerivativeError> {
        Err(DerivativeError::Unimplemented("video preview".to_string()))
    }

    fn extract_metadata(&self, file: &MediaFile) -> serde_json::Value {
        let mut metadata = serde_json::json!({ "byte_size": file.data.len() });
        if let Some(duration) = file.duration_secs {
            metadata["duration_secs"] = serde_json::json!(duration);
        }
        if let Some(dimensions) = file.dimensions {
            metadata["width"] = serde_json::json!(dimensions.width);
            metadata["height"] = serde_json::json!(dimensions.height);
        }
        metadata
    }
}
