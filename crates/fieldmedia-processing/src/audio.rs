//! Audio derivative strategy: pass-through within the bitrate budget,
//! explicit failure otherwise.

use bytes::Bytes;
use fieldmedia_core::models::{CompressionSettings, MediaFile};
use fieldmedia_core::DerivativeError;

use crate::pipeline::{CompressedOutput, DerivativeStrategy};

pub struct AudioStrategy;

impl DerivativeStrategy for AudioStrategy {
    fn compress(
        &self,
        file: &MediaFile,
        settings: &CompressionSettings,
    ) -> Result<CompressedOutput, DerivativeError> {
        let duration = file.duration_secs.filter(|d| *d > 0.0).ok_or_else(|| {
            DerivativeError::UnknownDuration(file.file_name.clone())
        })?;
        let effective_bps = file.data.len() as f64 * 8.0 / duration;
        if effective_bps <= settings.audio_bitrate_budget_bps as f64 {
            return Ok(CompressedOutput {
                data: file.data.clone(),
                mime_type: file.mime_type.clone(),
            });
        }
        Err(DerivativeError::Unimplemented(
            "audio compression".to_string(),
        ))
    }

    fn thumbnail(
        &self,
        _file: &MediaFile,
        _settings: &CompressionSettings,
    ) -> Result<Bytes, DerivativeError> {
        Err(DerivativeError::Unimplemented("audio thumbnail".to_string()))
    }

    fn preview(
        &self,
        _file: &MediaFile,
        _settings: &CompressionSettings,
    ) -> Result<Bytes, DerivativeError> {
        Err(DerivativeError::Unimplemented("audio preview".to_string()))
    }

    fn extract_metadata(&self, file: &MediaFile) -> serde_json::Value {
        let mut metadata = serde_json::json!({ "byte_size": file.data.len() });
        if let Some(duration) = file.duration_secs {
            metadata["duration_secs"] = serde_json::json!(duration);
        }
        metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn budget_decides_pass_through() {
        let settings = CompressionSettings::default();

        // 160 kB over 10 s is 128 kbps, exactly the default budget.
        let mut within = MediaFile::new("note.mp3", "audio/mpeg", Bytes::from(vec![1u8; 160_000]));
        within.duration_secs = Some(10.0);
        let out = AudioStrategy.compress(&within, &settings).unwrap();
        assert_eq!(out.data, within.data);

        let mut over = MediaFile::new("note.wav", "audio/wav", Bytes::from(vec![1u8; 1_600_000]));
        over.duration_secs = Some(10.0);
        let err = AudioStrategy.compress(&over, &settings).unwrap_err();
        assert!(matches!(err, DerivativeError::Unimplemented(_)));
    }

    #[test]
    fn zero_duration_is_unknown() {
        let mut file = MediaFile::new("note.mp3", "audio/mpeg", Bytes::from(vec![1u8; 100]));
        file.duration_secs = Some(0.0);
        let err = AudioStrategy
            .compress(&file, &CompressionSettings::default())
            .unwrap_err();
        assert!(matches!(err, DerivativeError::UnknownDuration(_)));
    }
}
