//! Derivative pipeline: per-kind strategy dispatch with sibling-independent
//! failure capture.

use std::collections::BTreeMap;

use bytes::Bytes;
use fieldmedia_core::models::{CompressionSettings, Dimensions, IngestOptions, MediaFile, MediaKind};
use fieldmedia_core::DerivativeError;

use crate::audio::AudioStrategy;
use crate::document::DocumentStrategy;
use crate::image_media::ImageStrategy;
use crate::video::VideoStrategy;

/// Compressed variant bytes together with the encoded MIME type (which may
/// differ from the source when the format changed).
#[derive(Debug, Clone)]
pub struct CompressedOutput {
    pub data: Bytes,
    pub mime_type: String,
}

/// Everything the pipeline produced for one file. Absent variants either
/// were not requested or failed; failures are keyed by variant name in
/// `errors`.
#[derive(Debug, Default)]
pub struct DerivativeOutput {
    pub compressed: Option<CompressedOutput>,
    pub thumbnail: Option<Bytes>,
    pub preview: Option<Bytes>,
    pub dimensions: Option<Dimensions>,
    pub duration_secs: Option<f64>,
    pub metadata: Option<serde_json::Value>,
    pub errors: BTreeMap<String, String>,
}

/// One media kind's derivative generation. Every method may fail on its own;
/// the pipeline never lets one variant's failure abort its siblings.
pub trait DerivativeStrategy {
    fn compress(
        &self,
        file: &MediaFile,
        settings: &CompressionSettings,
    ) -> Result<CompressedOutput, DerivativeError>;

    fn thumbnail(
        &self,
        file: &MediaFile,
        settings: &CompressionSettings,
    ) -> Result<Bytes, DerivativeError>;

    fn preview(
        &self,
        file: &MediaFile,
        settings: &CompressionSettings,
    ) -> Result<Bytes, DerivativeError>;

    fn extract_metadata(&self, file: &MediaFile) -> serde_json::Value;

    /// Pixel dimensions, from decode or from the caller's probe hint.
    fn probe_dimensions(&self, file: &MediaFile) -> Option<Dimensions> {
        file.dimensions
    }
}

pub struct DerivativePipeline;

impl DerivativePipeline {
    /// Run the requested steps for the file's media kind.
    ///
    /// Every requested step is dispatched to the strategy; kinds that
    /// cannot produce a variant fail with an explicit error that is
    /// recorded, not swallowed, so the asset always carries the reason a
    /// derivative is absent.
    pub fn run(
        file: &MediaFile,
        options: &IngestOptions,
        settings: &CompressionSettings,
    ) -> DerivativeOutput {
        let kind = file.kind();
        let strategy: &dyn DerivativeStrategy = match kind {
            MediaKind::Image => &ImageStrategy,
            MediaKind::Video => &VideoStrategy,
            MediaKind::Audio => &AudioStrategy,
            MediaKind::Document | MediaKind::Other => &DocumentStrategy,
        };

        let mut output = DerivativeOutput {
            dimensions: strategy.probe_dimensions(file),
            duration_secs: file.duration_secs,
            ..Default::default()
        };

        if options.compress {
            match strategy.compress(file, settings) {
                Ok(compressed) => output.compressed = Some(compressed),
                Err(e) => {
                    tracing::warn!(file = %file.file_name, error = %e, "compression failed");
                    output.errors.insert("compressed".to_string(), e.to_string());
                }
            }
        }

        if options.generate_thumbnail {
            match strategy.thumbnail(file, settings) {
                Ok(thumbnail) => output.thumbnail = Some(thumbnail),
                Err(e) => {
                    tracing::warn!(file = %file.file_name, error = %e, "thumbnail failed");
                    output.errors.insert("thumbnail".to_string(), e.to_string());
                }
            }
        }

        if options.generate_preview {
            match strategy.preview(file, settings) {
                Ok(preview) => output.preview = Some(preview),
                Err(e) => {
                    tracing::warn!(file = %file.file_name, error = %e, "preview failed");
                    output.errors.insert("preview".to_string(), e.to_string());
                }
            }
        }

        if options.extract_metadata {
            output.metadata = Some(strategy.extract_metadata(file));
        }

        output
    }
}
