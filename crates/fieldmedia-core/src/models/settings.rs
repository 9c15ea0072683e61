//! Compression settings and ingestion options.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::asset::{Association, AssetCategory, GeoPoint};

/// Output format for compressed images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Prefer WebP when the source has no meaningful alpha; otherwise stay
    /// in the original family.
    #[default]
    Auto,
    Jpeg,
    Png,
    WebP,
}

impl OutputFormat {
    pub fn mime_type(&self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "image/jpeg",
            OutputFormat::Png => "image/png",
            OutputFormat::WebP => "image/webp",
            OutputFormat::Auto => "image/webp",
        }
    }
}

/// Derivative-generation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompressionSettings {
    /// Compressed variant fits within `max_width` × `max_height`
    /// (aspect-preserving, shrink only).
    pub max_width: u32,
    pub max_height: u32,
    /// Encoder quality, 1–100.
    pub quality: u8,
    pub format: OutputFormat,
    /// Edge length of the square thumbnail.
    pub thumbnail_edge: u32,
    /// Preview fits within this bound on both axes (no crop).
    pub preview_bound: u32,
    /// Video passes through unchanged when `size * 8 <= budget * duration`.
    pub video_bitrate_budget_bps: i64,
    pub audio_bitrate_budget_bps: i64,
}

impl Default for CompressionSettings {
    fn default() -> Self {
        Self {
            max_width: 1920,
            max_height: 1080,
            quality: 80,
            format: OutputFormat::Auto,
            thumbnail_edge: 200,
            preview_bound: 800,
            video_bitrate_budget_bps: 2_000_000,
            audio_bitrate_budget_bps: 128_000,
        }
    }
}

/// Partial update for [`CompressionSettings`]; `None` fields are unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompressionSettingsUpdate {
    pub max_width: Option<u32>,
    pub max_height: Option<u32>,
    pub quality: Option<u8>,
    pub format: Option<OutputFormat>,
    pub thumbnail_edge: Option<u32>,
    pub preview_bound: Option<u32>,
    pub video_bitrate_budget_bps: Option<i64>,
    pub audio_bitrate_budget_bps: Option<i64>,
}

impl CompressionSettings {
    /// Apply a partial update in place.
    pub fn apply(&mut self, update: CompressionSettingsUpdate) {
        if let Some(v) = update.max_width {
            self.max_width = v;
        }
        if let Some(v) = update.max_height {
            self.max_height = v;
        }
        if let Some(v) = update.quality {
            self.quality = v.clamp(1, 100);
        }
        if let Some(v) = update.format {
            self.format = v;
        }
        if let Some(v) = update.thumbnail_edge {
            self.thumbnail_edge = v;
        }
        if let Some(v) = update.preview_bound {
            self.preview_bound = v;
        }
        if let Some(v) = update.video_bitrate_budget_bps {
            self.video_bitrate_budget_bps = v;
        }
        if let Some(v) = update.audio_bitrate_budget_bps {
            self.audio_bitrate_budget_bps = v;
        }
    }
}

/// Savings as a percentage: `round((1 - compressed/original) * 100)`.
/// Never negative: a non-shrinking "compressed" variant reports 0.
pub fn compression_ratio(original_size: i64, compressed_size: i64) -> i64 {
    if original_size <= 0 {
        return 0;
    }
    let ratio = (1.0 - compressed_size as f64 / original_size as f64) * 100.0;
    (ratio.round() as i64).max(0)
}

/// Shared options for a single ingestion or a whole batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestOptions {
    pub compress: bool,
    pub generate_thumbnail: bool,
    pub generate_preview: bool,
    pub extract_metadata: bool,
    pub category: AssetCategory,
    pub tags: Vec<String>,
    pub location: Option<GeoPoint>,
    pub association: Option<Association>,
    pub is_public: bool,
    pub created_by: String,
    /// Capture time override; defaults to ingestion time.
    pub captured_at: Option<DateTime<Utc>>,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            compress: true,
            generate_thumbnail: true,
            generate_preview: true,
            extract_metadata: true,
            category: AssetCategory::Other,
            tags: Vec::new(),
            location: None,
            association: None,
            is_public: false,
            created_by: String::new(),
            captured_at: None,
        }
    }
}
