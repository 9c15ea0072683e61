//! Image derivative strategy: shrink-to-fit compression, square thumbnails,
//! bounded previews.

use std::io::Cursor;

use bytes::Bytes;
use fieldmedia_core::models::{CompressionSettings, Dimensions, MediaFile, OutputFormat};
use fieldmedia_core::DerivativeError;
use image::codecs::jpeg::JpegEncoder;
use image::{imageops::FilterType, DynamicImage, GenericImageView, ImageFormat};

use crate::pipeline::{CompressedOutput, DerivativeStrategy};

pub struct ImageStrategy;

fn decode(file: &MediaFile) -> Result<DynamicImage, DerivativeError> {
    image::load_from_memory(&file.data).map_err(|e| DerivativeError::Decode(e.to_string()))
}

/// Filter choice by downscale ratio: cheap filters for heavy reductions,
/// Lanczos for mild ones where ringing matters less than sharpness.
fn filter_for_ratio(ratio: f32) -> FilterType {
    if ratio > 2.0 {
        FilterType::Triangle
    } else if ratio > 1.5 {
        FilterType::CatmullRom
    } else {
        FilterType::Lanczos3
    }
}

/// Sample the alpha channel; fully or near-fully opaque images gain nothing
/// from an alpha-capable output format.
fn has_meaningful_alpha(img: &DynamicImage) -> bool {
    if !img.color().has_alpha() {
        return false;
    }
    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();
    let step = ((width as usize * height as usize) / 4096).max(1);
    rgba.pixels()
        .step_by(step)
        .any(|pixel| pixel.0[3] < 250)
}

fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>, DerivativeError> {
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
    let mut buf = Cursor::new(Vec::new());
    let encoder = JpegEncoder::new_with_quality(&mut buf, quality);
    rgb.write_with_encoder(encoder)
        .map_err(|e| DerivativeError::Encode(e.to_string()))?;
    Ok(buf.into_inner())
}

fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, DerivativeError> {
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png)
        .map_err(|e| DerivativeError::Encode(e.to_string()))?;
    Ok(buf.into_inner())
}

fn encode_webp(img: &DynamicImage, quality: u8) -> Result<Vec<u8>, DerivativeError> {
    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();
    let encoder = webp::Encoder::from_rgba(rgba.as_raw(), width, height);
    Ok(encoder.encode(quality as f32).to_vec())
}

/// Shrink-only fit within the bound; images already inside it are untouched.
fn fit_within(img: &DynamicImage, max_width: u32, max_height: u32) -> DynamicImage {
    let (width, height) = img.dimensions();
    if width <= max_width && height <= max_height {
        return img.clone();
    }
    let ratio = (width as f32 / max_width as f32).max(height as f32 / max_height as f32);
    img.resize(max_width, max_height, filter_for_ratio(ratio))
}

impl DerivativeStrategy for ImageStrategy {
    fn compress(
        &self,
        file: &MediaFile,
        settings: &CompressionSettings,
    ) -> Result<CompressedOutput, DerivativeError> {
        let img = decode(file)?;
        let resized = fit_within(&img, settings.max_width, settings.max_height);

        let format = match settings.format {
            OutputFormat::Auto => {
                // Alpha-bearing PNG sources stay in their own family; WebP
                // wins everywhere else.
                if has_meaningful_alpha(&resized) && file.mime_type.eq_ignore_ascii_case("image/png")
                {
                    OutputFormat::Png
                } else {
                    OutputFormat::WebP
                }
            }
            explicit => explicit,
        };

        let encoded = match format {
            OutputFormat::Jpeg => encode_jpeg(&resized, settings.quality)?,
            OutputFormat::Png => encode_png(&resized)?,
            OutputFormat::WebP | OutputFormat::Auto => encode_webp(&resized, settings.quality)?,
        };

        // A "compressed" variant that grew is useless; keep the original.
        if encoded.len() >= file.data.len() {
            return Ok(CompressedOutput {
                data: file.data.clone(),
                mime_type: file.mime_type.clone(),
            });
        }

        Ok(CompressedOutput {
            data: Bytes::from(encoded),
            mime_type: format.mime_type().to_string(),
        })
    }

    fn thumbnail(
        &self,
        file: &MediaFile,
        settings: &CompressionSettings,
    ) -> Result<Bytes, DerivativeError> {
        let img = decode(file)?;
        let (width, height) = img.dimensions();
        let edge = width.min(height);
        let cropped = img.crop_imm((width - edge) / 2, (height - edge) / 2, edge, edge);
        let ratio = edge as f32 / settings.thumbnail_edge as f32;
        let thumb = cropped.resize_exact(
            settings.thumbnail_edge,
            settings.thumbnail_edge,
            filter_for_ratio(ratio),
        );
        Ok(Bytes::from(encode_jpeg(&thumb, settings.quality)?))
    }

    fn preview(
        &self,
        file: &MediaFile,
        settings: &CompressionSettings,
    ) -> Result<Bytes, DerivativeError> {
        let img = decode(file)?;
        let preview = fit_within(&img, settings.preview_bound, settings.preview_bound);
        Ok(Bytes::from(encode_jpeg(&preview, settings.quality)?))
    }

    fn extract_metadata(&self, file: &MediaFile) -> serde_json::Value {
        match decode(file) {
            Ok(img) => {
                let (width, height) = img.dimensions();
                serde_json::json!({
                    "width": width,
                    "height": height,
                    "aspect_ratio": width as f64 / height as f64,
                    "byte_size": file.data.len(),
                })
            }
            Err(_) => serde_json::json!({ "byte_size": file.data.len() }),
        }
    }

    fn probe_dimensions(&self, file: &MediaFile) -> Option<Dimensions> {
        let img = decode(file).ok()?;
        let (width, height) = img.dimensions();
        Some(Dimensions { width, height })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    /// Deterministic noise so lossy re-encoding actually shrinks the file.
    fn noise_png(width: u32, height: u32) -> MediaFile {
        let mut seed: u32 = 0x12345678;
        let img = RgbaImage::from_fn(width, height, |_, _| {
            seed = seed.wrapping_mul(1664525).wrapping_add(1013904223);
            let b = seed.to_le_bytes();
            Rgba([b[0], b[1], b[2], 255])
        });
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(img)
            .write_to(&mut buf, ImageFormat::Png)
            .unwrap();
        MediaFile::new("noise.png", "image/png", Bytes::from(buf.into_inner()))
    }

    fn transparent_png(width: u32, height: u32) -> MediaFile {
        let img = RgbaImage::from_fn(width, height, |x, _| {
            let alpha = if x % 2 == 0 { 0 } else { 255 };
            Rgba([200, 100, 50, alpha])
        });
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(img)
            .write_to(&mut buf, ImageFormat::Png)
            .unwrap();
        MediaFile::new("overlay.png", "image/png", Bytes::from(buf.into_inner()))
    }

    #[test]
    fn compress_shrinks_to_fit() {
        let file = noise_png(400, 200);
        let mut settings = CompressionSettings::default();
        settings.max_width = 100;
        settings.max_height = 100;
        settings.format = OutputFormat::Jpeg;
        let out = ImageStrategy.compress(&file, &settings).unwrap();
        assert_eq!(out.mime_type, "image/jpeg");
        let decoded = image::load_from_memory(&out.data).unwrap();
        assert_eq!(decoded.dimensions(), (100, 50));
    }

    #[test]
    fn compress_never_upscales() {
        let file = noise_png(50, 50);
        let mut settings = CompressionSettings::default();
        settings.format = OutputFormat::Jpeg;
        let out = ImageStrategy.compress(&file, &settings).unwrap();
        let decoded = image::load_from_memory(&out.data).unwrap();
        assert_eq!(decoded.dimensions(), (50, 50));
    }

    #[test]
    fn auto_format_preserves_transparency() {
        let file = transparent_png(64, 64);
        let settings = CompressionSettings::default();
        let out = ImageStrategy.compress(&file, &settings).unwrap();
        // Auto keeps alpha-bearing PNG sources in the PNG family (or passes
        // the original through when re-encoding gains nothing).
        assert_eq!(out.mime_type, "image/png");
    }

    #[test]
    fn auto_format_prefers_webp_for_opaque() {
        let file = noise_png(200, 200);
        let settings = CompressionSettings::default();
        let out = ImageStrategy.compress(&file, &settings).unwrap();
        assert_eq!(out.mime_type, "image/webp");
        assert!(out.data.len() < file.data.len());
    }

    #[test]
    fn thumbnail_is_square_center_crop() {
        let file = noise_png(300, 100);
        let mut settings = CompressionSettings::default();
        settings.thumbnail_edge = 64;
        let thumb = ImageStrategy.thumbnail(&file, &settings).unwrap();
        let decoded = image::load_from_memory(&thumb).unwrap();
        assert_eq!(decoded.dimensions(), (64, 64));
    }

    #[test]
    fn preview_fits_bound_without_crop() {
        let file = noise_png(400, 100);
        let mut settings = CompressionSettings::default();
        settings.preview_bound = 80;
        let preview = ImageStrategy.preview(&file, &settings).unwrap();
        let decoded = image::load_from_memory(&preview).unwrap();
        assert_eq!(decoded.dimensions(), (80, 20));
    }

    #[test]
    fn metadata_carries_geometry() {
        let file = noise_png(320, 240);
        let metadata = ImageStrategy.extract_metadata(&file);
        assert_eq!(metadata["width"], 320);
        assert_eq!(metadata["height"], 240);
        let aspect = metadata["aspect_ratio"].as_f64().unwrap();
        assert!((aspect - 320.0 / 240.0).abs() < 1e-9);
    }

    #[test]
    fn decode_failure_is_decode_error() {
        let file = MediaFile::new("bad.png", "image/png", Bytes::from_static(b"garbage"));
        let err = ImageStrategy
            .compress(&file, &CompressionSettings::default())
            .unwrap_err();
        assert!(matches!(err, DerivativeError::Decode(_)));
    }
}
