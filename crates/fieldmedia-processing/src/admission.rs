//! Pre-ingestion admission control.

use fieldmedia_core::models::{CompressionSettings, MediaFile, MediaKind};
use fieldmedia_core::{AdmissionError, EngineConfig};

/// Stateless gate run before any store mutation. A rejected candidate leaves
/// no trace in the store or the content directory.
pub struct AdmissionController;

impl AdmissionController {
    /// Validate a candidate against the allow-list, the per-kind size
    /// ceiling, the storage quota, and (for images) decodability.
    pub fn check(
        file: &MediaFile,
        usage: i64,
        config: &EngineConfig,
        settings: &CompressionSettings,
    ) -> Result<(), AdmissionError> {
        if !config.is_allowed_type(&file.mime_type) {
            return Err(AdmissionError::UnsupportedType(file.mime_type.clone()));
        }

        let size = file.data.len() as i64;
        let max = config.max_bytes_for(file.kind());
        if size > max {
            return Err(AdmissionError::FileTooLarge { size, max });
        }

        if usage + size > config.storage_quota_bytes {
            return Err(AdmissionError::QuotaExceeded {
                used: usage,
                requested: size,
                quota: config.storage_quota_bytes,
            });
        }

        if file.kind() == MediaKind::Image {
            let img = image::load_from_memory(&file.data)
                .map_err(|e| AdmissionError::InvalidContent(format!("undecodable image: {e}")))?;
            let (width, height) = image::GenericImageView::dimensions(&img);
            if width > settings.max_width * 2 || height > settings.max_height * 2 {
                return Err(AdmissionError::InvalidContent(format!(
                    "image dimensions {width}x{height} exceed twice the configured maximum"
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use image::RgbaImage;
    use std::io::Cursor;

    fn png_bytes(width: u32, height: u32) -> Bytes {
        let img = RgbaImage::from_pixel(width, height, image::Rgba([10, 20, 30, 255]));
        let mut buf = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut buf, image::ImageFormat::Png)
            .unwrap();
        Bytes::from(buf.into_inner())
    }

    #[test]
    fn rejects_disallowed_type() {
        let file = MediaFile::new("a.exe", "application/x-msdownload", Bytes::from_static(b"x"));
        let err = AdmissionController::check(
            &file,
            0,
            &EngineConfig::default(),
            &CompressionSettings::default(),
        )
        .unwrap_err();
        assert!(matches!(err, AdmissionError::UnsupportedType(_)));
    }

    #[test]
    fn rejects_oversized_file() {
        let mut config = EngineConfig::default();
        config.max_image_bytes = 4;
        let file = MediaFile::new("a.png", "image/png", png_bytes(2, 2));
        let err =
            AdmissionController::check(&file, 0, &config, &CompressionSettings::default())
                .unwrap_err();
        assert!(matches!(err, AdmissionError::FileTooLarge { max: 4, .. }));
    }

    #[test]
    fn rejects_quota_overflow() {
        let mut config = EngineConfig::default();
        config.storage_quota_bytes = 100;
        let file = MediaFile::new("a.png", "image/png", png_bytes(2, 2));
        let err =
            AdmissionController::check(&file, 90, &config, &CompressionSettings::default())
                .unwrap_err();
        assert!(matches!(
            err,
            AdmissionError::QuotaExceeded {
                used: 90,
                quota: 100,
                ..
            }
        ));
    }

    #[test]
    fn rejects_undecodable_image() {
        let file = MediaFile::new("a.png", "image/png", Bytes::from_static(b"not a png"));
        let err = AdmissionController::check(
            &file,
            0,
            &EngineConfig::default(),
            &CompressionSettings::default(),
        )
        .unwrap_err();
        assert!(matches!(err, AdmissionError::InvalidContent(_)));
    }

    #[test]
    fn rejects_absurd_dimensions() {
        let mut settings = CompressionSettings::default();
        settings.max_width = 4;
        settings.max_height = 4;
        let file = MediaFile::new("a.png", "image/png", png_bytes(16, 16));
        let err =
            AdmissionController::check(&file, 0, &EngineConfig::default(), &settings).unwrap_err();
        assert!(matches!(err, AdmissionError::InvalidContent(_)));
    }

    #[test]
    fn accepts_valid_image() {
        let file = MediaFile::new("a.png", "image/png", png_bytes(8, 8));
        AdmissionController::check(
            &file,
            0,
            &EngineConfig::default(),
            &CompressionSettings::default(),
        )
        .unwrap();
    }
}
