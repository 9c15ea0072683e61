//! Engine configuration: per-type size ceilings, MIME allow-lists, storage
//! quota, and concurrency/scheduling limits.

const MIB: i64 = 1024 * 1024;

/// Static engine configuration.
///
/// The storage quota is the only value that changes at runtime (via
/// `MediaEngine::set_storage_quota`); everything else is fixed at
/// construction.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Ceiling on total local bytes consumed by assets (original + compressed).
    pub storage_quota_bytes: i64,
    pub max_image_bytes: i64,
    pub max_video_bytes: i64,
    pub max_audio_bytes: i64,
    /// Configurable ceiling for documents.
    pub max_document_bytes: i64,
    pub allowed_image_types: Vec<String>,
    pub allowed_video_types: Vec<String>,
    pub allowed_audio_types: Vec<String>,
    pub allowed_document_types: Vec<String>,
    /// Hard cap on concurrently in-flight item ingestions per batch.
    pub batch_concurrency: usize,
    /// Interval between replication passes while connected.
    pub sync_interval_secs: u64,
    /// Maximum operations drained per replication pass.
    pub sync_drain_limit: i64,
    /// Default attempt budget for sync operations.
    pub sync_max_attempts: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            storage_quota_bytes: 500 * MIB,
            max_image_bytes: 20 * MIB,
            max_video_bytes: 100 * MIB,
            max_audio_bytes: 50 * MIB,
            max_document_bytes: 25 * MIB,
            allowed_image_types: vec![
                "image/jpeg".to_string(),
                "image/png".to_string(),
                "image/webp".to_string(),
                "image/gif".to_string(),
            ],
            allowed_video_types: vec![
                "video/mp4".to_string(),
                "video/quicktime".to_string(),
                "video/webm".to_string(),
            ],
            allowed_audio_types: vec![
                "audio/mpeg".to_string(),
                "audio/mp4".to_string(),
                "audio/wav".to_string(),
                "audio/webm".to_string(),
            ],
            allowed_document_types: vec![
                "application/pdf".to_string(),
                "text/plain".to_string(),
                "application/msword".to_string(),
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
                    .to_string(),
            ],
            batch_concurrency: 3,
            sync_interval_secs: 30,
            sync_drain_limit: 5,
            sync_max_attempts: 3,
        }
    }
}

impl EngineConfig {
    /// Size ceiling for the given MIME type's media kind.
    pub fn max_bytes_for(&self, kind: crate::models::MediaKind) -> i64 {
        use crate::models::MediaKind;
        match kind {
            MediaKind::Image => self.max_image_bytes,
            MediaKind::Video => self.max_video_bytes,
            MediaKind::Audio => self.max_audio_bytes,
            MediaKind::Document | MediaKind::Other => self.max_document_bytes,
        }
    }

    /// Whether the MIME type is on the allow-list for its kind.
    pub fn is_allowed_type(&self, mime_type: &str) -> bool {
        let mime = mime_type.to_ascii_lowercase();
        self.allowed_image_types.iter().any(|t| t == &mime)
            || self.allowed_video_types.iter().any(|t| t == &mime)
            || self.allowed_audio_types.iter().any(|t| t == &mime)
            || self.allowed_document_types.iter().any(|t| t == &mime)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MediaKind;

    #[test]
    fn default_ceilings_per_kind() {
        let config = EngineConfig::default();
        assert_eq!(config.max_bytes_for(MediaKind::Image), 20 * MIB);
        assert_eq!(config.max_bytes_for(MediaKind::Video), 100 * MIB);
        assert_eq!(config.max_bytes_for(MediaKind::Audio), 50 * MIB);
        assert_eq!(config.max_bytes_for(MediaKind::Document), 25 * MIB);
    }

    #[test]
    fn allow_list_is_case_insensitive() {
        let config = EngineConfig::default();
        assert!(config.is_allowed_type("image/jpeg"));
        assert!(config.is_allowed_type("IMAGE/JPEG"));
        assert!(!config.is_allowed_type("application/x-msdownload"));
    }
}
