//! Asset model: one managed media object with metadata and stored variants.

use std::collections::BTreeMap;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Media kind, derived from the declared MIME type. A closed set: derivative
/// strategy dispatch matches on this enum rather than on type strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
    Audio,
    Document,
    Other,
}

impl MediaKind {
    pub fn from_mime(mime_type: &str) -> Self {
        let mime = mime_type.to_ascii_lowercase();
        if mime.starts_with("image/") {
            MediaKind::Image
        } else if mime.starts_with("video/") {
            MediaKind::Video
        } else if mime.starts_with("audio/") {
            MediaKind::Audio
        } else if mime == "application/pdf"
            || mime.starts_with("text/")
            || mime.starts_with("application/msword")
            || mime.starts_with("application/vnd.openxmlformats-officedocument")
        {
            MediaKind::Document
        } else {
            MediaKind::Other
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
            MediaKind::Document => "document",
            MediaKind::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "image" => Some(MediaKind::Image),
            "video" => Some(MediaKind::Video),
            "audio" => Some(MediaKind::Audio),
            "document" => Some(MediaKind::Document),
            "other" => Some(MediaKind::Other),
            _ => None,
        }
    }
}

/// Fixed classification set for field-service media.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetCategory {
    WorkOrderPhoto,
    BeforePhoto,
    AfterPhoto,
    Diagnostic,
    Parts,
    Signature,
    Receipt,
    ProductPhoto,
    FacilityPhoto,
    Inspection,
    Damage,
    Repair,
    Compliance,
    Promotional,
    Training,
    Document,
    Video,
    Audio,
    Other,
}

impl AssetCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetCategory::WorkOrderPhoto => "work_order_photo",
            AssetCategory::BeforePhoto => "before_photo",
            AssetCategory::AfterPhoto => "after_photo",
            AssetCategory::Diagnostic => "diagnostic",
            AssetCategory::Parts => "parts",
            AssetCategory::Signature => "signature",
            AssetCategory::Receipt => "receipt",
            AssetCategory::ProductPhoto => "product_photo",
            AssetCategory::FacilityPhoto => "facility_photo",
            AssetCategory::Inspection => "inspection",
            AssetCategory::Damage => "damage",
            AssetCategory::Repair => "repair",
            AssetCategory::Compliance => "compliance",
            AssetCategory::Promotional => "promotional",
            AssetCategory::Training => "training",
            AssetCategory::Document => "document",
            AssetCategory::Video => "video",
            AssetCategory::Audio => "audio",
            AssetCategory::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "work_order_photo" => Some(AssetCategory::WorkOrderPhoto),
            "before_photo" => Some(AssetCategory::BeforePhoto),
            "after_photo" => Some(AssetCategory::AfterPhoto),
            "diagnostic" => Some(AssetCategory::Diagnostic),
            "parts" => Some(AssetCategory::Parts),
            "signature" => Some(AssetCategory::Signature),
            "receipt" => Some(AssetCategory::Receipt),
            "product_photo" => Some(AssetCategory::ProductPhoto),
            "facility_photo" => Some(AssetCategory::FacilityPhoto),
            "inspection" => Some(AssetCategory::Inspection),
            "damage" => Some(AssetCategory::Damage),
            "repair" => Some(AssetCategory::Repair),
            "compliance" => Some(AssetCategory::Compliance),
            "promotional" => Some(AssetCategory::Promotional),
            "training" => Some(AssetCategory::Training),
            "document" => Some(AssetCategory::Document),
            "video" => Some(AssetCategory::Video),
            "audio" => Some(AssetCategory::Audio),
            "other" => Some(AssetCategory::Other),
            _ => None,
        }
    }
}

/// Asset lifecycle status.
///
/// Transitions: `Uploading → Processing → Ready → Synced`, with `Failed`
/// reachable from any non-terminal state, `Deleted` applied on local delete
/// (and confirmed by the remote delete), and `Archived` a terminal
/// administrative state reachable from `Synced`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetStatus {
    Uploading,
    Processing,
    Ready,
    Synced,
    Failed,
    Deleted,
    Archived,
}

impl AssetStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetStatus::Uploading => "uploading",
            AssetStatus::Processing => "processing",
            AssetStatus::Ready => "ready",
            AssetStatus::Synced => "synced",
            AssetStatus::Failed => "failed",
            AssetStatus::Deleted => "deleted",
            AssetStatus::Archived => "archived",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "uploading" => Some(AssetStatus::Uploading),
            "processing" => Some(AssetStatus::Processing),
            "ready" => Some(AssetStatus::Ready),
            "synced" => Some(AssetStatus::Synced),
            "failed" => Some(AssetStatus::Failed),
            "deleted" => Some(AssetStatus::Deleted),
            "archived" => Some(AssetStatus::Archived),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, AssetStatus::Deleted | AssetStatus::Archived)
    }

    /// Whether `self → to` is a legal transition.
    pub fn can_transition(&self, to: AssetStatus) -> bool {
        if *self == to {
            return false;
        }
        // Failure is reachable from any non-terminal state.
        if to == AssetStatus::Failed {
            return !self.is_terminal() && *self != AssetStatus::Failed;
        }
        match (*self, to) {
            (AssetStatus::Uploading, AssetStatus::Processing) => true,
            (AssetStatus::Processing, AssetStatus::Ready) => true,
            (AssetStatus::Ready, AssetStatus::Synced) => true,
            (AssetStatus::Ready, AssetStatus::Deleted) => true,
            (AssetStatus::Synced, AssetStatus::Deleted) => true,
            (AssetStatus::Synced, AssetStatus::Archived) => true,
            (AssetStatus::Failed, AssetStatus::Deleted) => true,
            _ => false,
        }
    }
}

/// Pixel dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Geolocation attached at capture time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
    pub address: Option<String>,
}

impl GeoPoint {
    /// Great-circle distance in meters (haversine).
    pub fn distance_meters(&self, latitude: f64, longitude: f64) -> f64 {
        const EARTH_RADIUS_M: f64 = 6_371_000.0;
        let lat1 = self.latitude.to_radians();
        let lat2 = latitude.to_radians();
        let dlat = (latitude - self.latitude).to_radians();
        let dlon = (longitude - self.longitude).to_radians();
        let a = (dlat / 2.0).sin().powi(2)
            + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
        EARTH_RADIUS_M * c
    }
}

/// Kind of entity an asset can be associated with. At most one association
/// per asset; the pair (kind, id) lives in a single nullable column pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssociationKind {
    WorkOrder,
    Customer,
    Appointment,
    Conversation,
}

impl AssociationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssociationKind::WorkOrder => "work_order",
            AssociationKind::Customer => "customer",
            AssociationKind::Appointment => "appointment",
            AssociationKind::Conversation => "conversation",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "work_order" => Some(AssociationKind::WorkOrder),
            "customer" => Some(AssociationKind::Customer),
            "appointment" => Some(AssociationKind::Appointment),
            "conversation" => Some(AssociationKind::Conversation),
            _ => None,
        }
    }
}

/// Foreign reference to a work order, customer, appointment, or conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Association {
    pub kind: AssociationKind,
    pub id: String,
}

/// Stored binary variant of an asset. Content keys are `"<asset_id>_<variant>"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentVariant {
    Original,
    Compressed,
    Thumbnail,
    Preview,
    Backup,
}

impl ContentVariant {
    pub const ALL: [ContentVariant; 5] = [
        ContentVariant::Original,
        ContentVariant::Compressed,
        ContentVariant::Thumbnail,
        ContentVariant::Preview,
        ContentVariant::Backup,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ContentVariant::Original => "original",
            ContentVariant::Compressed => "compressed",
            ContentVariant::Thumbnail => "thumbnail",
            ContentVariant::Preview => "preview",
            ContentVariant::Backup => "backup",
        }
    }

    /// Content-store key for this variant of the given asset.
    pub fn key(&self, asset_id: Uuid) -> String {
        format!("{}_{}", asset_id, self.as_str())
    }
}

/// One managed media object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Asset {
    pub id: Uuid,
    pub file_name: String,
    pub original_name: String,
    pub mime_type: String,
    pub kind: MediaKind,
    pub size: i64,
    pub compressed_size: Option<i64>,
    /// `round((1 - compressed_size / size) * 100)`, present iff a compressed
    /// variant exists.
    pub compression_ratio: Option<i64>,
    pub dimensions: Option<Dimensions>,
    pub duration_secs: Option<f64>,
    pub category: AssetCategory,
    pub tags: Vec<String>,
    pub location: Option<GeoPoint>,
    pub association: Option<Association>,
    pub status: AssetStatus,
    /// Why a requested derivative is absent, keyed by variant name.
    pub derivative_errors: BTreeMap<String, String>,
    /// Enrichment metadata extracted by the derivative pipeline.
    pub metadata: Option<serde_json::Value>,
    pub captured_at: DateTime<Utc>,
    pub uploaded_at: DateTime<Utc>,
    pub synced_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: String,
    pub is_public: bool,
    pub access_list: Vec<String>,
}

impl Asset {
    /// Local bytes this asset accounts against the storage quota.
    pub fn stored_bytes(&self) -> i64 {
        self.size + self.compressed_size.unwrap_or(0)
    }
}

/// A raw candidate file handed to the engine for ingestion.
///
/// `duration_secs` and `dimensions` are caller-supplied probe hints for
/// time-based media; the image pipeline extracts its own dimensions.
#[derive(Debug, Clone)]
pub struct MediaFile {
    pub file_name: String,
    pub mime_type: String,
    pub data: Bytes,
    pub duration_secs: Option<f64>,
    pub dimensions: Option<Dimensions>,
}

impl MediaFile {
    pub fn new(file_name: impl Into<String>, mime_type: impl Into<String>, data: Bytes) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            data,
            duration_secs: None,
            dimensions: None,
        }
    }

    pub fn kind(&self) -> MediaKind {
        MediaKind::from_mime(&self.mime_type)
    }
}

/// Partial metadata update applied by `update_asset_metadata`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssetMetadataUpdate {
    pub category: Option<AssetCategory>,
    pub tags: Option<Vec<String>>,
    pub location: Option<GeoPoint>,
    pub association: Option<Association>,
    pub is_public: Option<bool>,
    pub access_list: Option<Vec<String>>,
    pub captured_at: Option<DateTime<Utc>>,
}
