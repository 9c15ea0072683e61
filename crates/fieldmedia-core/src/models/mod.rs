//! Domain models for assets, batches, sync operations, search, statistics,
//! and compression settings.

pub mod asset;
pub mod batch;
pub mod search;
pub mod settings;
pub mod statistics;
pub mod sync;

pub use asset::{
    Association, AssociationKind, Asset, AssetCategory, AssetMetadataUpdate, AssetStatus,
    ContentVariant, Dimensions, GeoPoint, MediaFile, MediaKind,
};
pub use batch::{batch_progress, Batch, BatchStatus};
pub use search::{GeoFilter, SearchFilters};
pub use settings::{
    compression_ratio, CompressionSettings, CompressionSettingsUpdate, IngestOptions, OutputFormat,
};
pub use statistics::{MediaStatistics, TypeBreakdown};
pub use sync::{SyncOperation, SyncOperationKind, SyncPriority};
