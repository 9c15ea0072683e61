//! Search filters over asset metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::asset::{Asset, AssetCategory, AssetStatus, AssociationKind};

/// Geofence filter: assets whose location lies within `radius_meters` of the
/// center (haversine distance).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoFilter {
    pub latitude: f64,
    pub longitude: f64,
    pub radius_meters: f64,
}

/// Conjunctive search filters. Every present predicate must hold; results
/// are sorted by capture time descending.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchFilters {
    pub category: Option<AssetCategory>,
    /// Matches MIME types starting with this prefix (e.g. `"image/"`).
    pub mime_prefix: Option<String>,
    pub captured_after: Option<DateTime<Utc>>,
    pub captured_before: Option<DateTime<Utc>>,
    /// Any overlap counts as a match.
    pub tags: Option<Vec<String>>,
    pub association_kind: Option<AssociationKind>,
    pub association_id: Option<String>,
    pub geo: Option<GeoFilter>,
    pub status: Option<AssetStatus>,
    pub created_by: Option<String>,
}

impl SearchFilters {
    /// Predicates that are not pushed down into SQL: tag overlap and geofence.
    pub fn matches_post(&self, asset: &Asset) -> bool {
        if let Some(ref wanted) = self.tags {
            if !wanted.iter().any(|t| asset.tags.contains(t)) {
                return false;
            }
        }
        if let Some(ref geo) = self.geo {
            match asset.location {
                Some(ref loc) => {
                    if loc.distance_meters(geo.latitude, geo.longitude) > geo.radius_meters {
                        return false;
                    }
                }
                None => return false,
            }
        }
        true
    }
}
