//! Domain types shared by the recognition and enrichment clients

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A WGS84 position
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    const EARTH_RADIUS_M: f64 = 6_371_000.0;

    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Whether both components are finite and in range
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }

    /// Great-circle distance in meters (haversine)
    pub fn distance_m(&self, other: &Coordinates) -> f64 {
        let (lat1, lat2) = (self.latitude.to_radians(), other.latitude.to_radians());
        let d_lat = lat2 - lat1;
        let d_lon = (other.longitude - self.longitude).to_radians();

        let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
        2.0 * Self::EARTH_RADIUS_M * a.sqrt().min(1.0).asin()
    }
}

/// How a candidate landmark was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// Named directly by the vision service
    Primary,
    /// Synthesized from landmark words in recognized text
    TextHeuristic,
    /// Nearest place to the caller's position
    GeoFallback,
}

impl Provenance {
    pub fn is_fallback(&self) -> bool {
        !matches!(self, Self::Primary)
    }
}

/// A candidate landmark. Confidence is on a 0-100 scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedLandmark {
    pub name: String,
    confidence: f64,
    pub coordinates: Option<Coordinates>,
    pub provenance: Provenance,
    /// Knowledge-graph id reported by the vision service
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mid: Option<String>,
}

impl DetectedLandmark {
    /// Create a candidate. Confidence is clamped into `[0, 100]`; NaN becomes 0.
    pub fn new(
        name: impl Into<String>,
        confidence: f64,
        coordinates: Option<Coordinates>,
        provenance: Provenance,
    ) -> Self {
        Self {
            name: name.into(),
            confidence: clamp_confidence(confidence),
            coordinates,
            provenance,
            mid: None,
        }
    }

    pub fn with_mid(mut self, mid: impl Into<String>) -> Self {
        self.mid = Some(mid.into());
        self
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }
}

pub(crate) fn clamp_confidence(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 100.0)
    }
}

/// A place returned by a proximity search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearbyPlace {
    pub title: String,
    pub page_id: Option<u64>,
    pub coordinates: Coordinates,
    /// Distance from the search center in meters
    pub distance_m: f64,
}

/// Encyclopedic context for an identified landmark
///
/// The mined fields are `None` unless a matching sentence or keyword was
/// actually found in the source text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedLocationData {
    pub title: String,
    pub short_description: String,
    pub description: String,
    pub coordinates: Option<Coordinates>,
    pub categories: Vec<String>,
    pub thumbnail: Option<String>,
    pub url: String,
    pub nearby_places: Vec<String>,
    pub cultural_significance: Option<String>,
    pub historical_context: Option<String>,
    pub best_time_to_visit: Option<String>,
    pub accessibility: Option<String>,
    pub activities: Option<Vec<String>>,
    pub last_updated: DateTime<Utc>,
}
