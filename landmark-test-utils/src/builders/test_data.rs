use chrono::Utc;
use landmark_core::{Coordinates, DetectedLandmark, EnrichedLocationData, NearbyPlace, Provenance};

/// Builder for detected landmarks
pub struct LandmarkBuilder {
    name: String,
    confidence: f64,
    coordinates: Option<Coordinates>,
    provenance: Provenance,
}

impl LandmarkBuilder {
    /// A primary detection at 90% confidence
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            confidence: 90.0,
            coordinates: None,
            provenance: Provenance::Primary,
        }
    }

    pub fn confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn at(mut self, latitude: f64, longitude: f64) -> Self {
        self.coordinates = Some(Coordinates::new(latitude, longitude));
        self
    }

    pub fn provenance(mut self, provenance: Provenance) -> Self {
        self.provenance = provenance;
        self
    }

    pub fn build(self) -> DetectedLandmark {
        DetectedLandmark::new(self.name, self.confidence, self.coordinates, self.provenance)
    }
}

/// Builder for enrichment records
pub struct LocationBuilder {
    record: EnrichedLocationData,
}

impl LocationBuilder {
    pub fn new(title: &str) -> Self {
        Self {
            record: EnrichedLocationData {
                title: title.to_string(),
                short_description: format!("{title} is a landmark."),
                description: format!("{title} is a landmark."),
                coordinates: None,
                categories: Vec::new(),
                thumbnail: None,
                url: format!("https://en.wikipedia.org/wiki/{}", title.replace(' ', "_")),
                nearby_places: Vec::new(),
                cultural_significance: None,
                historical_context: None,
                best_time_to_visit: None,
                accessibility: None,
                activities: None,
                last_updated: Utc::now(),
            },
        }
    }

    pub fn description(mut self, text: &str) -> Self {
        self.record.description = text.to_string();
        self.record.short_description = text.to_string();
        self
    }

    pub fn at(mut self, latitude: f64, longitude: f64) -> Self {
        self.record.coordinates = Some(Coordinates::new(latitude, longitude));
        self
    }

    pub fn categories(mut self, categories: &[&str]) -> Self {
        self.record.categories = categories.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn nearby(mut self, names: &[&str]) -> Self {
        self.record.nearby_places = names.iter().map(|n| n.to_string()).collect();
        self
    }

    pub fn build(self) -> EnrichedLocationData {
        self.record
    }
}

/// A proximity-search hit
pub fn nearby_place(title: &str, latitude: f64, longitude: f64, distance_m: f64) -> NearbyPlace {
    NearbyPlace {
        title: title.to_string(),
        page_id: None,
        coordinates: Coordinates::new(latitude, longitude),
        distance_m,
    }
}
