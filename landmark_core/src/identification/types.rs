//! Data types for the recognition service

use crate::classifier::ErrorDetails;
use crate::landmark::{DetectedLandmark, EnrichedLocationData};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Where the image to recognize comes from
#[derive(Debug, Clone, PartialEq)]
pub enum ImageSource {
    /// Local file, read and optimized before upload
    File(PathBuf),
    /// Remote image, forwarded to the detector as a URL
    Url(String),
    /// In-memory image with the metadata used for its cache key
    Bytes {
        name: String,
        data: Vec<u8>,
        modified: Option<DateTime<Utc>>,
    },
}

impl ImageSource {
    /// Short human-readable label for logs and progress
    pub fn label(&self) -> String {
        match self {
            Self::File(path) => path.display().to_string(),
            Self::Url(url) => url.clone(),
            Self::Bytes { name, .. } => name.clone(),
        }
    }
}

/// Per-call recognition options
#[derive(Debug, Clone)]
pub struct RecognitionOptions {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Minimum confidence (0-100) for a detection to count
    pub confidence_threshold: f64,
    pub enable_fallback: bool,
    pub enable_cache: bool,
    /// Budget for the whole pipeline
    pub timeout: Duration,
    /// Candidates requested from the detector
    pub max_results: usize,
    /// Delay before retry n is `retry_base_delay * n`
    pub retry_base_delay: Duration,
}

impl Default for RecognitionOptions {
    fn default() -> Self {
        Self {
            max_retries: 2,
            confidence_threshold: 70.0,
            enable_fallback: true,
            enable_cache: true,
            timeout: Duration::from_secs(15),
            max_results: 5,
            retry_base_delay: Duration::from_secs(1),
        }
    }
}

impl RecognitionOptions {
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

/// Outcome of one recognition call
///
/// Build with [`RecognitionResult::recognized`] or
/// [`RecognitionResult::failed`]; a successful result always carries a
/// landmark.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognitionResult {
    pub success: bool,
    pub landmark: Option<DetectedLandmark>,
    pub location: Option<EnrichedLocationData>,
    pub confidence: f64,
    pub processing_time: Duration,
    pub error: Option<ErrorDetails>,
    pub fallback_used: bool,
    pub cache_used: bool,
}

impl RecognitionResult {
    pub fn recognized(
        landmark: DetectedLandmark,
        location: Option<EnrichedLocationData>,
        fallback_used: bool,
    ) -> Self {
        Self {
            success: true,
            confidence: landmark.confidence(),
            landmark: Some(landmark),
            location,
            processing_time: Duration::ZERO,
            error: None,
            fallback_used,
            cache_used: false,
        }
    }

    pub fn failed(error: ErrorDetails) -> Self {
        Self {
            success: false,
            landmark: None,
            location: None,
            confidence: 0.0,
            processing_time: Duration::ZERO,
            error: Some(error),
            fallback_used: false,
            cache_used: false,
        }
    }

    pub fn with_processing_time(mut self, elapsed: Duration) -> Self {
        self.processing_time = elapsed;
        self
    }

    /// Name of the recognized landmark, if any
    pub fn landmark_name(&self) -> Option<&str> {
        self.landmark.as_ref().map(|l| l.name.as_str())
    }
}

/// Readiness of the collaborating services, without network calls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ServiceReadiness {
    pub vision_ready: bool,
    pub enrichment_ready: bool,
}

impl ServiceReadiness {
    pub fn all_ready(&self) -> bool {
        self.vision_ready && self.enrichment_ready
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{ErrorClassifier, ErrorContext};
    use crate::landmark::Provenance;

    #[test]
    fn test_default_options() {
        let options = RecognitionOptions::default();
        assert_eq!(options.max_retries, 2);
        assert_eq!(options.max_attempts(), 3);
        assert_eq!(options.confidence_threshold, 70.0);
        assert!(options.enable_fallback);
        assert!(options.enable_cache);
        assert_eq!(options.timeout, Duration::from_secs(15));
    }

    #[test]
    fn test_recognized_carries_landmark_confidence() {
        let landmark = DetectedLandmark::new("Taj Mahal", 92.0, None, Provenance::Primary);
        let result = RecognitionResult::recognized(landmark, None, false);
        assert!(result.success);
        assert_eq!(result.confidence, 92.0);
        assert_eq!(result.landmark_name(), Some("Taj Mahal"));
        assert!(result.error.is_none());
    }

    #[test]
    fn test_failed_has_no_landmark() {
        let details = ErrorClassifier::new().no_landmark("nothing here", ErrorContext::new());
        let result = RecognitionResult::failed(details);
        assert!(!result.success);
        assert!(result.landmark.is_none());
        assert_eq!(result.confidence, 0.0);
    }

    #[test]
    fn test_result_survives_json() {
        let landmark = DetectedLandmark::new("Gateway of India", 81.5, None, Provenance::Primary);
        let result = RecognitionResult::recognized(landmark, None, false)
            .with_processing_time(Duration::from_millis(420));
        let json = serde_json::to_string(&result).unwrap();
        let back: RecognitionResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back, result);
    }

    #[test]
    fn test_source_label() {
        assert_eq!(ImageSource::Url("https://x/y.jpg".into()).label(), "https://x/y.jpg");
        let bytes = ImageSource::Bytes {
            name: "upload.png".into(),
            data: vec![],
            modified: None,
        };
        assert_eq!(bytes.label(), "upload.png");
    }
}
