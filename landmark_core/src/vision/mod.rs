//! Landmark recognition clients
//!
//! [`LandmarkDetector`] is the seam the recognition service depends on.
//! [`VisionClient`] implements it against an `images:annotate` style HTTP
//! endpoint. Detectors never retry; that is the caller's job.

use crate::error::Result;
use crate::landmark::DetectedLandmark;
use async_trait::async_trait;

pub mod client;
pub mod heuristics;

pub use client::{VisionClient, VisionConfig};
pub use heuristics::{TEXT_HEURISTIC_CONFIDENCE, landmark_from_text};

/// Image content handed to a detector
#[derive(Debug, Clone, PartialEq)]
pub enum ImagePayload {
    /// Raw encoded image bytes (JPEG, PNG, ...)
    Bytes(Vec<u8>),
    /// Remote image the detector fetches itself
    Url(String),
}

/// Something that can name landmarks in an image
#[async_trait]
pub trait LandmarkDetector: Send + Sync {
    /// Detect landmarks, highest confidence first
    async fn detect(&self, image: &ImagePayload, max_results: usize)
    -> Result<Vec<DetectedLandmark>>;

    /// Whether the detector is configured well enough to be called
    fn is_ready(&self) -> bool;
}
