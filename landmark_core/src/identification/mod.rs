//! Landmark identification
//!
//! This module ties the pipeline together:
//! - Cache lookups keyed by image metadata or URL
//! - Detection with sequential retries and a confidence gate
//! - Enrichment and a position-based fallback

pub mod cache_key;
pub mod service;
pub mod types;

pub use cache_key::cache_key;
pub use service::{
    FALLBACK_CONFIDENCE, FALLBACK_PLACE_LIMIT, FALLBACK_RADIUS_M, RecognitionService,
    RecognitionServiceBuilder, cache_tier,
};
pub use types::{ImageSource, RecognitionOptions, RecognitionResult, ServiceReadiness};
