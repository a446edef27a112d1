//! Test utilities for the landmark recognition client
//!
//! This crate provides scripted mock collaborators, test builders, and
//! image fixtures for testing the recognition pipeline.

pub mod builders;
pub mod mocks;

// Re-export commonly used types
pub use builders::{LandmarkBuilder, LocationBuilder, TestImageBuilder, nearby_place, png_bytes};
pub use mocks::{MockDetection, MockDetector, MockEnricher, MockPositionProvider, ScriptedFailure};
