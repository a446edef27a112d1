//! Landmark enrichment
//!
//! Resolves a landmark name (or a position) to encyclopedic context. A
//! missing match is a normal `Ok(None)`; only transport problems are errors.

use crate::error::Result;
use crate::landmark::{Coordinates, EnrichedLocationData, NearbyPlace};
use async_trait::async_trait;

pub mod client;
pub mod extraction;

pub use client::{EnrichmentConfig, WikipediaClient};

/// Something that can describe a landmark and find places near a point
#[async_trait]
pub trait LocationEnricher: Send + Sync {
    /// Resolve by name, then by proximity to `coordinates` when the name finds nothing
    async fn resolve(
        &self,
        name: &str,
        coordinates: Option<Coordinates>,
    ) -> Result<Option<EnrichedLocationData>>;

    /// Places within `radius_m` of `center`, nearest first
    async fn nearby(
        &self,
        center: Coordinates,
        radius_m: u32,
        limit: usize,
    ) -> Result<Vec<NearbyPlace>>;

    fn is_ready(&self) -> bool;
}
