//! Mock location enricher

use super::ScriptedFailure;
use async_trait::async_trait;
use landmark_core::error::ServiceKind;
use landmark_core::{Coordinates, EnrichedLocationData, LocationEnricher, NearbyPlace, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct State {
    locations: HashMap<String, EnrichedLocationData>,
    resolve_failure: Option<ScriptedFailure>,
    nearby: Vec<NearbyPlace>,
    nearby_failure: Option<ScriptedFailure>,
    resolved_names: Vec<String>,
}

/// Mock [`LocationEnricher`] backed by in-memory tables
///
/// `resolve` answers from the registered locations by exact name and
/// returns `Ok(None)` otherwise. `nearby` returns the registered places
/// unfiltered, in the order given.
#[derive(Clone, Default)]
pub struct MockEnricher {
    state: Arc<Mutex<State>>,
    resolve_calls: Arc<AtomicUsize>,
    nearby_calls: Arc<AtomicUsize>,
    not_ready: bool,
}

impl MockEnricher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_location(self, location: EnrichedLocationData) -> Self {
        self.state
            .lock()
            .unwrap()
            .locations
            .insert(location.title.clone(), location);
        self
    }

    pub fn with_nearby(self, places: Vec<NearbyPlace>) -> Self {
        self.state.lock().unwrap().nearby = places;
        self
    }

    pub fn failing_resolve(self, failure: ScriptedFailure) -> Self {
        self.state.lock().unwrap().resolve_failure = Some(failure);
        self
    }

    pub fn failing_nearby(self, failure: ScriptedFailure) -> Self {
        self.state.lock().unwrap().nearby_failure = Some(failure);
        self
    }

    pub fn not_ready(mut self) -> Self {
        self.not_ready = true;
        self
    }

    pub fn resolve_calls(&self) -> usize {
        self.resolve_calls.load(Ordering::SeqCst)
    }

    pub fn nearby_calls(&self) -> usize {
        self.nearby_calls.load(Ordering::SeqCst)
    }

    /// Names passed to `resolve`, in call order
    pub fn resolved_names(&self) -> Vec<String> {
        self.state.lock().unwrap().resolved_names.clone()
    }
}

#[async_trait]
impl LocationEnricher for MockEnricher {
    async fn resolve(
        &self,
        name: &str,
        _coordinates: Option<Coordinates>,
    ) -> Result<Option<EnrichedLocationData>> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        state.resolved_names.push(name.to_string());
        if let Some(failure) = &state.resolve_failure {
            return Err(failure.to_error(ServiceKind::Enrichment));
        }
        Ok(state.locations.get(name).cloned())
    }

    async fn nearby(
        &self,
        _center: Coordinates,
        _radius_m: u32,
        limit: usize,
    ) -> Result<Vec<NearbyPlace>> {
        self.nearby_calls.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock().unwrap();
        if let Some(failure) = &state.nearby_failure {
            return Err(failure.to_error(ServiceKind::Enrichment));
        }
        Ok(state.nearby.iter().take(limit).cloned().collect())
    }

    fn is_ready(&self) -> bool {
        !self.not_ready
    }
}
