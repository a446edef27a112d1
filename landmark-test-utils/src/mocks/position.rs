//! Mock position provider

use async_trait::async_trait;
use landmark_core::{Coordinates, PositionProvider};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Position provider with a fixed answer and optional delay
#[derive(Clone, Default)]
pub struct MockPositionProvider {
    position: Option<Coordinates>,
    delay: Duration,
    calls: Arc<AtomicUsize>,
}

impl MockPositionProvider {
    pub fn at(latitude: f64, longitude: f64) -> Self {
        Self {
            position: Some(Coordinates::new(latitude, longitude)),
            ..Self::default()
        }
    }

    /// A provider that never has a position
    pub fn unavailable() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PositionProvider for MockPositionProvider {
    async fn current_position(&self) -> Option<Coordinates> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.position
    }
}
